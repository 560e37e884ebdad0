//! Cloneable entry points into a running control loop.

use inspection_core::{PhotoOffset, PlanSummary, StructurePoint};
use inspection_link::FlightEvent;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::error::MissionError;
use crate::loops::control_loop::{Command, ControlEvent, Reply};
use crate::presenter::{FetchFailureDecision, ReviewDecision};
use crate::state::MissionSnapshot;

/// Operator commands and state observation.
#[derive(Clone)]
pub struct MissionHandle {
    events: mpsc::Sender<ControlEvent>,
    snapshot: watch::Receiver<MissionSnapshot>,
    shutdown: broadcast::Sender<()>,
}

impl MissionHandle {
    pub(crate) fn new(
        events: mpsc::Sender<ControlEvent>,
        snapshot: watch::Receiver<MissionSnapshot>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            events,
            snapshot,
            shutdown,
        }
    }

    pub async fn build_plan(
        &self,
        structures: Vec<StructurePoint>,
        offsets: Vec<PhotoOffset>,
    ) -> Result<PlanSummary, MissionError> {
        self.call(|reply| Command::BuildPlan {
            structures,
            offsets,
            reply,
        })
        .await
    }

    /// Upload and start a ready plan, or resume a paused mission.
    pub async fn upload_and_start(&self) -> Result<(), MissionError> {
        self.call(Command::UploadAndStart).await
    }

    pub async fn pause(&self) -> Result<(), MissionError> {
        self.call(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), MissionError> {
        self.call(Command::Resume).await
    }

    pub async fn review_now(&self) -> Result<(), MissionError> {
        self.call(Command::ReviewNow).await
    }

    pub async fn abort(&self) -> Result<(), MissionError> {
        self.call(Command::Abort).await
    }

    pub async fn decide_review(&self, decision: ReviewDecision) -> Result<(), MissionError> {
        self.call(|reply| Command::Review(decision, reply)).await
    }

    pub async fn decide_fetch_failure(&self, decision: FetchFailureDecision) -> Result<(), MissionError> {
        self.call(|reply| Command::FetchFailure(decision, reply)).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> MissionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MissionSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the control loop. Pending timers and retrieval are cancelled.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, MissionError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(ControlEvent::Command(command(reply)))
            .await
            .map_err(|_| MissionError::Stopped)?;
        response.await.map_err(|_| MissionError::Stopped)?
    }
}

/// Where the flight link bridge pushes aircraft events.
#[derive(Clone)]
pub struct FlightEventSink {
    events: mpsc::Sender<ControlEvent>,
}

impl FlightEventSink {
    pub(crate) fn new(events: mpsc::Sender<ControlEvent>) -> Self {
        Self { events }
    }

    pub async fn send(&self, event: FlightEvent) -> Result<(), MissionError> {
        self.events
            .send(ControlEvent::Flight(event))
            .await
            .map_err(|_| MissionError::Stopped)
    }

    /// Non-blocking variant for callback-style bridges.
    pub fn try_send(&self, event: FlightEvent) -> Result<(), MissionError> {
        self.events.try_send(ControlEvent::Flight(event)).map_err(|err| match err {
            TrySendError::Full(_) => MissionError::Busy {
                action: "deliver flight event",
            },
            TrySendError::Closed(_) => MissionError::Stopped,
        })
    }
}
