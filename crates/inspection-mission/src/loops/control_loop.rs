//! Mission control loop.
//!
//! Owns the orchestrator on a single task. Operator commands, flight events,
//! link completions, timer expiries and fetch reports all arrive through one
//! channel; the effects queued by each input are executed before the next
//! input is taken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use inspection_core::{PhotoOffset, PlanSummary, StructurePoint};
use inspection_link::{FlightEvent, FlightLink, LinkError, MediaLink, StorageLocation};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::MissionConfig;
use crate::error::MissionError;
use crate::fetch::{FetchOutcome, FetchPolicy, FetchProgress, PhotoFetchCoordinator};
use crate::gate::ReviewTimer;
use crate::handle::{FlightEventSink, MissionHandle};
use crate::orchestrator::{Effect, FetchId, LinkRequest, MissionOrchestrator, Notification, Ticket};
use crate::presenter::{FetchFailureDecision, Presenter, ReviewDecision};
use crate::state::MissionSnapshot;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, MissionError>>;

pub(crate) enum Command {
    BuildPlan {
        structures: Vec<StructurePoint>,
        offsets: Vec<PhotoOffset>,
        reply: Reply<PlanSummary>,
    },
    UploadAndStart(Reply<()>),
    Pause(Reply<()>),
    Resume(Reply<()>),
    ReviewNow(Reply<()>),
    Abort(Reply<()>),
    Review(ReviewDecision, Reply<()>),
    FetchFailure(FetchFailureDecision, Reply<()>),
}

pub(crate) enum ControlEvent {
    Command(Command),
    Flight(FlightEvent),
    LinkResult {
        ticket: Ticket,
        result: Result<(), LinkError>,
    },
    ReviewTimeout(ReviewTimer),
    FetchProgress {
        fetch_id: FetchId,
        progress: FetchProgress,
    },
    FetchOutcome {
        fetch_id: FetchId,
        outcome: FetchOutcome,
    },
}

impl ControlEvent {
    fn kind(&self) -> &'static str {
        match self {
            ControlEvent::Command(_) => "command",
            ControlEvent::Flight(_) => "flight_event",
            ControlEvent::LinkResult { .. } => "link_result",
            ControlEvent::ReviewTimeout(_) => "review_timeout",
            ControlEvent::FetchProgress { .. } => "fetch_progress",
            ControlEvent::FetchOutcome { .. } => "fetch_outcome",
        }
    }
}

/// Aircraft links and presentation layer driven by the control loop.
#[derive(Clone)]
pub struct MissionLinks {
    pub flight: Arc<dyn FlightLink>,
    pub media: Arc<dyn MediaLink>,
    pub presenter: Arc<dyn Presenter>,
}

/// Handles to a running control loop.
pub struct MissionRuntime {
    pub handle: MissionHandle,
    /// Entry point for flight events; give it to the flight link bridge
    pub sink: FlightEventSink,
    pub task: JoinHandle<()>,
}

/// Spawn the control loop on the current tokio runtime.
///
/// The loop stops on [`MissionHandle::shutdown`] or once every
/// [`MissionHandle`] and every [`FlightEventSink`] has been dropped. A live
/// sink alone keeps it running.
pub fn spawn_control_loop(config: MissionConfig, links: MissionLinks) -> MissionRuntime {
    let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let fetch_policy = config.fetch.clone();
    let orchestrator = MissionOrchestrator::new(config);
    let (snapshot_tx, snapshot_rx) = watch::channel(orchestrator.snapshot());

    let control = ControlLoop {
        orchestrator,
        links,
        fetch_policy,
        events: events_tx.downgrade(),
        timers: HashMap::new(),
        fetch: None,
        snapshot: snapshot_tx,
    };
    let task = tokio::spawn(run_control_loop(control, events_rx, shutdown_rx));

    MissionRuntime {
        handle: MissionHandle::new(events_tx.clone(), snapshot_rx, shutdown_tx),
        sink: FlightEventSink::new(events_tx),
        task,
    }
}

struct ControlLoop {
    orchestrator: MissionOrchestrator,
    links: MissionLinks,
    fetch_policy: FetchPolicy,
    events: mpsc::WeakSender<ControlEvent>,
    timers: HashMap<ReviewTimer, JoinHandle<()>>,
    fetch: Option<(FetchId, JoinHandle<()>)>,
    snapshot: watch::Sender<MissionSnapshot>,
}

async fn run_control_loop(
    mut control: ControlLoop,
    mut events: mpsc::Receiver<ControlEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!("Mission control loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Mission control loop shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => control.handle(event),
                    None => {
                        tracing::info!("All mission handles and event sinks dropped, control loop exiting");
                        break;
                    }
                }
            }
        }
    }

    control.stop_background_tasks();
}

impl ControlLoop {
    fn handle(&mut self, event: ControlEvent) {
        let kind = event.kind();
        let result = match event {
            ControlEvent::Command(command) => {
                self.handle_command(command);
                Ok(())
            }
            ControlEvent::Flight(event) => self.orchestrator.on_flight_event(event),
            ControlEvent::LinkResult { ticket, result } => self.orchestrator.on_link_result(ticket, result),
            ControlEvent::ReviewTimeout(timer) => {
                self.timers.remove(&timer);
                self.orchestrator.on_review_timeout(timer)
            }
            ControlEvent::FetchProgress { fetch_id, progress } => {
                self.orchestrator.on_fetch_progress(fetch_id, progress)
            }
            ControlEvent::FetchOutcome { fetch_id, outcome } => {
                if self.fetch.as_ref().map(|(id, _)| *id) == Some(fetch_id) {
                    self.fetch = None;
                }
                self.orchestrator.on_fetch_outcome(fetch_id, outcome)
            }
        };

        match result {
            Ok(()) => {}
            Err(MissionError::StaleEvent) => tracing::debug!(kind, "Dropping stale event"),
            Err(err) => tracing::warn!(kind, error = %err, "Event rejected"),
        }

        self.execute_effects();
        self.snapshot.send_replace(self.orchestrator.snapshot());
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::BuildPlan {
                structures,
                offsets,
                reply,
            } => {
                let _ = reply.send(self.orchestrator.build_plan(&structures, &offsets));
            }
            Command::UploadAndStart(reply) => {
                let _ = reply.send(self.orchestrator.upload_and_start());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.orchestrator.pause_manual());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.orchestrator.resume_manual());
            }
            Command::ReviewNow(reply) => {
                let _ = reply.send(self.orchestrator.review_now());
            }
            Command::Abort(reply) => {
                let _ = reply.send(self.orchestrator.abort());
            }
            Command::Review(decision, reply) => {
                let _ = reply.send(self.orchestrator.decide_review(decision));
            }
            Command::FetchFailure(decision, reply) => {
                let _ = reply.send(self.orchestrator.decide_fetch_failure(decision));
            }
        }
    }

    fn execute_effects(&mut self) {
        for effect in self.orchestrator.take_effects() {
            match effect {
                Effect::Link { ticket, request } => self.spawn_link_call(ticket, request),
                Effect::ArmReviewTimer { timer, delay } => self.arm_review_timer(timer, delay),
                Effect::CancelReviewTimer(timer) => {
                    if let Some(task) = self.timers.remove(&timer) {
                        task.abort();
                    }
                }
                Effect::StartFetch {
                    fetch_id,
                    since,
                    location,
                } => self.start_fetch(fetch_id, since, location),
                Effect::CancelFetch(fetch_id) => {
                    if self.fetch.as_ref().map(|(id, _)| *id) == Some(fetch_id) {
                        if let Some((_, task)) = self.fetch.take() {
                            task.abort();
                            tracing::debug!(fetch_id, "Photo retrieval cancelled");
                        }
                    }
                }
                Effect::Notify(notification) => self.notify(notification),
            }
        }
    }

    fn spawn_link_call(&self, ticket: Ticket, request: LinkRequest) {
        let Some(events) = self.events.upgrade() else {
            return;
        };
        let flight = self.links.flight.clone();

        tokio::spawn(async move {
            let result = match request {
                LinkRequest::LoadMission(plan) => flight.load_mission(&plan).await,
                LinkRequest::UploadMission => flight.upload_mission().await,
                LinkRequest::StartMission => flight.start_mission().await,
                LinkRequest::PauseMission => flight.pause_mission().await,
                LinkRequest::ResumeMission => flight.resume_mission().await,
                LinkRequest::StopMission => flight.stop_mission().await,
                LinkRequest::SetReturnHomeAltitude(altitude) => flight.set_return_home_altitude(altitude).await,
                LinkRequest::StartGoHome => flight.start_go_home().await,
            };
            if events.send(ControlEvent::LinkResult { ticket, result }).await.is_err() {
                tracing::debug!(ticket, "Control loop gone, dropping link result");
            }
        });
    }

    fn arm_review_timer(&mut self, timer: ReviewTimer, delay: Duration) {
        let Some(events) = self.events.upgrade() else {
            return;
        };
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(ControlEvent::ReviewTimeout(timer)).await;
        });
        if let Some(previous) = self.timers.insert(timer, task) {
            previous.abort();
        }
    }

    fn start_fetch(&mut self, fetch_id: FetchId, since: DateTime<Utc>, location: StorageLocation) {
        let Some(events) = self.events.upgrade() else {
            return;
        };
        if let Some((previous, task)) = self.fetch.take() {
            tracing::debug!(fetch_id = previous, "Replacing photo retrieval");
            task.abort();
        }

        let coordinator = PhotoFetchCoordinator::new(self.links.media.clone(), self.fetch_policy.clone(), location);
        let progress_events = events.clone();
        let task = tokio::spawn(async move {
            let outcome = coordinator
                .run(since, move |progress| {
                    if progress_events
                        .try_send(ControlEvent::FetchProgress { fetch_id, progress })
                        .is_err()
                    {
                        tracing::debug!(fetch_id, "Control queue full, dropping fetch progress");
                    }
                })
                .await;
            let _ = events.send(ControlEvent::FetchOutcome { fetch_id, outcome }).await;
        });
        self.fetch = Some((fetch_id, task));
    }

    fn notify(&self, notification: Notification) {
        let presenter = &self.links.presenter;
        match notification {
            Notification::Status(text) => presenter.on_status(&text),
            Notification::PhaseChanged(phase) => presenter.on_phase_changed(phase),
            Notification::PhotoForReview {
                photo,
                structure_index,
                photo_index,
            } => presenter.on_photo_for_review(&photo, structure_index, photo_index),
            Notification::FetchFailed(reason) => presenter.on_photo_fetch_failed(&reason),
        }
    }

    fn stop_background_tasks(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
        if let Some((_, task)) = self.fetch.take() {
            task.abort();
        }
    }
}
