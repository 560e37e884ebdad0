//! Mission supervisor state machine.
//!
//! The orchestrator owns the plan, the run state and the review gate. It does
//! no I/O: every input is handled synchronously and queues [`Effect`]s, which
//! the control loop drains with [`MissionOrchestrator::take_effects`] and
//! executes in order. Link calls are matched back by ticket and fetch reports
//! by fetch id, so anything issued before a transition that superseded it is
//! dropped as stale.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use inspection_core::{
    build_plan, build_return_plan, AircraftPosition, GeoPoint, MissionProgress, PhotoOffset, PlanSummary,
    StructurePoint, WaypointPlan,
};
use inspection_link::{ExecutionProgress, FlightEvent, LinkError, LinkOp, Photo, StorageLocation};
use uuid::Uuid;

use crate::config::MissionConfig;
use crate::error::MissionError;
use crate::fetch::{FetchOutcome, FetchProgress};
use crate::gate::{GateDecision, GateInput, PhotoReviewGate, ReviewTimer};
use crate::presenter::{FetchFailureDecision, ReviewDecision};
use crate::state::{MissionPhase, MissionRunState, MissionSnapshot};

pub type Ticket = u64;
pub type FetchId = u64;

/// A single call on the flight link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRequest {
    LoadMission(Arc<WaypointPlan>),
    UploadMission,
    StartMission,
    PauseMission,
    ResumeMission,
    StopMission,
    SetReturnHomeAltitude(f64),
    StartGoHome,
}

impl LinkRequest {
    pub fn op(&self) -> LinkOp {
        match self {
            LinkRequest::LoadMission(_) => LinkOp::LoadMission,
            LinkRequest::UploadMission => LinkOp::UploadMission,
            LinkRequest::StartMission => LinkOp::StartMission,
            LinkRequest::PauseMission => LinkOp::PauseMission,
            LinkRequest::ResumeMission => LinkOp::ResumeMission,
            LinkRequest::StopMission => LinkOp::StopMission,
            LinkRequest::SetReturnHomeAltitude(_) => LinkOp::SetReturnHomeAltitude,
            LinkRequest::StartGoHome => LinkOp::StartGoHome,
        }
    }
}

/// Message for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Status(String),
    PhaseChanged(MissionPhase),
    PhotoForReview {
        photo: Photo,
        structure_index: usize,
        photo_index: usize,
    },
    FetchFailed(String),
}

/// Side effect requested by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Link { ticket: Ticket, request: LinkRequest },
    ArmReviewTimer { timer: ReviewTimer, delay: Duration },
    CancelReviewTimer(ReviewTimer),
    StartFetch {
        fetch_id: FetchId,
        since: DateTime<Utc>,
        location: StorageLocation,
    },
    CancelFetch(FetchId),
    Notify(Notification),
}

/// What an outstanding link call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkStep {
    Load,
    Upload,
    Start,
    PauseForReview,
    PauseManual,
    ResumeManual,
    ResumeAfterReview,
    Stop,
    ReturnLoad,
    ReturnUpload,
    ReturnStart,
    ReturnHomeAltitude,
    GoHome,
}

#[derive(Debug, Clone, Copy)]
struct ActiveReview {
    waypoint: usize,
    /// Wall-clock time the review was triggered; photos older than this
    /// (minus slack) are not candidates
    since: DateTime<Utc>,
}

pub struct MissionOrchestrator {
    config: MissionConfig,
    run: MissionRunState,
    gate: PhotoReviewGate,
    plan: Option<Arc<WaypointPlan>>,
    mission_id: Option<Uuid>,
    home: Option<GeoPoint>,
    position: Option<AircraftPosition>,
    storage_location: StorageLocation,
    review: Option<ActiveReview>,
    /// A review triggered while another link call was outstanding
    review_pause_deferred: bool,
    in_flight: Option<(Ticket, LinkStep)>,
    next_ticket: Ticket,
    active_fetch: Option<FetchId>,
    next_fetch_id: FetchId,
    return_leg_started: bool,
    last_error: Option<String>,
    effects: Vec<Effect>,
}

impl MissionOrchestrator {
    pub fn new(config: MissionConfig) -> Self {
        let storage_location = config.fetch.initial_location;
        Self {
            config,
            run: MissionRunState::default(),
            gate: PhotoReviewGate::new(),
            plan: None,
            mission_id: None,
            home: None,
            position: None,
            storage_location,
            review: None,
            review_pause_deferred: false,
            in_flight: None,
            next_ticket: 0,
            active_fetch: None,
            next_fetch_id: 0,
            return_leg_started: false,
            last_error: None,
            effects: Vec::new(),
        }
    }

    pub fn phase(&self) -> MissionPhase {
        self.run.phase
    }

    pub fn plan(&self) -> Option<&Arc<WaypointPlan>> {
        self.plan.as_ref()
    }

    pub fn run_state(&self) -> &MissionRunState {
        &self.run
    }

    /// Latest photo waypoint the review gate has handled.
    pub fn last_handled_photo_waypoint(&self) -> Option<usize> {
        self.gate.last_handled()
    }

    pub fn home(&self) -> Option<GeoPoint> {
        self.home
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Drain the effects queued since the last call, in issue order.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn snapshot(&self) -> MissionSnapshot {
        let progress = match (&self.plan, self.run.plan_index_cursor) {
            (Some(plan), Some(cursor)) => Some(MissionProgress::at(plan, cursor)),
            _ => None,
        };
        MissionSnapshot {
            mission_id: self.mission_id,
            phase: self.run.phase,
            plan_waypoints: self.plan.as_ref().map_or(0, |plan| plan.len()),
            plan_index_cursor: self.run.plan_index_cursor,
            last_handled_photo_waypoint: self.gate.last_handled(),
            photo_fetch_attempt: self.run.photo_fetch_attempt,
            is_photo_gate_open: self.run.is_photo_gate_open,
            progress,
            last_error: self.last_error.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Operator commands
    // ------------------------------------------------------------------

    pub fn build_plan(
        &mut self,
        structures: &[StructurePoint],
        offsets: &[PhotoOffset],
    ) -> Result<PlanSummary, MissionError> {
        let phase = self.run.phase;
        if !matches!(
            phase,
            MissionPhase::Idle | MissionPhase::PlanReady | MissionPhase::Finishing | MissionPhase::Failed
        ) {
            return Err(invalid(phase, "build a plan"));
        }

        let home = match (self.home, structures.first()) {
            (Some(home), _) => home,
            (None, Some(first)) => {
                tracing::warn!(
                    lat = first.latitude,
                    lon = first.longitude,
                    "Home location unknown, first structure used as launch point"
                );
                GeoPoint::new(first.latitude, first.longitude)
            }
            // Empty input, rejected by the planner.
            (None, None) => GeoPoint::new(0.0, 0.0),
        };

        let plan = build_plan(structures, offsets, home, &self.config.parameters)?;
        let summary = PlanSummary::from_plan(&plan);
        let mission_id = Uuid::new_v4();

        self.plan = Some(Arc::new(plan));
        self.mission_id = Some(mission_id);
        self.last_error = None;
        self.start_fresh_run();

        tracing::info!(
            %mission_id,
            waypoints = summary.total_waypoints,
            photos = summary.photo_waypoints,
            structures = summary.structures,
            "Inspection plan built"
        );
        self.status(format!(
            "Plan ready: {} waypoints, {} photos over {} structures",
            summary.total_waypoints, summary.photo_waypoints, summary.structures
        ));
        self.set_phase(MissionPhase::PlanReady);
        Ok(summary)
    }

    pub fn upload_and_start(&mut self) -> Result<(), MissionError> {
        let phase = self.run.phase;
        match phase {
            MissionPhase::PausedManual => return self.resume_manual(),
            MissionPhase::PausedForReview => return self.resume_after_review(),
            MissionPhase::PlanReady | MissionPhase::Failed => {}
            _ => return Err(invalid(phase, "start the mission")),
        }
        let Some(plan) = self.plan.clone() else {
            return Err(invalid(phase, "start the mission"));
        };
        self.ensure_link_idle("start the mission")?;

        self.start_fresh_run();
        self.last_error = None;
        self.set_phase(MissionPhase::Uploading);
        self.status("Uploading mission".to_string());
        self.request(LinkStep::Load, LinkRequest::LoadMission(plan));
        Ok(())
    }

    pub fn pause_manual(&mut self) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if phase != MissionPhase::Executing {
            return Err(invalid(phase, "pause"));
        }
        self.ensure_link_idle("pause")?;
        self.request(LinkStep::PauseManual, LinkRequest::PauseMission);
        Ok(())
    }

    pub fn resume_manual(&mut self) -> Result<(), MissionError> {
        match self.run.phase {
            MissionPhase::PausedManual => {
                self.ensure_link_idle("resume")?;
                self.request(LinkStep::ResumeManual, LinkRequest::ResumeMission);
                Ok(())
            }
            MissionPhase::PausedForReview => self.resume_after_review(),
            phase => Err(invalid(phase, "resume")),
        }
    }

    /// Leave the review pause and continue the mission. Any fetch still
    /// running is cancelled.
    pub fn resume_after_review(&mut self) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if phase != MissionPhase::PausedForReview {
            return Err(invalid(phase, "resume after review"));
        }
        self.ensure_link_idle("resume after review")?;
        self.cancel_fetch();
        self.status("Resuming mission".to_string());
        self.request(LinkStep::ResumeAfterReview, LinkRequest::ResumeMission);
        Ok(())
    }

    /// Operator override: review the most recent photo now, or the next one.
    pub fn review_now(&mut self) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if matches!(phase, MissionPhase::Aborting | MissionPhase::ReturningHome) {
            return Err(invalid(phase, "request a photo review"));
        }

        self.gate.request_force();
        tracing::info!(%phase, "Photo review requested by operator");

        if phase != MissionPhase::Executing || self.review.is_some() {
            self.status("Photo review requested for the next photo waypoint".to_string());
            return Ok(());
        }

        let latest = match (&self.plan, self.run.plan_index_cursor) {
            (Some(plan), Some(cursor)) => plan.last_photo_at_or_before(cursor),
            _ => None,
        };
        match latest {
            Some(waypoint) => {
                let decision = self.gate.force_trigger(waypoint, false);
                if decision == GateDecision::Ignore {
                    self.status("Photo review requested for the next photo waypoint".to_string());
                }
                self.apply_gate_decision(decision);
            }
            None => self.status("Photo review requested for the next photo waypoint".to_string()),
        }
        Ok(())
    }

    pub fn decide_review(&mut self, decision: ReviewDecision) -> Result<(), MissionError> {
        match decision {
            ReviewDecision::Accept => self.resume_after_review(),
            ReviewDecision::Retake => self.restart_fetch("retake the photo"),
        }
    }

    pub fn decide_fetch_failure(&mut self, decision: FetchFailureDecision) -> Result<(), MissionError> {
        match decision {
            FetchFailureDecision::RetryFetch => self.restart_fetch("retry the photo retrieval"),
            FetchFailureDecision::SkipAndResume => self.resume_after_review(),
        }
    }

    /// Stop the mission and bring the aircraft home.
    ///
    /// The review timer and any photo retrieval are cancelled before the stop
    /// request is queued. An outstanding link call is superseded.
    pub fn abort(&mut self) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if !matches!(
            phase,
            MissionPhase::Uploading
                | MissionPhase::Executing
                | MissionPhase::PausedManual
                | MissionPhase::PausedForReview
                | MissionPhase::Failed
        ) {
            return Err(invalid(phase, "abort"));
        }

        self.cancel_review_timer();
        self.cancel_fetch();
        self.close_review();
        if let Some((ticket, step)) = self.in_flight.take() {
            tracing::debug!(ticket, ?step, "Abort supersedes outstanding link call");
        }

        tracing::warn!(%phase, mission_id = ?self.mission_id, "Aborting mission");
        self.set_phase(MissionPhase::Aborting);
        self.status("Aborting mission".to_string());
        self.request(LinkStep::Stop, LinkRequest::StopMission);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inputs from the aircraft and the runtime
    // ------------------------------------------------------------------

    pub fn on_flight_event(&mut self, event: FlightEvent) -> Result<(), MissionError> {
        match event {
            FlightEvent::Execution(progress) => self.on_execution_progress(progress),
            FlightEvent::Finished { error } => self.on_mission_finished(error),
            FlightEvent::HomeLocation(home) => {
                tracing::debug!(lat = home.lat, lon = home.lon, "Home location updated");
                self.home = Some(home);
                Ok(())
            }
            FlightEvent::Position(position) => {
                self.position = Some(position);
                Ok(())
            }
        }
    }

    fn on_execution_progress(&mut self, progress: ExecutionProgress) -> Result<(), MissionError> {
        if !self.run.phase.accepts_progress() {
            return Err(MissionError::StaleEvent);
        }
        let Some(plan) = self.plan.clone() else {
            return Err(MissionError::StaleEvent);
        };

        let waypoint = progress.target_waypoint_index;
        self.run.plan_index_cursor = Some(waypoint);
        if !plan.is_photo_waypoint(waypoint) {
            return Ok(());
        }

        let decision = self.gate.evaluate(GateInput {
            waypoint,
            reached: progress.reached,
            state: progress.state,
            review_active: self.review.is_some(),
        });
        self.apply_gate_decision(decision);
        Ok(())
    }

    fn on_mission_finished(&mut self, error: Option<String>) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if phase == MissionPhase::ReturningHome && self.return_leg_started {
            if let Some(err) = error {
                tracing::warn!(error = %err, "Return leg finished with error");
            }
            self.finish_to_idle("Aircraft returned home");
            return Ok(());
        }
        if !phase.accepts_progress() {
            return Err(MissionError::StaleEvent);
        }

        self.cancel_review_timer();
        self.cancel_fetch();
        self.close_review();
        self.in_flight = None;

        match error {
            None => {
                tracing::info!(mission_id = ?self.mission_id, "Inspection mission complete");
                self.set_phase(MissionPhase::Finishing);
                self.status("Inspection mission complete".to_string());
                self.start_fresh_run();
                self.set_phase(MissionPhase::Idle);
            }
            Some(err) => self.fail(format!("mission ended with error: {err}")),
        }
        Ok(())
    }

    pub fn on_link_result(&mut self, ticket: Ticket, result: Result<(), LinkError>) -> Result<(), MissionError> {
        let step = match self.in_flight {
            Some((current, step)) if current == ticket => step,
            _ => return Err(MissionError::StaleEvent),
        };
        self.in_flight = None;

        match result {
            Ok(()) => self.on_link_success(step),
            Err(err) => self.on_link_failure(step, err),
        }

        if self.review_pause_deferred && self.in_flight.is_none() {
            self.flush_deferred_review();
        }
        Ok(())
    }

    fn on_link_success(&mut self, step: LinkStep) {
        tracing::debug!(?step, "Link call acknowledged");
        match step {
            LinkStep::Load => {
                self.status("Mission loaded, uploading to aircraft".to_string());
                self.request(LinkStep::Upload, LinkRequest::UploadMission);
            }
            LinkStep::Upload => self.request(LinkStep::Start, LinkRequest::StartMission),
            LinkStep::Start => {
                tracing::info!(mission_id = ?self.mission_id, "Mission started");
                self.set_phase(MissionPhase::Executing);
                self.status("Mission started".to_string());
            }
            LinkStep::PauseForReview => {
                if self.run.phase == MissionPhase::Executing && self.review.is_some() {
                    self.set_phase(MissionPhase::PausedForReview);
                    self.start_fetch();
                }
            }
            LinkStep::PauseManual => {
                self.set_phase(MissionPhase::PausedManual);
                self.status("Mission paused".to_string());
            }
            LinkStep::ResumeManual => {
                if self.review.is_some() {
                    // The aircraft flies again, so the review needs its own pause.
                    self.cancel_fetch();
                    self.review_pause_deferred = true;
                }
                self.set_phase(MissionPhase::Executing);
                self.status("Mission resumed".to_string());
            }
            LinkStep::ResumeAfterReview => {
                self.close_review();
                self.set_phase(MissionPhase::Executing);
                self.status("Mission resumed".to_string());
            }
            LinkStep::Stop => self.start_return_leg(),
            LinkStep::ReturnLoad => self.request(LinkStep::ReturnUpload, LinkRequest::UploadMission),
            LinkStep::ReturnUpload => self.request(LinkStep::ReturnStart, LinkRequest::StartMission),
            LinkStep::ReturnStart => {
                self.return_leg_started = true;
                self.status("Returning home".to_string());
            }
            LinkStep::ReturnHomeAltitude => self.request(LinkStep::GoHome, LinkRequest::StartGoHome),
            LinkStep::GoHome => self.finish_to_idle("Go-home accepted, aircraft returning"),
        }
    }

    fn on_link_failure(&mut self, step: LinkStep, err: LinkError) {
        match step {
            LinkStep::Load | LinkStep::Upload | LinkStep::Start => {
                let reason = MissionError::from(err).to_string();
                self.fail(reason);
            }
            LinkStep::PauseForReview => {
                // The waypoint stays handled; the mission keeps flying.
                self.close_review();
                self.report_link_error(err);
            }
            LinkStep::PauseManual | LinkStep::ResumeManual | LinkStep::ResumeAfterReview => {
                self.report_link_error(err);
            }
            LinkStep::Stop | LinkStep::ReturnLoad | LinkStep::ReturnUpload | LinkStep::ReturnStart => {
                self.report_link_error(err);
                self.raw_go_home();
            }
            LinkStep::ReturnHomeAltitude => {
                // Go-home is issued regardless.
                self.report_link_error(err);
                self.request(LinkStep::GoHome, LinkRequest::StartGoHome);
            }
            LinkStep::GoHome => {
                let reason = MissionError::from(err).to_string();
                self.fail(reason);
            }
        }
    }

    pub fn on_review_timeout(&mut self, timer: ReviewTimer) -> Result<(), MissionError> {
        if !self.run.phase.accepts_progress() {
            return Err(MissionError::StaleEvent);
        }
        match self.gate.on_timeout(timer, self.review.is_some()) {
            Some(waypoint) => {
                tracing::info!(waypoint, "Arrival not confirmed in time, forcing photo review");
                self.begin_review(waypoint);
                Ok(())
            }
            None => Err(MissionError::StaleEvent),
        }
    }

    pub fn on_fetch_progress(&mut self, fetch_id: FetchId, progress: FetchProgress) -> Result<(), MissionError> {
        if self.active_fetch != Some(fetch_id) {
            return Err(MissionError::StaleEvent);
        }
        match progress {
            FetchProgress::AttemptStarted { attempt, max_attempts } => {
                self.run.photo_fetch_attempt = attempt;
                self.status(format!("Retrieving photo, attempt {attempt} of {max_attempts}"));
            }
            FetchProgress::AttemptFailed { attempt, reason } => {
                tracing::debug!(attempt, reason, "Photo retrieval attempt failed");
            }
        }
        Ok(())
    }

    pub fn on_fetch_outcome(&mut self, fetch_id: FetchId, outcome: FetchOutcome) -> Result<(), MissionError> {
        if self.active_fetch != Some(fetch_id) || self.run.phase != MissionPhase::PausedForReview {
            return Err(MissionError::StaleEvent);
        }
        self.active_fetch = None;
        self.run.photo_fetch_attempt = 0;

        match outcome {
            FetchOutcome::Delivered { photo, location } => {
                self.storage_location = location;
                let position = match (&self.plan, self.review) {
                    (Some(plan), Some(review)) => plan.photo_position(review.waypoint),
                    _ => None,
                };
                let Some((structure_index, photo_index)) = position else {
                    tracing::warn!(file = %photo.file_name, "Retrieved photo has no matching photo waypoint");
                    return Err(MissionError::StaleEvent);
                };
                self.status(format!(
                    "Photo {} of structure {} ready for review",
                    photo_index + 1,
                    structure_index + 1
                ));
                self.effects.push(Effect::Notify(Notification::PhotoForReview {
                    photo,
                    structure_index,
                    photo_index,
                }));
            }
            FetchOutcome::Exhausted { error, location } => {
                self.storage_location = location;
                let reason = error.to_string();
                tracing::warn!(reason, "Photo retrieval gave up");
                self.effects.push(Effect::Notify(Notification::FetchFailed(reason)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn apply_gate_decision(&mut self, decision: GateDecision) {
        match decision {
            GateDecision::Ignore => {}
            GateDecision::Trigger { waypoint, cancel_timer } => {
                if let Some(timer) = cancel_timer {
                    self.effects.push(Effect::CancelReviewTimer(timer));
                }
                self.begin_review(waypoint);
            }
            GateDecision::ArmTimeout { timer, supersedes } => {
                if let Some(old) = supersedes {
                    self.effects.push(Effect::CancelReviewTimer(old));
                }
                tracing::debug!(waypoint = timer.waypoint, "Arming photo review timeout");
                self.effects.push(Effect::ArmReviewTimer {
                    timer,
                    delay: self.config.review_timeout,
                });
            }
        }
    }

    fn begin_review(&mut self, waypoint: usize) {
        self.run.is_photo_gate_open = true;
        self.review = Some(ActiveReview {
            waypoint,
            since: Utc::now(),
        });

        if let Some((structure, photo)) = self.plan.as_ref().and_then(|plan| plan.photo_position(waypoint)) {
            tracing::info!(waypoint, structure, photo, "Pausing for photo review");
        }

        match self.run.phase {
            // A pause or resume is outstanding; the phase it lands in decides.
            MissionPhase::Executing | MissionPhase::PausedManual if self.in_flight.is_some() => {
                self.review_pause_deferred = true;
            }
            MissionPhase::PausedManual => {
                self.set_phase(MissionPhase::PausedForReview);
                self.start_fetch();
            }
            MissionPhase::Executing => self.request(LinkStep::PauseForReview, LinkRequest::PauseMission),
            _ => {}
        }
    }

    fn flush_deferred_review(&mut self) {
        self.review_pause_deferred = false;
        if self.review.is_none() {
            return;
        }
        match self.run.phase {
            MissionPhase::Executing => self.request(LinkStep::PauseForReview, LinkRequest::PauseMission),
            MissionPhase::PausedManual => {
                self.set_phase(MissionPhase::PausedForReview);
                self.start_fetch();
            }
            MissionPhase::PausedForReview => {}
            _ => self.close_review(),
        }
    }

    fn restart_fetch(&mut self, action: &'static str) -> Result<(), MissionError> {
        let phase = self.run.phase;
        if phase != MissionPhase::PausedForReview {
            return Err(invalid(phase, action));
        }
        self.start_fetch();
        Ok(())
    }

    fn start_fetch(&mut self) {
        let Some(review) = self.review else {
            return;
        };
        self.next_fetch_id += 1;
        let fetch_id = self.next_fetch_id;
        if let Some(previous) = self.active_fetch.replace(fetch_id) {
            self.effects.push(Effect::CancelFetch(previous));
        }
        self.run.photo_fetch_attempt = 0;
        self.status("Retrieving photo".to_string());
        self.effects.push(Effect::StartFetch {
            fetch_id,
            since: review.since,
            location: self.storage_location,
        });
    }

    fn cancel_fetch(&mut self) {
        if let Some(fetch_id) = self.active_fetch.take() {
            self.effects.push(Effect::CancelFetch(fetch_id));
        }
        self.run.photo_fetch_attempt = 0;
    }

    fn cancel_review_timer(&mut self) {
        if let Some(timer) = self.gate.cancel_pending() {
            self.effects.push(Effect::CancelReviewTimer(timer));
        }
    }

    fn close_review(&mut self) {
        self.review = None;
        self.review_pause_deferred = false;
        self.run.is_photo_gate_open = false;
        self.run.photo_fetch_attempt = 0;
    }

    fn start_return_leg(&mut self) {
        let home = self.home.or_else(|| {
            self.plan
                .as_ref()
                .and_then(|plan| plan.get(0))
                .map(|wp| GeoPoint::new(wp.lat, wp.lon))
        });
        let from = self
            .position
            .map(|pos| GeoPoint::new(pos.lat, pos.lon))
            .or_else(|| {
                let plan = self.plan.as_ref()?;
                let wp = plan.get(self.run.plan_index_cursor?)?;
                Some(GeoPoint::new(wp.lat, wp.lon))
            })
            .or(home);

        match (from, home) {
            (Some(from), Some(home)) => {
                let plan = build_return_plan(from, home, &self.config.parameters);
                tracing::info!(
                    from_lat = from.lat,
                    from_lon = from.lon,
                    home_lat = home.lat,
                    home_lon = home.lon,
                    "Mission stopped, flying return leg"
                );
                self.return_leg_started = false;
                self.set_phase(MissionPhase::ReturningHome);
                self.request(LinkStep::ReturnLoad, LinkRequest::LoadMission(Arc::new(plan)));
            }
            _ => {
                tracing::warn!("No home or aircraft position known, falling back to go-home");
                self.raw_go_home();
            }
        }
    }

    fn raw_go_home(&mut self) {
        self.return_leg_started = false;
        self.set_phase(MissionPhase::Aborting);
        self.status("Commanding aircraft to return home".to_string());
        let altitude = self.config.parameters.safety_altitude_m;
        self.request(
            LinkStep::ReturnHomeAltitude,
            LinkRequest::SetReturnHomeAltitude(altitude),
        );
    }

    fn finish_to_idle(&mut self, message: &str) {
        tracing::info!(mission_id = ?self.mission_id, detail = message, "Mission closed");
        self.in_flight = None;
        self.status(message.to_string());
        self.start_fresh_run();
        self.set_phase(MissionPhase::Idle);
    }

    fn fail(&mut self, reason: String) {
        tracing::warn!(mission_id = ?self.mission_id, reason, "Mission failed");
        self.in_flight = None;
        self.status(reason.clone());
        self.last_error = Some(reason);
        self.set_phase(MissionPhase::Failed);
    }

    fn report_link_error(&mut self, err: LinkError) {
        let op = err.op();
        let reason = MissionError::from(err).to_string();
        tracing::warn!(%op, reason, "Link call failed");
        self.status(reason.clone());
        self.last_error = Some(reason);
    }

    /// Fresh run state for a new mission. A pending operator review request
    /// survives.
    fn start_fresh_run(&mut self) {
        self.cancel_review_timer();
        self.cancel_fetch();
        self.close_review();
        self.return_leg_started = false;
        self.run.reset();
        let forced = self.gate.is_forced();
        self.gate.reset();
        if forced {
            self.gate.request_force();
        }
    }

    fn ensure_link_idle(&self, action: &'static str) -> Result<(), MissionError> {
        match self.in_flight {
            Some(_) => Err(MissionError::Busy { action }),
            None => Ok(()),
        }
    }

    fn request(&mut self, step: LinkStep, request: LinkRequest) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        tracing::debug!(ticket, ?step, op = %request.op(), "Issuing link call");
        self.in_flight = Some((ticket, step));
        self.effects.push(Effect::Link { ticket, request });
    }

    fn set_phase(&mut self, phase: MissionPhase) {
        if self.run.phase == phase {
            return;
        }
        tracing::info!(from = %self.run.phase, to = %phase, "Mission phase transition");
        self.run.phase = phase;
        self.effects.push(Effect::Notify(Notification::PhaseChanged(phase)));
    }

    fn status(&mut self, text: String) {
        self.effects.push(Effect::Notify(Notification::Status(text)));
    }
}

fn invalid(phase: MissionPhase, action: &'static str) -> MissionError {
    MissionError::InvalidTransition { phase, action }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use inspection_link::{LinkMissionState, PhotoContent};

    fn structures() -> Vec<StructurePoint> {
        vec![
            StructurePoint::new(47.3977, 8.5456, 400.0, 30.0),
            StructurePoint::new(47.3987, 8.5466, 402.0, 25.0),
        ]
    }

    fn offsets() -> Vec<PhotoOffset> {
        vec![
            PhotoOffset::new(10.0, 0.0, 0.0, -10.0),
            PhotoOffset::new(0.0, 10.0, 5.0, -20.0),
            PhotoOffset::new(-10.0, 0.0, 10.0, -30.0),
        ]
    }

    fn orchestrator() -> MissionOrchestrator {
        let mut orchestrator = MissionOrchestrator::new(MissionConfig::default());
        orchestrator
            .on_flight_event(FlightEvent::HomeLocation(GeoPoint::new(47.3970, 8.5450)))
            .unwrap();
        orchestrator
    }

    fn link_calls(effects: &[Effect]) -> Vec<(Ticket, LinkOp)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Link { ticket, request } => Some((*ticket, request.op())),
                _ => None,
            })
            .collect()
    }

    fn single_link_call(orchestrator: &mut MissionOrchestrator) -> (Ticket, LinkOp) {
        let calls = link_calls(&orchestrator.take_effects());
        assert_eq!(calls.len(), 1, "expected one link call, got {calls:?}");
        calls[0]
    }

    fn ack(orchestrator: &mut MissionOrchestrator, expected: LinkOp) {
        let (ticket, op) = single_link_call(orchestrator);
        assert_eq!(op, expected);
        orchestrator.on_link_result(ticket, Ok(())).unwrap();
    }

    fn executing() -> MissionOrchestrator {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        orchestrator.take_effects();
        orchestrator.upload_and_start().unwrap();
        ack(&mut orchestrator, LinkOp::LoadMission);
        ack(&mut orchestrator, LinkOp::UploadMission);
        ack(&mut orchestrator, LinkOp::StartMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        orchestrator.take_effects();
        orchestrator
    }

    fn progress(waypoint: usize, reached: bool) -> FlightEvent {
        FlightEvent::Execution(ExecutionProgress {
            target_waypoint_index: waypoint,
            reached,
            state: LinkMissionState::Executing,
            total_waypoints: 12,
        })
    }

    fn started_fetch(effects: &[Effect]) -> Option<FetchId> {
        effects.iter().find_map(|effect| match effect {
            Effect::StartFetch { fetch_id, .. } => Some(*fetch_id),
            _ => None,
        })
    }

    /// Executing mission paused for review at waypoint 3 with a fetch running.
    fn paused_for_review() -> (MissionOrchestrator, FetchId) {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        let fetch_id = started_fetch(&orchestrator.take_effects()).expect("fetch started");
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);
        (orchestrator, fetch_id)
    }

    fn photo() -> Photo {
        Photo {
            file_name: "DJI_0042.JPG".to_string(),
            created_at: Utc::now(),
            content: PhotoContent::Thumbnail,
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn build_plan_rejects_empty_input() {
        let mut orchestrator = orchestrator();
        let err = orchestrator.build_plan(&[], &offsets()).unwrap_err();
        assert!(matches!(err, MissionError::EmptyInput(_)));
        assert_eq!(orchestrator.phase(), MissionPhase::Idle);
    }

    #[test]
    fn build_plan_without_home_uses_first_structure() {
        let mut orchestrator = MissionOrchestrator::new(MissionConfig::default());
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        let plan = orchestrator.plan().unwrap();
        assert_eq!(plan.waypoints[0].lat, structures()[0].latitude);
        assert_eq!(orchestrator.phase(), MissionPhase::PlanReady);
    }

    #[test]
    fn upload_chain_runs_in_order() {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        orchestrator.upload_and_start().unwrap();
        assert_eq!(orchestrator.phase(), MissionPhase::Uploading);

        ack(&mut orchestrator, LinkOp::LoadMission);
        ack(&mut orchestrator, LinkOp::UploadMission);
        ack(&mut orchestrator, LinkOp::StartMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
    }

    #[test]
    fn upload_failure_keeps_plan_and_allows_retry() {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        orchestrator.upload_and_start().unwrap();
        ack(&mut orchestrator, LinkOp::LoadMission);

        let (ticket, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::UploadMission);
        orchestrator
            .on_link_result(ticket, Err(LinkError::rejected(LinkOp::UploadMission, "checksum")))
            .unwrap();

        assert_eq!(orchestrator.phase(), MissionPhase::Failed);
        assert!(orchestrator.plan().is_some());
        assert!(orchestrator.snapshot().last_error.unwrap().contains("checksum"));
        assert!(link_calls(&orchestrator.take_effects()).is_empty());

        orchestrator.upload_and_start().unwrap();
        ack(&mut orchestrator, LinkOp::LoadMission);
        ack(&mut orchestrator, LinkOp::UploadMission);
        ack(&mut orchestrator, LinkOp::StartMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        assert_eq!(orchestrator.snapshot().last_error, None);
    }

    #[test]
    fn second_command_while_link_busy_is_rejected() {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        orchestrator.upload_and_start().unwrap();
        assert!(matches!(
            orchestrator.upload_and_start(),
            Err(MissionError::InvalidTransition { .. })
        ));

        let mut orchestrator = executing();
        orchestrator.pause_manual().unwrap();
        assert!(matches!(orchestrator.pause_manual(), Err(MissionError::Busy { .. })));
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        orchestrator.upload_and_start().unwrap();
        let (ticket, _) = single_link_call(&mut orchestrator);

        assert_eq!(
            orchestrator.on_link_result(ticket + 7, Ok(())),
            Err(MissionError::StaleEvent)
        );
        assert_eq!(orchestrator.phase(), MissionPhase::Uploading);
    }

    #[test]
    fn reached_photo_waypoint_pauses_and_fetches() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        assert!(orchestrator.run_state().is_photo_gate_open);
        ack(&mut orchestrator, LinkOp::PauseMission);

        let effects = orchestrator.take_effects();
        assert!(started_fetch(&effects).is_some());
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);
        assert_eq!(orchestrator.last_handled_photo_waypoint(), Some(3));
    }

    #[test]
    fn duplicate_progress_triggers_once() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        assert_eq!(link_calls(&orchestrator.take_effects()).len(), 1);
    }

    #[test]
    fn non_photo_waypoints_never_trigger() {
        let mut orchestrator = executing();
        for waypoint in [0, 1, 2, 6, 7, 8] {
            orchestrator.on_flight_event(progress(waypoint, true)).unwrap();
        }
        let effects = orchestrator.take_effects();
        assert!(link_calls(&effects).is_empty());
        assert!(!effects.iter().any(|e| matches!(e, Effect::ArmReviewTimer { .. })));
        assert_eq!(orchestrator.run_state().plan_index_cursor, Some(8));
    }

    #[test]
    fn unreached_event_arms_timer_that_triggers_review() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(4, false)).unwrap();
        let timer = orchestrator
            .take_effects()
            .into_iter()
            .find_map(|effect| match effect {
                Effect::ArmReviewTimer { timer, delay } => {
                    assert_eq!(delay, Duration::from_secs(3));
                    Some(timer)
                }
                _ => None,
            })
            .expect("timer armed");

        orchestrator.on_review_timeout(timer).unwrap();
        let (_, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::PauseMission);

        // The late reached event is a no-op.
        orchestrator.on_flight_event(progress(4, true)).unwrap();
        assert!(orchestrator.take_effects().is_empty());
    }

    #[test]
    fn pause_failure_keeps_executing() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        let (ticket, _) = single_link_call(&mut orchestrator);
        orchestrator
            .on_link_result(ticket, Err(LinkError::Timeout { op: LinkOp::PauseMission }))
            .unwrap();

        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        assert!(!orchestrator.run_state().is_photo_gate_open);
        assert_eq!(orchestrator.last_handled_photo_waypoint(), Some(3));
        assert!(started_fetch(&orchestrator.take_effects()).is_none());
    }

    #[test]
    fn review_while_manually_paused_skips_pause_command() {
        let mut orchestrator = executing();
        orchestrator.pause_manual().unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        assert_eq!(orchestrator.phase(), MissionPhase::PausedManual);

        orchestrator.review_now().unwrap();
        orchestrator
            .on_flight_event(FlightEvent::Execution(ExecutionProgress {
                target_waypoint_index: 5,
                reached: false,
                state: LinkMissionState::ExecutionPaused,
                total_waypoints: 12,
            }))
            .unwrap();

        let effects = orchestrator.take_effects();
        assert!(link_calls(&effects).is_empty());
        assert!(started_fetch(&effects).is_some());
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);
    }

    #[test]
    fn review_deferred_while_link_busy() {
        let mut orchestrator = executing();
        orchestrator.pause_manual().unwrap();
        let (ticket, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::PauseMission);

        orchestrator.on_flight_event(progress(3, true)).unwrap();
        assert!(link_calls(&orchestrator.take_effects()).is_empty());

        orchestrator.on_link_result(ticket, Ok(())).unwrap();
        let effects = orchestrator.take_effects();
        assert!(link_calls(&effects).is_empty());
        assert!(started_fetch(&effects).is_some());
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);
    }

    #[test]
    fn review_raised_during_manual_resume_pauses_after_ack() {
        let mut orchestrator = executing();
        orchestrator.pause_manual().unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        orchestrator.resume_manual().unwrap();
        let (ticket, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::ResumeMission);

        // Aircraft already flying and reports arrival before the resume ack.
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        let effects = orchestrator.take_effects();
        assert!(link_calls(&effects).is_empty());
        assert!(started_fetch(&effects).is_none());
        assert_eq!(orchestrator.phase(), MissionPhase::PausedManual);

        orchestrator.on_link_result(ticket, Ok(())).unwrap();
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        ack(&mut orchestrator, LinkOp::PauseMission);
        let fetch_id = started_fetch(&orchestrator.take_effects()).expect("fetch started");
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);

        orchestrator
            .on_fetch_outcome(
                fetch_id,
                FetchOutcome::Delivered {
                    photo: photo(),
                    location: StorageLocation::InternalStorage,
                },
            )
            .unwrap();
        orchestrator.decide_review(ReviewDecision::Accept).unwrap();
        ack(&mut orchestrator, LinkOp::ResumeMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        assert!(!orchestrator.snapshot().is_photo_gate_open);

        // Later photo waypoints still get reviewed.
        orchestrator.on_flight_event(progress(4, true)).unwrap();
        let (_, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::PauseMission);
        assert_eq!(orchestrator.last_handled_photo_waypoint(), Some(4));
    }

    #[test]
    fn review_timeout_during_manual_resume_is_deferred() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, false)).unwrap();
        let timer = orchestrator
            .take_effects()
            .iter()
            .find_map(|effect| match effect {
                Effect::ArmReviewTimer { timer, .. } => Some(*timer),
                _ => None,
            })
            .expect("timer armed");

        orchestrator.pause_manual().unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        orchestrator.resume_manual().unwrap();
        let (ticket, _) = single_link_call(&mut orchestrator);

        orchestrator.on_review_timeout(timer).unwrap();
        assert_eq!(orchestrator.phase(), MissionPhase::PausedManual);
        assert!(started_fetch(&orchestrator.take_effects()).is_none());

        orchestrator.on_link_result(ticket, Ok(())).unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        assert_eq!(orchestrator.phase(), MissionPhase::PausedForReview);
    }

    #[test]
    fn review_now_triggers_latest_photo_waypoint() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(7, false)).unwrap();
        orchestrator.take_effects();

        orchestrator.review_now().unwrap();
        let (_, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::PauseMission);
        assert_eq!(orchestrator.last_handled_photo_waypoint(), Some(5));
    }

    #[test]
    fn review_now_before_photos_waits_for_next_one() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(1, false)).unwrap();
        orchestrator.review_now().unwrap();
        assert!(link_calls(&orchestrator.take_effects()).is_empty());

        // Next photo waypoint triggers without the reached flag.
        orchestrator.on_flight_event(progress(3, false)).unwrap();
        let (_, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::PauseMission);
    }

    #[test]
    fn accept_resumes_and_closes_gate() {
        let (mut orchestrator, fetch_id) = paused_for_review();
        orchestrator
            .on_fetch_outcome(
                fetch_id,
                FetchOutcome::Delivered {
                    photo: photo(),
                    location: StorageLocation::SdCard,
                },
            )
            .unwrap();
        let effects = orchestrator.take_effects();
        assert!(effects.iter().any(|effect| matches!(
            effect,
            Effect::Notify(Notification::PhotoForReview {
                structure_index: 0,
                photo_index: 0,
                ..
            })
        )));

        orchestrator.decide_review(ReviewDecision::Accept).unwrap();
        ack(&mut orchestrator, LinkOp::ResumeMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
        assert!(!orchestrator.run_state().is_photo_gate_open);

        // The working storage location carries over to the next review.
        orchestrator.on_flight_event(progress(4, true)).unwrap();
        ack(&mut orchestrator, LinkOp::PauseMission);
        let location = orchestrator.take_effects().into_iter().find_map(|effect| match effect {
            Effect::StartFetch { location, .. } => Some(location),
            _ => None,
        });
        assert_eq!(location, Some(StorageLocation::SdCard));
    }

    #[test]
    fn retake_restarts_fetch_and_invalidates_old_one() {
        let (mut orchestrator, fetch_id) = paused_for_review();
        orchestrator.decide_review(ReviewDecision::Retake).unwrap();
        let effects = orchestrator.take_effects();
        assert!(effects.contains(&Effect::CancelFetch(fetch_id)));
        let new_id = started_fetch(&effects).unwrap();
        assert_ne!(new_id, fetch_id);

        assert_eq!(
            orchestrator.on_fetch_outcome(
                fetch_id,
                FetchOutcome::Delivered {
                    photo: photo(),
                    location: StorageLocation::InternalStorage
                }
            ),
            Err(MissionError::StaleEvent)
        );
    }

    #[test]
    fn exhausted_fetch_offers_retry_or_skip() {
        let (mut orchestrator, fetch_id) = paused_for_review();
        orchestrator
            .on_fetch_outcome(
                fetch_id,
                FetchOutcome::Exhausted {
                    error: FetchError::Exhausted {
                        attempts: 5,
                        last: Box::new(FetchError::NoCandidatePhoto),
                    },
                    location: StorageLocation::InternalStorage,
                },
            )
            .unwrap();
        assert!(orchestrator
            .take_effects()
            .iter()
            .any(|effect| matches!(effect, Effect::Notify(Notification::FetchFailed(_)))));

        orchestrator
            .decide_fetch_failure(FetchFailureDecision::RetryFetch)
            .unwrap();
        assert!(started_fetch(&orchestrator.take_effects()).is_some());

        orchestrator
            .decide_fetch_failure(FetchFailureDecision::SkipAndResume)
            .unwrap();
        ack(&mut orchestrator, LinkOp::ResumeMission);
        assert_eq!(orchestrator.phase(), MissionPhase::Executing);
    }

    #[test]
    fn abort_cancels_fetch_before_stop() {
        let (mut orchestrator, fetch_id) = paused_for_review();
        orchestrator.abort().unwrap();
        let effects = orchestrator.take_effects();

        let cancel = effects
            .iter()
            .position(|effect| *effect == Effect::CancelFetch(fetch_id))
            .expect("fetch cancelled");
        let stop = effects
            .iter()
            .position(|effect| matches!(effect, Effect::Link { request: LinkRequest::StopMission, .. }))
            .expect("stop issued");
        assert!(cancel < stop);
        assert_eq!(orchestrator.phase(), MissionPhase::Aborting);
        assert!(!orchestrator.run_state().is_photo_gate_open);
    }

    #[test]
    fn abort_with_successful_stop_flies_return_leg() {
        let mut orchestrator = executing();
        orchestrator
            .on_flight_event(FlightEvent::Position(AircraftPosition {
                lat: 47.3980,
                lon: 8.5460,
                altitude_m: 430.0,
            }))
            .unwrap();
        orchestrator.abort().unwrap();
        ack(&mut orchestrator, LinkOp::StopMission);
        assert_eq!(orchestrator.phase(), MissionPhase::ReturningHome);

        let effects = orchestrator.take_effects();
        let (ticket, plan) = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Link {
                    ticket,
                    request: LinkRequest::LoadMission(plan),
                } => Some((*ticket, plan.clone())),
                _ => None,
            })
            .expect("return plan loaded");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.waypoints[0].lat, 47.3980);
        assert_eq!(plan.waypoints[1].lat, 47.3970);
        orchestrator.on_link_result(ticket, Ok(())).unwrap();

        // Finished event of the stopped inspection mission is not the return leg.
        assert_eq!(
            orchestrator.on_flight_event(FlightEvent::Finished { error: None }),
            Err(MissionError::StaleEvent)
        );

        ack(&mut orchestrator, LinkOp::UploadMission);
        ack(&mut orchestrator, LinkOp::StartMission);
        orchestrator
            .on_flight_event(FlightEvent::Finished { error: None })
            .unwrap();
        assert_eq!(orchestrator.phase(), MissionPhase::Idle);
    }

    #[test]
    fn abort_with_failing_stop_issues_raw_go_home() {
        let mut orchestrator = executing();
        orchestrator.abort().unwrap();
        let (ticket, op) = single_link_call(&mut orchestrator);
        assert_eq!(op, LinkOp::StopMission);
        orchestrator
            .on_link_result(ticket, Err(LinkError::Unavailable { op: LinkOp::StopMission }))
            .unwrap();

        let effects = orchestrator.take_effects();
        let (ticket, altitude) = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Link {
                    ticket,
                    request: LinkRequest::SetReturnHomeAltitude(altitude),
                } => Some((*ticket, *altitude)),
                _ => None,
            })
            .expect("return-home altitude set");
        assert_eq!(altitude, 25.0);

        // Go-home is issued even when the altitude call fails.
        orchestrator
            .on_link_result(
                ticket,
                Err(LinkError::rejected(LinkOp::SetReturnHomeAltitude, "out of range")),
            )
            .unwrap();
        ack(&mut orchestrator, LinkOp::StartGoHome);
        assert_eq!(orchestrator.phase(), MissionPhase::Idle);
    }

    #[test]
    fn abort_supersedes_outstanding_call() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(3, true)).unwrap();
        let (pause_ticket, _) = single_link_call(&mut orchestrator);

        orchestrator.abort().unwrap();
        assert_eq!(
            orchestrator.on_link_result(pause_ticket, Ok(())),
            Err(MissionError::StaleEvent)
        );
        assert_eq!(orchestrator.phase(), MissionPhase::Aborting);
    }

    #[test]
    fn abort_not_allowed_when_idle() {
        let mut orchestrator = orchestrator();
        assert!(matches!(
            orchestrator.abort(),
            Err(MissionError::InvalidTransition {
                phase: MissionPhase::Idle,
                ..
            })
        ));
    }

    #[test]
    fn finished_mission_resets_run_state() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(11, false)).unwrap();
        orchestrator.take_effects();
        orchestrator
            .on_flight_event(FlightEvent::Finished { error: None })
            .unwrap();

        let phases: Vec<MissionPhase> = orchestrator
            .take_effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Notify(Notification::PhaseChanged(phase)) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![MissionPhase::Finishing, MissionPhase::Idle]);
        assert_eq!(orchestrator.run_state(), &MissionRunState::default());
    }

    #[test]
    fn finished_with_error_fails_mission() {
        let mut orchestrator = executing();
        orchestrator
            .on_flight_event(FlightEvent::Finished {
                error: Some("motor overload".to_string()),
            })
            .unwrap();
        assert_eq!(orchestrator.phase(), MissionPhase::Failed);
        assert!(orchestrator.plan().is_some());
    }

    #[test]
    fn progress_outside_running_phases_is_stale() {
        let mut orchestrator = orchestrator();
        orchestrator.build_plan(&structures(), &offsets()).unwrap();
        assert_eq!(
            orchestrator.on_flight_event(progress(3, true)),
            Err(MissionError::StaleEvent)
        );
    }

    #[test]
    fn snapshot_reports_progress() {
        let mut orchestrator = executing();
        orchestrator.on_flight_event(progress(9, false)).unwrap();
        let snapshot = orchestrator.snapshot();
        let progress = snapshot.progress.unwrap();
        assert_eq!(progress.structure_index, Some(1));
        assert_eq!(progress.photo_index, Some(0));
        assert_eq!(snapshot.plan_waypoints, 12);
        assert!(snapshot.mission_id.is_some());
    }
}
