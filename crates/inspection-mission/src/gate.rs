//! Photo review gating.
//!
//! Decides, once per arrival at a photo waypoint, whether the mission must
//! pause so the operator can confirm the captured photo. The flight link may
//! advance the target index before (or without ever) flagging the waypoint as
//! reached, so a weaker observation arms a one-shot timeout that forces the
//! review if the primary condition never shows up.

use inspection_link::LinkMissionState;

/// Observation of a photo waypoint from an execution-progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInput {
    pub waypoint: usize,
    pub reached: bool,
    pub state: LinkMissionState,
    /// A review pause is pending or in progress
    pub review_active: bool,
}

/// Identifies one armed review timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReviewTimer {
    pub waypoint: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Ignore,
    /// Pause for review now. `cancel_timer` names a pending timeout to disarm.
    Trigger {
        waypoint: usize,
        cancel_timer: Option<ReviewTimer>,
    },
    /// Arm a timeout for `timer`, replacing `supersedes` if set.
    ArmTimeout {
        timer: ReviewTimer,
        supersedes: Option<ReviewTimer>,
    },
}

#[derive(Debug, Default)]
pub struct PhotoReviewGate {
    last_handled: Option<usize>,
    pending: Option<ReviewTimer>,
    force_next: bool,
    generation: u64,
}

impl PhotoReviewGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_handled(&self) -> Option<usize> {
        self.last_handled
    }

    pub fn pending_timer(&self) -> Option<ReviewTimer> {
        self.pending
    }

    pub fn is_forced(&self) -> bool {
        self.force_next
    }

    /// Operator override: the next evaluation triggers regardless of flags.
    pub fn request_force(&mut self) {
        self.force_next = true;
    }

    pub fn evaluate(&mut self, input: GateInput) -> GateDecision {
        if self.last_handled == Some(input.waypoint) || input.review_active {
            return GateDecision::Ignore;
        }

        let primary = input.reached && input.state == LinkMissionState::Executing;
        if primary || self.force_next {
            return GateDecision::Trigger {
                waypoint: input.waypoint,
                cancel_timer: self.mark_handled(input.waypoint),
            };
        }

        let weak = matches!(
            input.state,
            LinkMissionState::Executing | LinkMissionState::ExecutionPaused
        );
        if !weak {
            return GateDecision::Ignore;
        }

        // One timer per waypoint: repeated events must not push the deadline out.
        if self.pending.map(|timer| timer.waypoint) == Some(input.waypoint) {
            return GateDecision::Ignore;
        }

        self.generation += 1;
        let timer = ReviewTimer {
            waypoint: input.waypoint,
            generation: self.generation,
        };
        let supersedes = self.pending.replace(timer);
        GateDecision::ArmTimeout { timer, supersedes }
    }

    /// Handle timer expiry. Returns the waypoint to review, or `None` when the
    /// timer is stale or the waypoint was already handled.
    pub fn on_timeout(&mut self, timer: ReviewTimer, review_active: bool) -> Option<usize> {
        if self.pending != Some(timer) {
            return None;
        }
        self.pending = None;

        if self.last_handled == Some(timer.waypoint) || review_active {
            return None;
        }

        self.mark_handled(timer.waypoint);
        Some(timer.waypoint)
    }

    /// Trigger directly for `waypoint`, consuming the force flag.
    ///
    /// Used by the operator's "review now" when the mission is executing.
    pub fn force_trigger(&mut self, waypoint: usize, review_active: bool) -> GateDecision {
        self.force_next = true;
        self.evaluate(GateInput {
            waypoint,
            reached: false,
            state: LinkMissionState::Executing,
            review_active,
        })
    }

    /// Disarm the pending timeout, returning it so the caller can cancel it.
    pub fn cancel_pending(&mut self) -> Option<ReviewTimer> {
        self.pending.take()
    }

    /// Forget everything for a new mission.
    pub fn reset(&mut self) -> Option<ReviewTimer> {
        let pending = self.pending.take();
        self.last_handled = None;
        self.force_next = false;
        pending
    }

    fn mark_handled(&mut self, waypoint: usize) -> Option<ReviewTimer> {
        self.last_handled = Some(waypoint);
        self.force_next = false;
        self.pending.take()
    }
}
