//! Scripted operator for unattended runs.

use inspection_mission::{FetchFailureDecision, ReviewDecision};

use crate::console::OperatorPrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    Review(ReviewDecision),
    FetchFailure(FetchFailureDecision),
    Abort,
    Wait,
}

/// Accepts every photo, with a few knobs to exercise the other paths.
#[derive(Debug, Clone)]
pub struct AutoOperator {
    retake_first: bool,
    abort_after: Option<usize>,
    max_fetch_retries: u32,
    accepted: usize,
    retake_done: bool,
    fetch_retries: u32,
}

impl AutoOperator {
    pub fn new(retake_first: bool, abort_after: Option<usize>, max_fetch_retries: u32) -> Self {
        Self {
            retake_first,
            abort_after,
            max_fetch_retries,
            accepted: 0,
            retake_done: false,
            fetch_retries: 0,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn on_prompt(&mut self, prompt: &OperatorPrompt) -> OperatorAction {
        match prompt {
            OperatorPrompt::ReviewPhoto { .. } => {
                self.fetch_retries = 0;
                if self.retake_first && !self.retake_done {
                    self.retake_done = true;
                    return OperatorAction::Review(ReviewDecision::Retake);
                }
                self.accepted += 1;
                if self.abort_after == Some(self.accepted) {
                    OperatorAction::Abort
                } else {
                    OperatorAction::Review(ReviewDecision::Accept)
                }
            }
            OperatorPrompt::FetchFailed { .. } => {
                if self.fetch_retries < self.max_fetch_retries {
                    self.fetch_retries += 1;
                    OperatorAction::FetchFailure(FetchFailureDecision::RetryFetch)
                } else {
                    self.fetch_retries = 0;
                    OperatorAction::FetchFailure(FetchFailureDecision::SkipAndResume)
                }
            }
            OperatorPrompt::Phase(_) => OperatorAction::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> OperatorPrompt {
        OperatorPrompt::ReviewPhoto {
            file_name: "DJI_0001.JPG".to_string(),
            structure_index: 0,
            photo_index: 0,
            size_bytes: 64,
        }
    }

    fn fetch_failed() -> OperatorPrompt {
        OperatorPrompt::FetchFailed {
            reason: "gave up".to_string(),
        }
    }

    #[test]
    fn retakes_only_the_first_photo() {
        let mut operator = AutoOperator::new(true, None, 0);
        assert_eq!(operator.on_prompt(&review()), OperatorAction::Review(ReviewDecision::Retake));
        assert_eq!(operator.on_prompt(&review()), OperatorAction::Review(ReviewDecision::Accept));
        assert_eq!(operator.on_prompt(&review()), OperatorAction::Review(ReviewDecision::Accept));
        assert_eq!(operator.accepted(), 2);
    }

    #[test]
    fn aborts_after_requested_photo_count() {
        let mut operator = AutoOperator::new(false, Some(2), 0);
        assert_eq!(operator.on_prompt(&review()), OperatorAction::Review(ReviewDecision::Accept));
        assert_eq!(operator.on_prompt(&review()), OperatorAction::Abort);
    }

    #[test]
    fn retries_then_skips_failed_retrieval() {
        let mut operator = AutoOperator::new(false, None, 2);
        let retry = OperatorAction::FetchFailure(FetchFailureDecision::RetryFetch);
        let skip = OperatorAction::FetchFailure(FetchFailureDecision::SkipAndResume);

        assert_eq!(operator.on_prompt(&fetch_failed()), retry);
        assert_eq!(operator.on_prompt(&fetch_failed()), retry);
        assert_eq!(operator.on_prompt(&fetch_failed()), skip);
        // Budget resets for the next photo
        assert_eq!(operator.on_prompt(&fetch_failed()), retry);
    }

    #[test]
    fn phase_changes_need_no_answer() {
        let mut operator = AutoOperator::new(false, None, 1);
        assert_eq!(
            operator.on_prompt(&OperatorPrompt::Phase(inspection_mission::MissionPhase::Executing)),
            OperatorAction::Wait
        );
    }
}
