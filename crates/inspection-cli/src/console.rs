//! Terminal presenter.
//!
//! Prints mission activity and forwards anything needing an operator answer
//! to whoever drives the mission handle.

use inspection_link::Photo;
use inspection_mission::{LogPresenter, MissionPhase, Presenter};
use tokio::sync::mpsc;

/// Something the operator has to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorPrompt {
    ReviewPhoto {
        file_name: String,
        structure_index: usize,
        photo_index: usize,
        size_bytes: usize,
    },
    FetchFailed {
        reason: String,
    },
    Phase(MissionPhase),
}

/// Prints to stdout and also records every callback through [`LogPresenter`].
pub struct ConsolePresenter {
    log: LogPresenter,
    prompts: mpsc::UnboundedSender<OperatorPrompt>,
}

impl ConsolePresenter {
    pub fn new(prompts: mpsc::UnboundedSender<OperatorPrompt>) -> Self {
        Self {
            log: LogPresenter,
            prompts,
        }
    }

    fn forward(&self, prompt: OperatorPrompt) {
        if self.prompts.send(prompt).is_err() {
            tracing::debug!("Operator prompt receiver dropped");
        }
    }
}

impl Presenter for ConsolePresenter {
    fn on_status(&self, text: &str) {
        self.log.on_status(text);
        println!("   {}", text);
    }

    fn on_photo_for_review(&self, photo: &Photo, structure_index: usize, photo_index: usize) {
        self.log.on_photo_for_review(photo, structure_index, photo_index);
        println!(
            "📷 Structure {} photo {}: {} ({} bytes, {:?})",
            structure_index + 1,
            photo_index + 1,
            photo.file_name,
            photo.bytes.len(),
            photo.content
        );
        self.forward(OperatorPrompt::ReviewPhoto {
            file_name: photo.file_name.clone(),
            structure_index,
            photo_index,
            size_bytes: photo.bytes.len(),
        });
    }

    fn on_photo_fetch_failed(&self, reason: &str) {
        self.log.on_photo_fetch_failed(reason);
        println!("⚠️  Photo retrieval failed: {}", reason);
        self.forward(OperatorPrompt::FetchFailed {
            reason: reason.to_string(),
        });
    }

    fn on_phase_changed(&self, phase: MissionPhase) {
        self.log.on_phase_changed(phase);
        println!("➡️  Phase: {}", phase);
        self.forward(OperatorPrompt::Phase(phase));
    }
}
