use tokio::sync::mpsc;

use super::backend::PlayerKind;

pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type PlayerEventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// Backend notifications the sync loop reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Backend finished initializing and accepts commands.
    /// `generation` identifies which adapter instance sent it.
    Ready { kind: PlayerKind, generation: u64 },
    /// A source has been opened
    Loaded { url: String },
    /// Backend could not open the source
    LoadFailed { url: String, reason: String },
    /// Playback reached the end of the source
    Ended,
}

pub fn channel() -> (PlayerEventSender, PlayerEventReceiver) {
    mpsc::unbounded_channel()
}

/// Send without caring whether the loop is still listening
pub fn emit(sender: &PlayerEventSender, event: PlayerEvent) {
    if sender.send(event).is_err() {
        tracing::debug!("Player event dropped, no listener");
    }
}
