use serde::{Deserialize, Serialize};

use super::events::PlayerEventSender;
use super::properties::PlayerState;
use super::source::MediaSource;
use crate::error::PlayerError;

/// Backend family a source is played with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Direct file or stream decoding
    Native,
    /// YouTube embed
    Youtube,
    /// Vimeo embed
    Vimeo,
}

impl PlayerKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Native => "Native player",
            Self::Youtube => "YouTube",
            Self::Vimeo => "Vimeo",
        }
    }

    pub fn is_embed(self) -> bool {
        !matches!(self, Self::Native)
    }
}

/// Capability set every media backend exposes.
///
/// Before `is_ready()` turns true, queries return neutral values (zero, not playing)
/// and mutators are no-ops. `load` is the exception: a load requested early is kept
/// and replayed once the backend becomes ready.
pub trait PlaybackAdapter: Send {
    fn kind(&self) -> PlayerKind;

    fn is_ready(&self) -> bool;

    fn load(&mut self, source: &MediaSource) -> Result<(), PlayerError>;

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, time: f64);

    fn set_volume(&mut self, level: f64);

    fn volume(&self) -> f64;

    fn current_time(&self) -> f64;

    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Length of the loaded source, for backends that cannot read it themselves
    fn set_duration(&mut self, _duration: f64) {}

    /// Readiness signal from the backend's initialization
    fn on_ready(&mut self) {}

    /// Periodic housekeeping (end-of-media detection)
    fn tick(&mut self) {}

    /// Release backend resources before the adapter is replaced
    fn shutdown(&mut self) {}

    fn state(&self) -> PlayerState {
        if !self.is_ready() {
            return PlayerState::default();
        }
        PlayerState {
            position: Some(self.current_time()),
            paused: Some(!self.is_playing()),
            duration: Some(self.duration()).filter(|d| *d > 0.0),
            volume: Some(self.volume()),
            ready: true,
        }
    }
}

/// Creates adapters on demand when the active backend kind changes
pub trait PlayerFactory: Send {
    fn create(
        &self,
        kind: PlayerKind,
        generation: u64,
        events: PlayerEventSender,
    ) -> Box<dyn PlaybackAdapter>;
}
