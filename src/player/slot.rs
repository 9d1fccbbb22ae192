use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::backend::{PlaybackAdapter, PlayerFactory, PlayerKind};
use super::embed::EmbedPlayer;
use super::events::PlayerEventSender;
use super::native::NativePlayer;
use super::properties::PlayerState;
use super::source::MediaSource;
use crate::error::PlayerError;

/// Factory for the built-in headless backends
pub struct HeadlessFactory {
    embed_init_delay: Duration,
}

impl HeadlessFactory {
    pub fn new(embed_init_delay: Duration) -> Self {
        Self { embed_init_delay }
    }
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl PlayerFactory for HeadlessFactory {
    fn create(
        &self,
        kind: PlayerKind,
        generation: u64,
        events: PlayerEventSender,
    ) -> Box<dyn PlaybackAdapter> {
        match kind {
            PlayerKind::Native => Box::new(NativePlayer::new(events)),
            PlayerKind::Youtube | PlayerKind::Vimeo => Box::new(EmbedPlayer::spawn(
                kind,
                generation,
                events,
                self.embed_init_delay,
            )),
        }
    }
}

/// How long a freshly created adapter may take to become ready
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// The one adapter currently in use, plus the URL it was asked to load
pub struct ActivePlayer {
    factory: Box<dyn PlayerFactory>,
    events: PlayerEventSender,
    adapter: Option<Box<dyn PlaybackAdapter>>,
    /// Bumped for every adapter created; readiness signals carry it
    generation: u64,
    created_at: Option<Instant>,
    ready_timeout: Duration,
    loaded_url: Option<String>,
    volume: f64,
}

impl ActivePlayer {
    pub fn new(factory: Box<dyn PlayerFactory>, events: PlayerEventSender) -> Self {
        Self {
            factory,
            events,
            adapter: None,
            generation: 0,
            created_at: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            loaded_url: None,
            volume: 1.0,
        }
    }

    pub fn set_ready_timeout(&mut self, timeout: Duration) {
        self.ready_timeout = timeout;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A load is outstanding and the adapter missed its readiness deadline
    pub fn is_ready_overdue(&self, now: Instant) -> bool {
        if self.loaded_url.is_none() || self.is_ready() {
            return false;
        }
        self.created_at
            .is_some_and(|created| now.saturating_duration_since(created) >= self.ready_timeout)
    }

    pub fn kind(&self) -> Option<PlayerKind> {
        self.adapter.as_ref().map(|a| a.kind())
    }

    pub fn loaded_url(&self) -> Option<&str> {
        self.loaded_url.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_ready())
    }

    pub fn state(&self) -> PlayerState {
        self.adapter
            .as_ref()
            .map(|a| a.state())
            .unwrap_or_default()
    }

    /// Tear down the current adapter and bring up one of `kind`.
    /// A no-op when that kind is already active.
    pub fn switch_to(&mut self, kind: PlayerKind) {
        if self.kind() == Some(kind) {
            return;
        }
        if let Some(mut previous) = self.adapter.take() {
            info!(
                "Switching player {} -> {}",
                previous.kind().display_name(),
                kind.display_name()
            );
            previous.shutdown();
        } else {
            info!("Starting {}", kind.display_name());
        }
        self.generation += 1;
        let mut adapter = self
            .factory
            .create(kind, self.generation, self.events.clone());
        adapter.set_volume(self.volume);
        self.adapter = Some(adapter);
        self.created_at = Some(Instant::now());
        self.loaded_url = None;
    }

    /// Open `url` on the active adapter, switching backend first if needed
    pub fn load(&mut self, url: &str, source: &MediaSource) -> Result<(), PlayerError> {
        let Some(kind) = source.kind() else {
            return Err(PlayerError::VideoLoadFailed(format!(
                "Unrecognized video source: {}",
                url
            )));
        };
        self.switch_to(kind);
        let Some(adapter) = self.adapter.as_mut() else {
            return Err(PlayerError::VideoLoadFailed(url.to_string()));
        };
        adapter.load(source)?;
        debug!("Player asked to load {}", url);
        self.loaded_url = Some(url.to_string());
        Ok(())
    }

    pub fn play(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.pause();
        }
    }

    pub fn seek(&mut self, time: f64) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.seek(time);
        }
    }

    pub fn set_volume(&mut self, level: f64) {
        self.volume = level.clamp(0.0, 1.0);
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_volume(self.volume);
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn current_time(&self) -> f64 {
        self.adapter.as_ref().map(|a| a.current_time()).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.adapter.as_ref().map(|a| a.duration()).unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_playing())
    }

    /// Forward a readiness signal to the adapter it belongs to
    pub fn on_ready(&mut self, kind: PlayerKind, generation: u64) {
        match self.adapter.as_mut() {
            Some(adapter) if generation == self.generation && adapter.kind() == kind => {
                adapter.on_ready()
            }
            _ => debug!(
                "Ignoring stale ready signal from {} (generation {})",
                kind.display_name(),
                generation
            ),
        }
    }

    pub fn set_duration(&mut self, duration: f64) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_duration(duration);
        }
    }

    pub fn tick(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.tick();
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.shutdown();
        }
        self.loaded_url = None;
    }
}
