use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::backend::{PlaybackAdapter, PlayerKind};
use super::events::{emit, PlayerEvent, PlayerEventSender};
use super::properties::Timeline;
use super::source::MediaSource;
use crate::error::PlayerError;

/// Third-party embedded player (YouTube, Vimeo).
///
/// The embed initializes asynchronously. Until `on_ready` fires, queries are
/// neutral and mutators are dropped; a `load` is parked in a single pending
/// slot (a later load replaces an earlier one) and replayed on readiness.
pub struct EmbedPlayer {
    kind: PlayerKind,
    generation: u64,
    events: PlayerEventSender,
    ready: bool,
    pending: Option<MediaSource>,
    video_id: Option<String>,
    timeline: Timeline,
    volume: f64,
    end_reported: bool,
}

impl EmbedPlayer {
    pub fn new(kind: PlayerKind, generation: u64, events: PlayerEventSender) -> Self {
        Self {
            kind,
            generation,
            events,
            ready: false,
            pending: None,
            video_id: None,
            timeline: Timeline::new(),
            volume: 1.0,
            end_reported: false,
        }
    }

    /// Build an embed whose readiness signal arrives after `delay`
    pub fn spawn(
        kind: PlayerKind,
        generation: u64,
        events: PlayerEventSender,
        delay: Duration,
    ) -> Self {
        let player = Self::new(kind, generation, events.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    debug!("{} embed initialized", kind.display_name());
                    emit(&events, PlayerEvent::Ready { kind, generation });
                });
            }
            Err(_) => {
                warn!("No runtime to initialize {} embed", kind.display_name());
                emit(
                    &events,
                    PlayerEvent::LoadFailed {
                        url: kind.display_name().to_string(),
                        reason: format!("{} player could not be initialized", kind.display_name()),
                    },
                );
            }
        }
        player
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending(&self) -> Option<&MediaSource> {
        self.pending.as_ref()
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    fn accepts(&self, source: &MediaSource) -> Option<String> {
        match (self.kind, source) {
            (PlayerKind::Youtube, MediaSource::Youtube { id })
            | (PlayerKind::Vimeo, MediaSource::Vimeo { id }) => Some(id.clone()),
            _ => None,
        }
    }

    fn open(&mut self, source: &MediaSource) -> Result<(), PlayerError> {
        let Some(id) = self.accepts(source) else {
            return Err(PlayerError::VideoLoadFailed(format!(
                "{:?} cannot be opened by the {} player",
                source,
                self.kind.display_name()
            )));
        };
        info!("{} embed cueing {}", self.kind.display_name(), id);
        let url = canonical_url(self.kind, &id);
        self.video_id = Some(id);
        self.timeline.reset(None);
        self.end_reported = false;
        emit(&self.events, PlayerEvent::Loaded { url });
        Ok(())
    }

    fn active(&self) -> bool {
        self.ready && self.video_id.is_some()
    }
}

fn canonical_url(kind: PlayerKind, id: &str) -> String {
    match kind {
        PlayerKind::Youtube => format!("https://www.youtube.com/watch?v={}", id),
        PlayerKind::Vimeo => format!("https://vimeo.com/{}", id),
        PlayerKind::Native => id.to_string(),
    }
}

impl PlaybackAdapter for EmbedPlayer {
    fn kind(&self) -> PlayerKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.active()
    }

    fn load(&mut self, source: &MediaSource) -> Result<(), PlayerError> {
        if self.accepts(source).is_none() {
            return Err(PlayerError::VideoLoadFailed(format!(
                "{:?} cannot be opened by the {} player",
                source,
                self.kind.display_name()
            )));
        }
        if !self.ready {
            if self.pending.replace(source.clone()).is_some() {
                debug!("Replacing pending embed load");
            }
            return Ok(());
        }
        self.open(source)
    }

    fn play(&mut self) {
        if self.active() {
            self.timeline.play_at(Instant::now());
        }
    }

    fn pause(&mut self) {
        if self.active() {
            self.timeline.pause_at(Instant::now());
        }
    }

    fn seek(&mut self, time: f64) {
        if self.active() {
            self.timeline.seek_at(time, Instant::now());
            self.end_reported = false;
        }
    }

    fn set_volume(&mut self, level: f64) {
        self.volume = level.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn current_time(&self) -> f64 {
        if !self.active() {
            return 0.0;
        }
        self.timeline.position()
    }

    fn duration(&self) -> f64 {
        if !self.active() {
            return 0.0;
        }
        self.timeline.duration().unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.active() && self.timeline.is_playing()
    }

    fn set_duration(&mut self, duration: f64) {
        let now = Instant::now();
        let position = self.timeline.position_at(now);
        let playing = self.timeline.is_playing();
        self.timeline.reset(Some(duration));
        self.timeline.seek_at(position, now);
        if playing {
            self.timeline.play_at(now);
        }
    }

    fn on_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        info!("{} embed ready", self.kind.display_name());
        if let Some(source) = self.pending.take() {
            if let Err(e) = self.open(&source) {
                emit(
                    &self.events,
                    PlayerEvent::LoadFailed {
                        url: format!("{:?}", source),
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn tick(&mut self) {
        if self.end_reported || !self.active() {
            return;
        }
        let now = Instant::now();
        if self.timeline.is_finished_at(now) {
            self.end_reported = true;
            self.timeline.pause_at(now);
            emit(&self.events, PlayerEvent::Ended);
        }
    }

    fn shutdown(&mut self) {
        self.pending = None;
        self.video_id = None;
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::events;

    fn youtube(id: &str) -> MediaSource {
        MediaSource::Youtube { id: id.to_string() }
    }

    #[test]
    fn test_embed_queries_neutral_until_ready() {
        let (tx, _rx) = events::channel();
        let mut player = EmbedPlayer::new(PlayerKind::Youtube, 1, tx);
        player.load(&youtube("dQw4w9WgXcQ")).unwrap();
        player.play();
        player.seek(12.0);
        assert!(!player.is_ready());
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.duration(), 0.0);
    }

    #[test]
    fn test_embed_pending_load_replayed_once_on_ready() {
        let (tx, mut rx) = events::channel();
        let mut player = EmbedPlayer::new(PlayerKind::Youtube, 1, tx);
        player.load(&youtube("aaaaaaaaaaa")).unwrap();
        player.load(&youtube("bbbbbbbbbbb")).unwrap();
        assert_eq!(player.pending(), Some(&youtube("bbbbbbbbbbb")));

        player.on_ready();
        assert_eq!(player.video_id(), Some("bbbbbbbbbbb"));
        assert!(player.pending().is_none());
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Loaded {
                url: "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string()
            }
        );

        // A second readiness signal must not replay anything
        player.on_ready();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_embed_rejects_other_kind() {
        let (tx, _rx) = events::channel();
        let mut player = EmbedPlayer::new(PlayerKind::Vimeo, 1, tx);
        let err = player.load(&youtube("dQw4w9WgXcQ")).unwrap_err();
        assert!(matches!(err, PlayerError::VideoLoadFailed(_)));
        assert!(player.pending().is_none());
    }

    #[test]
    fn test_embed_controls_after_ready() {
        let (tx, _rx) = events::channel();
        let mut player = EmbedPlayer::new(PlayerKind::Vimeo, 1, tx);
        player.on_ready();
        player
            .load(&MediaSource::Vimeo {
                id: "76979871".into(),
            })
            .unwrap();
        player.seek(20.0);
        player.play();
        assert!(player.is_playing());
        assert!(player.current_time() >= 20.0);
        player.pause();
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_embed_spawn_signals_ready() {
        let (tx, mut rx) = events::channel();
        let player = EmbedPlayer::spawn(PlayerKind::Youtube, 7, tx, Duration::from_millis(5));
        assert_eq!(player.generation(), 7);
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PlayerEvent::Ready {
                kind: PlayerKind::Youtube,
                generation: 7
            }
        );
    }

    #[test]
    fn test_embed_without_runtime_reports_failure() {
        let (tx, mut rx) = events::channel();
        let player = EmbedPlayer::spawn(PlayerKind::Vimeo, 1, tx, Duration::from_millis(5));
        assert!(!player.is_ready());
        assert!(matches!(
            rx.try_recv().unwrap(),
            PlayerEvent::LoadFailed { .. }
        ));
    }

    #[test]
    fn test_embed_end_after_duration_known() {
        let (tx, mut rx) = events::channel();
        let mut player = EmbedPlayer::new(PlayerKind::Youtube, 1, tx);
        player.on_ready();
        player.load(&youtube("dQw4w9WgXcQ")).unwrap();
        let _ = rx.try_recv();
        player.set_duration(3.0);
        player.seek(3.0);
        player.tick();
        player.tick();
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::Ended);
        assert!(rx.try_recv().is_err());
    }
}
