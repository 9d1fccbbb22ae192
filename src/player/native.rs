use std::time::Instant;
use tracing::{debug, info};

use super::backend::{PlaybackAdapter, PlayerKind};
use super::events::{emit, PlayerEvent, PlayerEventSender};
use super::properties::Timeline;
use super::source::MediaSource;
use crate::error::PlayerError;

/// Headless direct-file player.
///
/// Keeps a real-time timeline for the loaded URL; there is no decoder behind it,
/// so it is ready as soon as a native source has been opened.
pub struct NativePlayer {
    events: PlayerEventSender,
    url: Option<String>,
    timeline: Timeline,
    volume: f64,
    end_reported: bool,
}

impl NativePlayer {
    pub fn new(events: PlayerEventSender) -> Self {
        Self {
            events,
            url: None,
            timeline: Timeline::new(),
            volume: 1.0,
            end_reported: false,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Emits `Ended` once when the timeline reaches a known duration
    pub fn check_end(&mut self) -> bool {
        if self.end_reported || !self.timeline.is_finished_at(Instant::now()) {
            return false;
        }
        self.end_reported = true;
        self.timeline.pause_at(Instant::now());
        emit(&self.events, PlayerEvent::Ended);
        true
    }
}

impl PlaybackAdapter for NativePlayer {
    fn kind(&self) -> PlayerKind {
        PlayerKind::Native
    }

    fn is_ready(&self) -> bool {
        self.url.is_some()
    }

    fn load(&mut self, source: &MediaSource) -> Result<(), PlayerError> {
        let MediaSource::Native { url } = source else {
            return Err(PlayerError::VideoLoadFailed(format!(
                "{:?} cannot be opened by the native player",
                source
            )));
        };
        info!("Native player opening {}", url);
        self.url = Some(url.clone());
        self.timeline.reset(None);
        self.end_reported = false;
        emit(&self.events, PlayerEvent::Loaded { url: url.clone() });
        Ok(())
    }

    fn play(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.timeline.play_at(Instant::now());
    }

    fn pause(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.timeline.pause_at(Instant::now());
    }

    fn seek(&mut self, time: f64) {
        if !self.is_ready() {
            return;
        }
        debug!("Native player seeking to {:.2}s", time);
        self.timeline.seek_at(time, Instant::now());
        self.end_reported = false;
    }

    fn set_volume(&mut self, level: f64) {
        self.volume = level.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn current_time(&self) -> f64 {
        if !self.is_ready() {
            return 0.0;
        }
        self.timeline.position()
    }

    fn duration(&self) -> f64 {
        self.timeline.duration().unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.is_ready() && self.timeline.is_playing()
    }

    /// Duration is unknown to a headless player unless the caller supplies it
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

    fn tick(&mut self) {
        self.check_end();
    }

    fn shutdown(&mut self) {
        self.timeline.pause_at(Instant::now());
        self.url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::events;

    fn native(url: &str) -> MediaSource {
        MediaSource::Native {
            url: url.to_string(),
        }
    }

    #[test]
    fn test_native_neutral_before_load() {
        let (tx, _rx) = events::channel();
        let mut player = NativePlayer::new(tx);
        player.play();
        player.seek(10.0);
        assert!(!player.is_ready());
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_native_load_emits_loaded() {
        let (tx, mut rx) = events::channel();
        let mut player = NativePlayer::new(tx);
        player.load(&native("https://example.com/a.mp4")).unwrap();
        assert!(player.is_ready());
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Loaded {
                url: "https://example.com/a.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_native_rejects_embed_source() {
        let (tx, _rx) = events::channel();
        let mut player = NativePlayer::new(tx);
        let err = player
            .load(&MediaSource::Youtube {
                id: "dQw4w9WgXcQ".into(),
            })
            .unwrap_err();
        assert!(matches!(err, PlayerError::VideoLoadFailed(_)));
        assert!(!player.is_ready());
    }

    #[test]
    fn test_native_play_pause_seek() {
        let (tx, _rx) = events::channel();
        let mut player = NativePlayer::new(tx);
        player.load(&native("https://example.com/a.mp4")).unwrap();
        player.seek(30.0);
        assert!((player.current_time() - 30.0).abs() < 0.05);
        player.play();
        assert!(player.is_playing());
        player.pause();
        assert!(!player.is_playing());
        assert!(player.current_time() >= 30.0);
    }

    #[test]
    fn test_native_reports_end_once() {
        let (tx, mut rx) = events::channel();
        let mut player = NativePlayer::new(tx);
        player.load(&native("https://example.com/a.mp4")).unwrap();
        let _ = rx.try_recv();
        player.set_duration(5.0);
        player.seek(5.0);
        assert!(player.check_end());
        assert!(!player.check_end());
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::Ended);
    }
}
