use std::time::Instant;

/// Snapshot of what a backend reports
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Option<f64>,
    pub paused: Option<bool>,
    pub duration: Option<f64>,
    pub volume: Option<f64>,
    pub ready: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: None,
            paused: Some(true),
            duration: None,
            volume: None,
            ready: false,
        }
    }
}

impl PlayerState {
    pub fn position_or_zero(&self) -> f64 {
        self.position.unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.ready && self.paused == Some(false)
    }
}

/// Wall-clock playback position for headless backends.
///
/// Position advances in real time while playing and is clamped to the
/// duration once one is known.
#[derive(Debug, Clone)]
pub struct Timeline {
    base_position: f64,
    started_at: Option<Instant>,
    duration: Option<f64>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            base_position: 0.0,
            started_at: None,
            duration: None,
        }
    }

    pub fn reset(&mut self, duration: Option<f64>) {
        self.base_position = 0.0;
        self.started_at = None;
        self.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> f64 {
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start).as_secs_f64())
            .unwrap_or(0.0);
        self.clamp(self.base_position + elapsed)
    }

    pub fn play_at(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.started_at.is_some() {
            self.base_position = self.position_at(now);
            self.started_at = None;
        }
    }

    pub fn seek_at(&mut self, time: f64, now: Instant) {
        self.base_position = self.clamp(time);
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    pub fn is_finished_at(&self, now: Instant) -> bool {
        match self.duration {
            Some(duration) => self.position_at(now) >= duration,
            None => false,
        }
    }

    fn clamp(&self, time: f64) -> f64 {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        match self.duration {
            Some(duration) => time.min(duration),
            None => time,
        }
    }
}
