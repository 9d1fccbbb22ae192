use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::events::{ClientEvent, EventSink, NotificationLevel};
use super::messages::{append_bounded, MessageLog};
use super::room::{Message, Room, User, VideoState};
use super::session::remove_member;
use super::state::ClientState;
use crate::config::SyncWatchConfig;
use crate::error::{Error, PlayerError, Result, StoreError};
use crate::player::backend::PlayerKind;
use crate::player::events::PlayerEvent;
use crate::player::slot::ActivePlayer;
use crate::player::source::{classify, is_known_video_url};
use crate::store::{RoomStore, StoreEvent, StoreSubscription};
use crate::utils::{format_time, now_millis, truncate_text};

/// Allowed drift between local and shared position (seconds)
pub const DEFAULT_TOLERANCE_SECONDS: f64 = 2.0;
/// How long a local action shields this client from correction
pub const DEFAULT_MASTER_HOLD: Duration = Duration::from_secs(1);

/// Synchronization action to take
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Replace the active backend
    SwitchPlayer(PlayerKind),
    /// Open the shared source
    Load(String),
    /// Seek to position
    Seek(f64),
    Play,
    Pause,
}

/// Local action a user performs on playback
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    End,
}

/// A point in time on both clocks the engine uses: the monotonic clock for
/// the master window, the wall clock for `lastUpdate`.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub instant: Instant,
    pub wall_ms: i64,
}

impl Moment {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall_ms: now_millis(),
        }
    }

    pub fn after(&self, elapsed: Duration) -> Self {
        Self {
            instant: self.instant + elapsed,
            wall_ms: self.wall_ms + elapsed.as_millis() as i64,
        }
    }
}

/// What the local backend is doing, as seen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayback {
    pub kind: Option<PlayerKind>,
    pub url: Option<String>,
    pub position: f64,
    pub playing: bool,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub tolerance_seconds: f64,
    pub master_hold: Duration,
    pub message_limit: usize,
    pub max_message_length: usize,
    pub extrapolate_playing_position: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            master_hold: DEFAULT_MASTER_HOLD,
            message_limit: 100,
            max_message_length: 500,
            extrapolate_playing_position: true,
        }
    }
}

impl From<&SyncWatchConfig> for EngineOptions {
    fn from(config: &SyncWatchConfig) -> Self {
        Self {
            tolerance_seconds: config.sync.tolerance_seconds,
            master_hold: Duration::from_millis(config.sync.master_hold_ms),
            message_limit: config.room.message_limit,
            max_message_length: config.room.max_message_length,
            extrapolate_playing_position: config.sync.extrapolate_playing_position,
        }
    }
}

/// Where the shared timeline should be at `now_ms`.
///
/// A playing record is advanced by the time elapsed since it was written, so
/// followers are not dragged back to the position captured at the last action.
pub fn expected_position(video: &VideoState, now_ms: i64, duration: f64, extrapolate: bool) -> f64 {
    let mut position = video.current_time.max(0.0);
    if extrapolate && video.playing && video.last_update > 0 {
        let elapsed_ms = (now_ms - video.last_update).max(0);
        position += elapsed_ms as f64 / 1000.0;
    }
    if duration > 0.0 {
        position = position.min(duration);
    }
    position
}

/// Backend and source steps needed to show the shared video
pub fn calculate_source_actions(
    local: &LocalPlayback,
    remote: &VideoState,
) -> std::result::Result<Vec<SyncAction>, PlayerError> {
    if remote.is_idle() {
        return Ok(Vec::new());
    }
    let Some(kind) = classify(&remote.url).kind() else {
        return Err(PlayerError::VideoLoadFailed(format!(
            "Unrecognized video source: {}",
            remote.url
        )));
    };
    if let Some(recorded) = remote.player_type {
        if recorded != kind {
            warn!(
                "Shared record says {} but {} classifies as {}",
                recorded.display_name(),
                remote.url,
                kind.display_name()
            );
        }
    }

    let mut actions = Vec::new();
    if local.kind != Some(kind) {
        info!(
            "Player type mismatch: local={:?}, shared={:?} - switching",
            local.kind, kind
        );
        actions.push(SyncAction::SwitchPlayer(kind));
        actions.push(SyncAction::Load(remote.url.clone()));
    } else if local.url.as_deref() != Some(remote.url.as_str()) {
        info!("Shared source changed to {} - loading", remote.url);
        actions.push(SyncAction::Load(remote.url.clone()));
    }
    Ok(actions)
}

/// Drift and play/pause corrections for a ready, non-master client
pub fn calculate_playback_actions(
    local: &LocalPlayback,
    target_position: f64,
    target_playing: bool,
    is_master: bool,
    tolerance: f64,
) -> Vec<SyncAction> {
    let mut actions = Vec::new();
    if is_master || !local.ready {
        return actions;
    }

    let diff = local.position - target_position;
    debug!(
        "Sync check: local={:.2}s ({}), shared={:.2}s ({}), diff={:.2}s",
        local.position,
        if local.playing { "playing" } else { "paused" },
        target_position,
        if target_playing { "playing" } else { "paused" },
        diff
    );

    if diff.abs() > tolerance {
        info!(
            "Drifted {:.2}s (tolerance: {:.2}s) - seeking to {:.2}s",
            diff, tolerance, target_position
        );
        actions.push(SyncAction::Seek(target_position));
    }

    if target_playing && !local.playing {
        actions.push(SyncAction::Play);
    } else if !target_playing && local.playing {
        actions.push(SyncAction::Pause);
    }

    actions
}

/// Per-client reconciliation core.
///
/// Owns the local copy of the room and the active player. Two producers feed
/// `reconcile`: the periodic poll and store change notifications. Local
/// actions republish the whole room; nothing is merged.
pub struct SyncEngine {
    options: EngineOptions,
    store: Arc<dyn RoomStore>,
    player: ActivePlayer,
    state: ClientState,
    log: MessageLog,
    events: EventSink,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn RoomStore>,
        player: ActivePlayer,
        user: User,
        room: Room,
        options: EngineOptions,
        events: EventSink,
    ) -> Self {
        let state = ClientState::new(user, room, options.master_hold);
        let log = MessageLog::new(options.message_limit);
        Self {
            options,
            store,
            player,
            state,
            log,
            events,
        }
    }

    pub fn room(&self) -> &Room {
        self.state.room()
    }

    pub fn user(&self) -> &User {
        self.state.user()
    }

    pub fn player(&self) -> &ActivePlayer {
        &self.player
    }

    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_master_at(&mut self, now: Instant) -> bool {
        self.state.is_master(now)
    }

    pub fn last_poll(&self) -> Option<Instant> {
        self.state.last_poll()
    }

    pub fn subscribe(&self) -> StoreSubscription {
        self.store.subscribe()
    }

    /// Render the existing log, greet, and line up with the shared video
    pub fn start(&mut self) -> Vec<SyncAction> {
        let username = self.state.user().username.clone();
        if self.state.room().find_user(&self.state.user().id).is_none() {
            warn!("{} is not listed in room {}", username, self.state.code());
        }
        for message in self.log.replay(&self.state.room().messages) {
            self.events.emit(ClientEvent::Chat(message));
        }
        self.events
            .emit(ClientEvent::Users(self.state.room().users.clone()));
        self.events
            .system(format!("Welcome to the room, {}!", username));
        self.reconcile()
    }

    pub fn reconcile(&mut self) -> Vec<SyncAction> {
        self.reconcile_at(Moment::now())
    }

    /// Bring the local player in line with the local copy of the room.
    /// Idempotent: a second pass over an unchanged room finds nothing to do.
    pub fn reconcile_at(&mut self, at: Moment) -> Vec<SyncAction> {
        let is_master = self.state.is_master(at.instant);
        let video = self.state.room().video_state.clone();
        let mut applied = Vec::new();

        let source_actions = match calculate_source_actions(&self.local_playback(), &video) {
            Ok(actions) => actions,
            Err(e) => {
                self.report_load_failure(&video.url, e);
                return applied;
            }
        };
        for action in source_actions {
            match &action {
                SyncAction::SwitchPlayer(kind) => self.player.switch_to(*kind),
                SyncAction::Load(url) => {
                    let source = classify(url);
                    if let Err(e) = self.player.load(url, &source) {
                        self.report_load_failure(url, e);
                        return applied;
                    }
                    self.events.emit(ClientEvent::Syncing(format!(
                        "Loading {}",
                        truncate_text(url, 60)
                    )));
                }
                _ => {}
            }
            applied.push(action);
        }

        if !self.player.is_ready() {
            if self.player.is_ready_overdue(at.instant) {
                let name = self.player.kind().map_or("Video", |k| k.display_name());
                self.report_load_failure(
                    &video.url,
                    PlayerError::VideoLoadFailed(format!("{} player did not become ready", name)),
                );
            } else {
                debug!("Player not ready, skipping playback reconciliation");
            }
            return applied;
        }

        let target = expected_position(
            &video,
            at.wall_ms,
            self.player.duration(),
            self.options.extrapolate_playing_position,
        );
        let playback_actions = calculate_playback_actions(
            &self.local_playback(),
            target,
            video.playing,
            is_master,
            self.options.tolerance_seconds,
        );
        for action in playback_actions {
            match &action {
                SyncAction::Seek(time) => {
                    self.player.seek(*time);
                    self.events
                        .emit(ClientEvent::Syncing(format!("Syncing to {}", format_time(*time))));
                }
                SyncAction::Play => self.player.play(),
                SyncAction::Pause => self.player.pause(),
                _ => {}
            }
            applied.push(action);
        }
        applied
    }

    /// React to a change notification from the store
    pub fn handle_store_event(&mut self, event: &StoreEvent) -> Vec<SyncAction> {
        self.handle_store_event_at(event, Moment::now())
    }

    pub fn handle_store_event_at(&mut self, event: &StoreEvent, at: Moment) -> Vec<SyncAction> {
        if event.code() != Some(self.state.code()) {
            return Vec::new();
        }
        let Some(raw) = event.new_value.as_deref() else {
            warn!("Room {} was removed from the store", self.state.code());
            return Vec::new();
        };
        if self.state.is_own_write(raw) {
            debug!("Ignoring notification of our own write");
            return Vec::new();
        }
        match serde_json::from_str::<Room>(raw) {
            Ok(room) => self.apply_snapshot_at(room, at),
            Err(e) => {
                self.report(&StoreError::from(e).into());
                Vec::new()
            }
        }
    }

    /// Adopt a snapshot read from the store, replay new messages and reconcile
    pub fn apply_snapshot_at(&mut self, room: Room, at: Moment) -> Vec<SyncAction> {
        if room.code != self.state.code() {
            return Vec::new();
        }
        let previous = self.state.replace_room(room);
        if previous.users != self.state.room().users {
            self.events
                .emit(ClientEvent::Users(self.state.room().users.clone()));
        }
        for message in self.log.replay(&self.state.room().messages) {
            self.events.emit(ClientEvent::Chat(message));
        }
        self.reconcile_at(at)
    }

    pub async fn poll(&mut self) -> Result<Vec<SyncAction>> {
        self.poll_at(Moment::now()).await
    }

    /// Periodic pass: re-read the store, then reconcile. A failed read is
    /// returned after reconciling against the local copy.
    pub async fn poll_at(&mut self, at: Moment) -> Result<Vec<SyncAction>> {
        self.state.set_last_poll(at.instant);
        self.player.tick();
        let code = self.state.code().to_string();
        match self.store.get(&code).await {
            Ok(Some(room)) => Ok(self.apply_snapshot_at(room, at)),
            Ok(None) => {
                warn!("Room {} is missing from the store", code);
                Ok(self.reconcile_at(at))
            }
            Err(e) => {
                warn!("Failed to read room {}: {}", code, e);
                self.reconcile_at(at);
                Err(e.into())
            }
        }
    }

    pub async fn apply_local_action(&mut self, action: LocalAction) -> Result<()> {
        self.apply_local_action_at(action, Moment::now()).await
    }

    /// Perform a playback action locally and publish the whole room.
    /// The master claim is taken only once the write has landed.
    pub async fn apply_local_action_at(&mut self, action: LocalAction, at: Moment) -> Result<()> {
        let username = self.state.user().username.clone();
        let mut video = self.state.room().video_state.clone();
        match &action {
            LocalAction::Load(url) => {
                let url = url.trim();
                if url.is_empty() {
                    return Err(Error::InvalidInput("Please enter a video URL".to_string()));
                }
                let source = classify(url);
                let Some(kind) = source.kind() else {
                    return Err(PlayerError::VideoLoadFailed(format!(
                        "Unrecognized video source: {}",
                        url
                    ))
                    .into());
                };
                if kind == PlayerKind::Native && !is_known_video_url(url) {
                    self.events.notify(
                        NotificationLevel::Warning,
                        "This URL does not look like a video file, trying anyway",
                    );
                }
                self.player.load(url, &source)?;
                self.state.clear_failed_url();
                video.url = url.to_string();
                video.player_type = Some(kind);
                video.current_time = 0.0;
                video.playing = false;
            }
            LocalAction::Play => {
                self.require_ready()?;
                self.player.play();
                video.current_time = self.player.current_time();
                video.playing = true;
            }
            LocalAction::Pause => {
                self.require_ready()?;
                self.player.pause();
                video.current_time = self.player.current_time();
                video.playing = false;
            }
            LocalAction::Seek(time) => {
                self.require_ready()?;
                let mut time = time.max(0.0);
                let duration = self.player.duration();
                if duration > 0.0 {
                    time = time.min(duration);
                }
                self.player.seek(time);
                video.current_time = time;
            }
            LocalAction::End => {
                video.current_time = 0.0;
                video.playing = false;
            }
        }
        video.touch(at.wall_ms);

        let mut room = self.state.room().clone();
        room.video_state = video;
        self.publish(room).await?;
        self.state.master().claim(at.instant);
        info!("Published local {:?}", action);

        match action {
            LocalAction::Load(_) => self
                .events
                .system(format!("{} loaded a new video", username)),
            LocalAction::End => self.events.system("Video ended"),
            _ => self.events.emit(ClientEvent::Syncing("Syncing...".into())),
        }
        Ok(())
    }

    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let content = text.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("Message is empty".to_string()));
        }
        if content.chars().count() > self.options.max_message_length {
            return Err(Error::InvalidInput(format!(
                "Message too long (max {} characters)",
                self.options.max_message_length
            )));
        }
        let message = Message::text(self.state.user().username.clone(), content);
        self.append_local(message).await
    }

    /// Voice payload arrives already encoded (e.g. a data URL)
    pub async fn send_voice(&mut self, payload: String) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::InvalidInput("Voice message is empty".to_string()));
        }
        let message = Message::voice(self.state.user().username.clone(), payload);
        self.append_local(message).await
    }

    /// Append to the local copy, trim to the bound and publish the whole room
    pub async fn append_local(&mut self, message: Message) -> Result<()> {
        let mut room = self.state.room().clone();
        append_bounded(&mut room.messages, message.clone(), self.log.limit());
        self.publish(room).await?;
        self.log.mark_rendered(&message);
        self.events.emit(ClientEvent::Chat(message));
        Ok(())
    }

    /// Local only, never published
    pub fn set_volume(&mut self, level: f64) {
        self.player.set_volume(level);
    }

    /// Tell a headless backend how long the loaded source is, enabling end detection
    pub fn set_duration(&mut self, seconds: f64) -> Result<()> {
        self.require_ready()?;
        if seconds.is_nan() || seconds <= 0.0 {
            return Err(Error::InvalidInput("Duration must be positive".to_string()));
        }
        self.player.set_duration(seconds);
        Ok(())
    }

    pub async fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ready { kind, generation } => {
                self.player.on_ready(kind, generation);
                self.reconcile();
            }
            PlayerEvent::Loaded { url } => {
                debug!("Player loaded {}", url);
                self.events
                    .notify(NotificationLevel::Success, "Video loaded successfully!");
            }
            PlayerEvent::LoadFailed { url, reason } => {
                self.report_load_failure(&url, PlayerError::VideoLoadFailed(reason));
            }
            PlayerEvent::Ended => {
                if let Err(e) = self.apply_local_action(LocalAction::End).await {
                    self.report(&e);
                }
            }
        }
    }

    /// One-line playback summary for the UI
    pub fn status_line(&mut self) -> String {
        let state = self.player.state();
        if !state.ready {
            return "Player not ready".to_string();
        }
        let duration = state
            .duration
            .map(format_time)
            .unwrap_or_else(|| "--:--".to_string());
        let leading = if self.state.is_master(Instant::now()) {
            ", leading"
        } else {
            ""
        };
        format!(
            "{} {} / {} (volume {:.0}%{})",
            if state.is_playing() { "Playing" } else { "Paused" },
            format_time(state.position_or_zero()),
            duration,
            state.volume.unwrap_or(1.0) * 100.0,
            leading
        )
    }

    /// Remove ourselves from the shared member list and stop the player
    pub async fn leave(&mut self) -> Result<()> {
        self.player.shutdown();
        let code = self.state.code().to_string();
        let user_id = self.state.user().id.clone();
        if let Some(room) = remove_member(self.store.as_ref(), &code, &user_id).await? {
            if let Ok(raw) = serde_json::to_string(&room) {
                self.state.record_write(raw);
            }
            self.state.replace_room(room);
        }
        info!("Left room {}", code);
        Ok(())
    }

    /// Surface a recoverable error to the UI
    pub fn report(&self, err: &Error) {
        warn!("{}", err);
        self.events.notify(NotificationLevel::Error, err.to_string());
    }

    fn report_load_failure(&mut self, url: &str, err: PlayerError) {
        if self.state.note_failed_url(url) {
            self.report(&err.into());
        } else {
            debug!("Load of {} still failing", url);
        }
    }

    fn require_ready(&self) -> std::result::Result<(), PlayerError> {
        if self.player.is_ready() {
            Ok(())
        } else {
            Err(PlayerError::AdapterNotReady)
        }
    }

    fn local_playback(&self) -> LocalPlayback {
        LocalPlayback {
            kind: self.player.kind(),
            url: self.player.loaded_url().map(|s| s.to_string()),
            position: self.player.current_time(),
            playing: self.player.is_playing(),
            ready: self.player.is_ready(),
        }
    }

    async fn publish(&mut self, room: Room) -> Result<()> {
        let raw = serde_json::to_string(&room).map_err(StoreError::from)?;
        if let Err(e) = self.store.put(&room.code, &room).await {
            warn!("Failed to publish room {}: {}", room.code, e);
            return Err(e.into());
        }
        self.state.record_write(raw);
        self.state.replace_room(room);
        Ok(())
    }
}
