use serde::{Deserialize, Serialize};

use crate::player::backend::PlayerKind;
use crate::utils::{generate_id, now_millis};

/// Room member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub joined_at: i64,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            username: username.into(),
            joined_at: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    /// `content` carries an encoded audio payload (data URL)
    Voice,
    System,
}

/// Chat log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl Message {
    pub fn text(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_kind(username, content, MessageKind::Text)
    }

    pub fn voice(username: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::with_kind(username, payload, MessageKind::Voice)
    }

    fn with_kind(
        username: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: generate_id(),
            username: username.into(),
            content: content.into(),
            timestamp: now_millis(),
            kind,
        }
    }
}

/// Replicated playback record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub player_type: Option<PlayerKind>,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub last_update: i64,
}

impl VideoState {
    pub fn idle(now_ms: i64) -> Self {
        Self {
            url: String::new(),
            player_type: None,
            current_time: 0.0,
            playing: false,
            last_update: now_ms,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.url.is_empty()
    }

    /// Stamp a local mutation with this client's clock
    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = now_ms;
    }
}

/// Shared session state, keyed by `code`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: String,
    pub created_at: i64,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub video_state: VideoState,
}

impl Room {
    pub fn new(code: impl Into<String>, owner: User) -> Self {
        let now = now_millis();
        Self {
            code: code.into(),
            created_at: now,
            users: vec![owner],
            messages: Vec::new(),
            video_state: VideoState::idle(now),
        }
    }

    pub fn has_username(&self, username: &str) -> bool {
        self.users.iter().any(|u| u.username == username)
    }

    pub fn find_user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn remove_user(&mut self, id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        self.users.len() != before
    }
}
