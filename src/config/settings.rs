use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncWatchConfig {
    pub room: RoomSettings,
    pub sync: SyncSettings,
    pub store: StoreSettings,
    pub player: PlayerSettings,
    pub user: UserPreferences,
}

/// Membership and chat limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub max_participants: usize,
    pub message_limit: usize,
    pub code_length: usize,
    pub max_username_length: usize,
    pub max_message_length: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_participants: 4,
            message_limit: 100,
            code_length: 6,
            max_username_length: 20,
            max_message_length: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Periodic reconciliation pass
    pub interval_ms: u64,
    pub tolerance_seconds: f64,
    /// How long a local action suppresses corrections
    pub master_hold_ms: u64,
    pub extrapolate_playing_position: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            tolerance_seconds: 2.0,
            master_hold_ms: 1000,
            extrapolate_playing_position: true,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub directory: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./syncwatch-data"),
            poll_interval_ms: 250,
        }
    }
}

impl StoreSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub embed_init_delay_ms: u64,
    /// A backend still not ready this long after creation is reported as failed
    pub ready_timeout_ms: u64,
    pub default_volume: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            embed_init_delay_ms: 500,
            ready_timeout_ms: 10_000,
            default_volume: 1.0,
        }
    }
}

impl PlayerSettings {
    pub fn embed_init_delay(&self) -> Duration {
        Duration::from_millis(self.embed_init_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub username: Option<String>,
    pub share_base_url: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            username: None,
            share_base_url: "http://localhost:8000/".to_string(),
        }
    }
}
