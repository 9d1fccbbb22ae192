//! Shared room persistence.
//!
//! A store is a last-write-wins key/value space holding one serialized `Room`
//! per room code. Writes are whole-record replacements with no atomicity or
//! ordering across writers. Change notifications are best-effort and are never
//! delivered back to the writer that caused them.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::client::room::Room;
use crate::error::StoreError;

pub use file::FileRoomStore;
pub use memory::{MemoryBackend, MemoryRoomStore};

pub const ROOM_KEY_PREFIX: &str = "syncwatch_room_";

pub fn room_key(code: &str) -> String {
    format!("{}{}", ROOM_KEY_PREFIX, code)
}

pub fn code_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(ROOM_KEY_PREFIX).filter(|c| !c.is_empty())
}

/// Identity of one store client, used to suppress self-notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(pub u64);

impl WriterId {
    /// Writes made by another process
    pub const EXTERNAL: WriterId = WriterId(0);
}

/// A key changed in the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub key: String,
    pub writer: WriterId,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StoreEvent {
    pub fn code(&self) -> Option<&str> {
        code_from_key(&self.key)
    }

    /// Decode the new snapshot, if the key still holds one
    pub fn snapshot(&self) -> Result<Option<Room>, StoreError> {
        match self.new_value.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

/// Change feed for one client; events caused by that client are filtered out
pub struct StoreSubscription {
    rx: broadcast::Receiver<StoreEvent>,
    own: WriterId,
}

impl StoreSubscription {
    pub fn new(rx: broadcast::Receiver<StoreEvent>, own: WriterId) -> Self {
        Self { rx, own }
    }

    /// Next foreign change; `None` once the store is gone
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.writer == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Store subscription lagged, {} notifications skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.writer == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    fn writer_id(&self) -> WriterId;

    /// Persist the full snapshot under `code`, replacing whatever is there
    async fn put(&self, code: &str, room: &Room) -> Result<(), StoreError>;

    async fn get(&self, code: &str) -> Result<Option<Room>, StoreError>;

    fn subscribe(&self) -> StoreSubscription;
}
