use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{room_key, RoomStore, StoreEvent, StoreSubscription, WriterId};
use crate::client::room::Room;
use crate::error::StoreError;

const NOTIFY_CAPACITY: usize = 256;

/// In-process shared key/value space; each client talks to it through
/// its own `MemoryRoomStore` handle.
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
    notify: broadcast::Sender<StoreEvent>,
    next_writer: AtomicU64,
    read_only: AtomicBool,
    reads_failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            notify,
            next_writer: AtomicU64::new(1),
            read_only: AtomicBool::new(false),
            reads_failing: AtomicBool::new(false),
        })
    }

    /// New client handle with its own writer identity
    pub fn connect(self: &Arc<Self>) -> MemoryRoomStore {
        MemoryRoomStore {
            backend: self.clone(),
            writer: WriterId(self.next_writer.fetch_add(1, Ordering::SeqCst)),
        }
    }

    /// Make every subsequent write fail, to exercise persistence errors
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Make every subsequent read fail
    pub fn set_reads_failing(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    fn write(&self, key: String, value: String, writer: WriterId) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is read-only".to_string()));
        }
        let old_value = self.records.lock().insert(key.clone(), value.clone());
        if old_value.as_deref() == Some(value.as_str()) {
            return Ok(());
        }
        let event = StoreEvent {
            key,
            writer,
            old_value,
            new_value: Some(value),
        };
        if self.notify.send(event).is_err() {
            debug!("Store write with no subscribers");
        }
        Ok(())
    }
}

/// One client's view of a `MemoryBackend`
#[derive(Clone)]
pub struct MemoryRoomStore {
    backend: Arc<MemoryBackend>,
    writer: WriterId,
}

impl MemoryRoomStore {
    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    fn writer_id(&self) -> WriterId {
        self.writer
    }

    async fn put(&self, code: &str, room: &Room) -> Result<(), StoreError> {
        let value = serde_json::to_string(room)?;
        self.backend.write(room_key(code), value, self.writer)
    }

    async fn get(&self, code: &str) -> Result<Option<Room>, StoreError> {
        if self.backend.reads_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store cannot be read".to_string()));
        }
        match self.backend.raw(&room_key(code)) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn subscribe(&self) -> StoreSubscription {
        StoreSubscription::new(self.backend.notify.subscribe(), self.writer)
    }
}
