use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{room_key, RoomStore, StoreEvent, StoreSubscription, WriterId, ROOM_KEY_PREFIX};
use crate::client::room::Room;
use crate::error::StoreError;
use crate::utils::content_digest;

const NOTIFY_CAPACITY: usize = 256;
const RECORD_EXTENSION: &str = "json";

/// Store backed by one JSON file per room in a shared directory.
///
/// Several processes on one host can open the same directory. Writes go through
/// a temp file and an atomic rename; other writers' changes are discovered by
/// polling the directory.
pub struct FileRoomStore {
    inner: Arc<FileInner>,
    watcher: Option<JoinHandle<()>>,
}

struct FileInner {
    dir: PathBuf,
    writer: WriterId,
    notify: broadcast::Sender<StoreEvent>,
    /// Digest of the last value this process wrote, per key
    own_writes: Mutex<HashMap<String, String>>,
    /// Last value observed on disk, per key
    seen: Mutex<HashMap<String, String>>,
}

impl FileRoomStore {
    /// Open (creating if needed) `dir`. With a poll interval and a running
    /// tokio runtime, a background task watches for foreign writes.
    pub fn open(dir: impl Into<PathBuf>, poll_interval: Option<Duration>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        let writer = WriterId(rand::random::<u64>().max(1));
        let inner = Arc::new(FileInner {
            dir,
            writer,
            notify,
            own_writes: Mutex::new(HashMap::new()),
            seen: Mutex::new(HashMap::new()),
        });
        for (key, value) in read_records(&inner.dir)? {
            inner.seen.lock().insert(key, value);
        }
        info!("Opened room store at {}", inner.dir.display());

        let watcher = match (poll_interval, tokio::runtime::Handle::try_current()) {
            (Some(interval), Ok(handle)) => {
                Some(handle.spawn(watch(Arc::downgrade(&inner), interval)))
            }
            (Some(_), Err(_)) => {
                warn!("No runtime available, store changes will not be watched");
                None
            }
            (None, _) => None,
        };

        Ok(Self { inner, watcher })
    }

    pub fn directory(&self) -> &Path {
        &self.inner.dir
    }

    /// Look for foreign changes once; returns how many notifications were sent
    pub async fn scan(&self) -> Result<usize, StoreError> {
        self.inner.scan().await
    }
}

impl Drop for FileRoomStore {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
    }
}

async fn watch(inner: Weak<FileInner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.scan().await {
            warn!("Failed to scan room store: {}", e);
        }
    }
    debug!("Room store watcher stopped");
}

impl FileInner {
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    async fn scan(&self) -> Result<usize, StoreError> {
        let dir = self.dir.clone();
        let records = tokio::task::spawn_blocking(move || read_records(&dir))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        let mut events = Vec::new();
        {
            let mut seen = self.seen.lock();
            let own_writes = self.own_writes.lock();
            for (key, value) in &records {
                if seen.get(key) == Some(value) {
                    continue;
                }
                let old_value = seen.insert(key.clone(), value.clone());
                if own_writes.get(key) == Some(&content_digest(value)) {
                    continue;
                }
                events.push(StoreEvent {
                    key: key.clone(),
                    writer: WriterId::EXTERNAL,
                    old_value,
                    new_value: Some(value.clone()),
                });
            }
            let removed: Vec<String> = seen
                .keys()
                .filter(|key| !records.contains_key(*key))
                .cloned()
                .collect();
            for key in removed {
                let old_value = seen.remove(&key);
                events.push(StoreEvent {
                    key,
                    writer: WriterId::EXTERNAL,
                    old_value,
                    new_value: None,
                });
            }
        }

        let count = events.len();
        for event in events {
            debug!("Foreign change to {}", event.key);
            let _ = self.notify.send(event);
        }
        Ok(count)
    }
}

fn read_records(dir: &Path) -> Result<HashMap<String, String>, StoreError> {
    let mut records = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !key.starts_with(ROOM_KEY_PREFIX) {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(value) => {
                records.insert(key.to_string(), value);
            }
            // Replaced or removed between listing and reading
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

#[async_trait]
impl RoomStore for FileRoomStore {
    fn writer_id(&self) -> WriterId {
        self.inner.writer
    }

    async fn put(&self, code: &str, room: &Room) -> Result<(), StoreError> {
        let key = room_key(code);
        let value = serde_json::to_string(room)?;
        let path = self.inner.path_for(&key);
        let dir = self.inner.dir.clone();
        let contents = value.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        self.inner
            .own_writes
            .lock()
            .insert(key.clone(), content_digest(&value));
        self.inner.seen.lock().insert(key, value);
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let path = self.inner.path_for(&room_key(code));
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> StoreSubscription {
        StoreSubscription::new(self.inner.notify.subscribe(), self.inner.writer)
    }
}
