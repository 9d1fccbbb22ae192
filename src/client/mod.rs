pub mod chat;
pub mod controller;
pub mod events;
pub mod messages;
pub mod room;
pub mod session;
pub mod state;
pub mod sync;

pub use controller::{run_sync_loop, spawn_sync_loop, LocalCommand};
pub use events::{ClientEvent, EventSink, NotificationLevel};
pub use room::{Message, MessageKind, Room, User, VideoState};
pub use session::SessionManager;
pub use sync::{EngineOptions, LocalAction, SyncAction, SyncEngine};
