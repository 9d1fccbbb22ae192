pub mod backend;
pub mod embed;
pub mod events;
pub mod native;
pub mod properties;
pub mod slot;
pub mod source;

pub use backend::{PlaybackAdapter, PlayerFactory, PlayerKind};
pub use events::{PlayerEvent, PlayerEventReceiver, PlayerEventSender};
pub use properties::PlayerState;
pub use slot::{ActivePlayer, HeadlessFactory};
pub use source::{classify, MediaSource};
