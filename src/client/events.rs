use tokio::sync::mpsc;

use super::room::{Message, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What the engine tells the surrounding UI
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Notification {
        level: NotificationLevel,
        message: String,
    },
    /// Local-only line, never replicated
    System(String),
    /// Replicated chat or voice message to render
    Chat(Message),
    /// Membership changed
    Users(Vec<User>),
    /// A corrective or local playback action was applied
    Syncing(String),
}

/// Cheap cloneable handle for emitting `ClientEvent`s
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ClientEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ClientEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(ClientEvent::Notification {
            level,
            message: message.into(),
        });
    }

    pub fn system(&self, message: impl Into<String>) {
        self.emit(ClientEvent::System(message.into()));
    }
}
