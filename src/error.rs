//! Error types for the room synchronization client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shared store read or write failure
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file or directory could not be accessed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record could not be encoded or decoded
    #[error("Stored room record is invalid: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a client cannot enter an existing room
#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Room not found. Please check the room code ({0}).")]
    RoomNotFound(String),

    #[error("Room is full (max {max} users)")]
    RoomFull { max: usize },

    #[error("Username '{0}' is already taken in this room. Please choose a different name.")]
    UsernameTaken(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Playback backend failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// Malformed URL, unrecognized source, or backend load failure
    #[error("Failed to load video: {0}")]
    VideoLoadFailed(String),

    /// Action attempted before the backend finished initializing
    #[error("Player is not ready yet. Please load a video first.")]
    AdapterNotReady,
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rejected user input (username, chat text, URL)
    #[error("{0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// True for failures of the shared store rather than of local input or playback
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Store(_) | Error::Join(JoinError::Persistence(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_error_messages() {
        assert_eq!(
            JoinError::RoomFull { max: 4 }.to_string(),
            "Room is full (max 4 users)"
        );
        assert!(JoinError::UsernameTaken("alice".into())
            .to_string()
            .contains("alice"));
    }

    #[test]
    fn test_persistence_classification() {
        let err: Error = StoreError::Unavailable("disk full".into()).into();
        assert!(err.is_persistence());
        let err: Error = JoinError::Persistence(StoreError::Unavailable("x".into())).into();
        assert!(err.is_persistence());
        let err: Error = PlayerError::AdapterNotReady.into();
        assert!(!err.is_persistence());
    }
}
