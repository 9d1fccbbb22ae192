use std::sync::Arc;
use tracing::{info, warn};

use super::room::{Room, User};
use crate::config::RoomSettings;
use crate::error::{Error, JoinError, Result};
use crate::player::source::classify;
use crate::store::RoomStore;
use crate::utils::{generate_room_code, normalize_room_code, now_millis};

const CODE_ATTEMPTS: usize = 5;

/// Room lifecycle: identity, creation and membership
pub struct SessionManager {
    store: Arc<dyn RoomStore>,
    settings: RoomSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn RoomStore>, settings: RoomSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Validate a display name and mint a user for it
    pub fn register_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidInput("Please enter a username".to_string()));
        }
        if username.chars().count() > self.settings.max_username_length {
            return Err(Error::InvalidInput(format!(
                "Username too long (max {} characters)",
                self.settings.max_username_length
            )));
        }
        Ok(User::new(username))
    }

    /// Create a room with `user` as its only member, optionally seeded with a video
    pub async fn create_room(&self, user: User, initial_url: Option<&str>) -> Result<Room> {
        let mut code = generate_room_code(self.settings.code_length);
        for _ in 1..CODE_ATTEMPTS {
            if self.store.get(&code).await?.is_none() {
                break;
            }
            warn!("Room code {} already in use, generating another", code);
            code = generate_room_code(self.settings.code_length);
        }

        let mut room = Room::new(code, user);
        if let Some(url) = initial_url.map(str::trim).filter(|u| !u.is_empty()) {
            match classify(url).kind() {
                Some(kind) => {
                    room.video_state.url = url.to_string();
                    room.video_state.player_type = Some(kind);
                    room.video_state.touch(now_millis());
                }
                None => warn!("Ignoring unrecognized initial video {}", url),
            }
        }

        self.store.put(&room.code, &room).await?;
        info!("Created room {}", room.code);
        Ok(room)
    }

    /// Add `user` to an existing room
    pub async fn join_room(&self, code: &str, user: User) -> std::result::Result<Room, JoinError> {
        let code = normalize_room_code(code);
        let Some(mut room) = self.store.get(&code).await? else {
            return Err(JoinError::RoomNotFound(code));
        };
        if room.users.len() >= self.settings.max_participants {
            return Err(JoinError::RoomFull {
                max: self.settings.max_participants,
            });
        }
        if room.has_username(&user.username) {
            return Err(JoinError::UsernameTaken(user.username));
        }

        info!("{} joining room {}", user.username, code);
        room.users.push(user);
        self.store.put(&code, &room).await?;
        Ok(room)
    }

    pub async fn leave_room(&self, code: &str, user_id: &str) -> Result<Option<Room>> {
        remove_member(self.store.as_ref(), &normalize_room_code(code), user_id).await
    }
}

/// Drop `user_id` from the latest snapshot of `code` and republish it.
/// Returns the updated room, or `None` when the room or member was already gone.
pub async fn remove_member(
    store: &dyn RoomStore,
    code: &str,
    user_id: &str,
) -> Result<Option<Room>> {
    let Some(mut room) = store.get(code).await? else {
        return Ok(None);
    };
    if !room.remove_user(user_id) {
        return Ok(None);
    }
    store.put(code, &room).await?;
    info!("Removed member {} from room {}", user_id, code);
    Ok(Some(room))
}
