use std::time::{Duration, Instant};
use tracing::debug;

use super::room::{Room, User};

/// Advisory, time-limited claim that this client just drove playback.
/// While active, reconciliation leaves the local player alone.
#[derive(Debug, Clone)]
pub struct MasterClaim {
    hold: Duration,
    until: Option<Instant>,
}

impl MasterClaim {
    pub fn new(hold: Duration) -> Self {
        Self { hold, until: None }
    }

    pub fn claim(&mut self, now: Instant) {
        self.until = Some(now + self.hold);
    }

    /// Whether the claim still holds at `now`; an expired claim is dropped
    pub fn is_active(&mut self, now: Instant) -> bool {
        match self.until {
            Some(until) if now < until => true,
            Some(_) => {
                debug!("Master claim expired");
                self.until = None;
                false
            }
            None => false,
        }
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.until
    }
}

/// Everything one client knows about its session
#[derive(Debug)]
pub struct ClientState {
    user: User,
    room: Room,
    master: MasterClaim,
    last_poll: Option<Instant>,
    last_written: Option<String>,
    failed_url: Option<String>,
}

impl ClientState {
    pub fn new(user: User, room: Room, master_hold: Duration) -> Self {
        Self {
            user,
            room,
            master: MasterClaim::new(master_hold),
            last_poll: None,
            last_written: None,
            failed_url: None,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn code(&self) -> &str {
        &self.room.code
    }

    /// Replace the local copy, returning the previous one
    pub fn replace_room(&mut self, room: Room) -> Room {
        std::mem::replace(&mut self.room, room)
    }

    pub fn master(&mut self) -> &mut MasterClaim {
        &mut self.master
    }

    pub fn is_master(&mut self, now: Instant) -> bool {
        self.master.is_active(now)
    }

    pub fn last_poll(&self) -> Option<Instant> {
        self.last_poll
    }

    pub fn set_last_poll(&mut self, now: Instant) {
        self.last_poll = Some(now);
    }

    /// Remember the serialized form of a snapshot this client published
    pub fn record_write(&mut self, raw: String) {
        self.last_written = Some(raw);
    }

    pub fn is_own_write(&self, raw: &str) -> bool {
        self.last_written.as_deref() == Some(raw)
    }

    /// True the first time a URL fails; later failures of the same URL stay quiet
    pub fn note_failed_url(&mut self, url: &str) -> bool {
        if self.failed_url.as_deref() == Some(url) {
            return false;
        }
        self.failed_url = Some(url.to_string());
        true
    }

    pub fn clear_failed_url(&mut self) {
        self.failed_url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_claim_expires() {
        let start = Instant::now();
        let mut claim = MasterClaim::new(Duration::from_secs(1));
        assert!(!claim.is_active(start));

        claim.claim(start);
        assert!(claim.is_active(start + Duration::from_millis(999)));
        assert!(!claim.is_active(start + Duration::from_millis(1000)));
        assert!(claim.expires_at().is_none());
    }

    #[test]
    fn test_reclaim_extends_window() {
        let start = Instant::now();
        let mut claim = MasterClaim::new(Duration::from_secs(1));
        claim.claim(start);
        claim.claim(start + Duration::from_millis(800));
        assert!(claim.is_active(start + Duration::from_millis(1500)));
    }

    #[test]
    fn test_failed_url_reported_once() {
        let user = User::new("alice");
        let room = Room::new("ABC123", user.clone());
        let mut state = ClientState::new(user, room, Duration::from_secs(1));
        assert!(state.note_failed_url("bad"));
        assert!(!state.note_failed_url("bad"));
        assert!(state.note_failed_url("worse"));
        state.clear_failed_url();
        assert!(state.note_failed_url("worse"));
    }

    #[test]
    fn test_own_write_tracking() {
        let user = User::new("alice");
        let room = Room::new("ABC123", user.clone());
        let mut state = ClientState::new(user, room, Duration::from_secs(1));
        assert!(!state.is_own_write("{}"));
        state.record_write("{}".to_string());
        assert!(state.is_own_write("{}"));
    }
}
