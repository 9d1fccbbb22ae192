use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::room::Message;

/// Append to a replicated log and keep only the newest `limit` entries
pub fn append_bounded(messages: &mut Vec<Message>, message: Message, limit: usize) {
    messages.push(message);
    if messages.len() > limit {
        let excess = messages.len() - limit;
        messages.drain(..excess);
    }
}

/// What this client has already rendered from the replicated log.
///
/// Replay is keyed by message id, so a client never renders the same message
/// twice and never skips a message just because it shares the local username.
/// Ids are forgotten once the set passes twice the log bound; the newest
/// timestamp among forgotten ids is kept as a watermark, and anything at or
/// below it counts as rendered.
#[derive(Debug)]
pub struct MessageLog {
    limit: usize,
    rendered_order: VecDeque<(String, i64)>,
    rendered: HashSet<String>,
    forgotten_until: Option<i64>,
}

impl MessageLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            rendered_order: VecDeque::new(),
            rendered: HashSet::new(),
            forgotten_until: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered_order.len()
    }

    pub fn is_rendered(&self, message: &Message) -> bool {
        self.rendered.contains(&message.id)
            || self
                .forgotten_until
                .is_some_and(|watermark| message.timestamp <= watermark)
    }

    pub fn mark_rendered(&mut self, message: &Message) {
        if !self.rendered.insert(message.id.clone()) {
            return;
        }
        self.rendered_order
            .push_back((message.id.clone(), message.timestamp));
        while self.rendered_order.len() > self.limit * 2 {
            if let Some((old, timestamp)) = self.rendered_order.pop_front() {
                self.rendered.remove(&old);
                let watermark = self.forgotten_until.map_or(timestamp, |w| w.max(timestamp));
                self.forgotten_until = Some(watermark);
            }
        }
    }

    /// Messages in `snapshot` not yet rendered, in log order; marks them rendered
    pub fn replay(&mut self, snapshot: &[Message]) -> Vec<Message> {
        let fresh: Vec<Message> = snapshot
            .iter()
            .filter(|m| !self.is_rendered(m))
            .cloned()
            .collect();
        for message in &fresh {
            self.mark_rendered(message);
        }
        if !fresh.is_empty() {
            debug!("Replaying {} new message(s)", fresh.len());
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, username: &str) -> Message {
        let mut m = Message::text(username, format!("message {}", id));
        m.id = id.to_string();
        m
    }

    fn message_at(id: &str, timestamp: i64) -> Message {
        let mut m = message(id, "a");
        m.timestamp = timestamp;
        m
    }

    #[test]
    fn test_append_bounded_drops_oldest() {
        let mut log: Vec<Message> = (1..=100).map(|i| message(&i.to_string(), "a")).collect();
        let previous = log.clone();
        append_bounded(&mut log, message("101", "b"), 100);

        assert_eq!(log.len(), 100);
        assert_eq!(&log[..99], &previous[1..]);
        assert_eq!(log[99].id, "101");
    }

    #[test]
    fn test_append_under_limit_keeps_everything() {
        let mut log = vec![message("1", "a")];
        append_bounded(&mut log, message("2", "a"), 100);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_replay_suffix_only() {
        let snapshot: Vec<Message> = vec![
            message("m1", "bob"),
            message("m2", "alice"),
            message("m3", "bob"),
            message("m4", "bob"),
            message("m5", "carol"),
        ];
        let mut log = MessageLog::new(100);
        for m in &snapshot[..3] {
            log.mark_rendered(m);
        }
        assert_eq!(log.rendered_count(), 3);

        let replayed = log.replay(&snapshot);
        let ids: Vec<&str> = replayed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m5"]);
        assert!(log.replay(&snapshot).is_empty());
    }

    #[test]
    fn test_replay_skips_own_sent_message_but_not_same_username() {
        let mut log = MessageLog::new(100);
        let sent = message("own-1", "alice");
        log.mark_rendered(&sent);

        // Same username, different id: e.g. sent from another session before rejoining
        let other = message("own-2", "alice");
        let replayed = log.replay(&[sent, other.clone()]);
        assert_eq!(replayed, vec![other]);
    }

    #[test]
    fn test_replay_after_log_saturation() {
        let mut log = MessageLog::new(3);
        let first: Vec<Message> = (1..=3).map(|i| message(&i.to_string(), "a")).collect();
        assert_eq!(log.replay(&first).len(), 3);

        // Length stays at the bound but the content moved on
        let next: Vec<Message> = (2..=4).map(|i| message(&i.to_string(), "a")).collect();
        let replayed = log.replay(&next);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].id, "4");
    }

    #[test]
    fn test_rendered_ids_are_bounded() {
        let mut log = MessageLog::new(2);
        for i in 0..10 {
            log.mark_rendered(&message_at(&i.to_string(), 1_000 + i));
        }
        assert_eq!(log.rendered_count(), 4);
        assert!(log.is_rendered(&message_at("9", 1_009)));
        assert!(!log.is_rendered(&message_at("late", 1_010)));
    }

    #[test]
    fn test_stale_snapshot_not_rendered_again() {
        let mut log = MessageLog::new(2);
        let old: Vec<Message> = (0..2).map(|i| message_at(&format!("old{}", i), 100 + i)).collect();
        assert_eq!(log.replay(&old).len(), 2);
        for i in 0..4 {
            log.replay(&[message_at(&format!("new{}", i), 200 + i)]);
        }

        // A writer that lagged far behind republishes the old log
        assert!(log.replay(&old).is_empty());
        let fresh = message_at("fresh", 300);
        assert_eq!(log.replay(&[old[0].clone(), fresh.clone()]), vec![fresh]);
    }
}
