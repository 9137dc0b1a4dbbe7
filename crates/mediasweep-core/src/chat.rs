use crate::error::SweepError;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Event types that can carry an uploaded file.
pub const MEDIA_EVENT_TYPES: &[&str] = &["m.room.message", "m.sticker"];

/// A timeline event as returned by room history.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    pub event_id: String,
    /// Some servers omit this inside `/messages` chunks; the fetcher fills it in.
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub origin_server_ts: i64,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    pub fn may_carry_media(&self) -> bool {
        MEDIA_EVENT_TYPES.contains(&self.event_type.as_str())
    }
}

/// The chat deployment, seen from the eviction engine.
///
/// Every call is a fallible remote operation. Implementations own their
/// timeouts; the engine never retries beyond moving on to the next item.
pub trait ChatClient {
    fn list_joined_rooms(&self) -> anyhow::Result<Vec<String>>;

    /// Most recent `limit` events of a room, newest first.
    fn fetch_recent_messages(&self, room_id: &str, limit: u32) -> anyhow::Result<Vec<RoomEvent>>;

    /// Retract a message remotely. `Ok` means the server acknowledged it.
    fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> anyhow::Result<()>;

    fn send_text(&self, room_id: &str, body: &str) -> anyhow::Result<()>;
}

/// In-memory chat deployment for tests. Scripted history, recorded side effects.
#[derive(Default)]
pub struct MockChat {
    rooms: Vec<String>,
    history: HashMap<String, Vec<RoomEvent>>,
    failing_rooms: HashSet<String>,
    refused: HashSet<String>,
    fail_sends: bool,
    redactions: RefCell<Vec<(String, String, String)>>,
    sent: RefCell<Vec<(String, String)>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room whose history is `events`, newest first.
    pub fn with_room(mut self, room_id: &str, events: Vec<RoomEvent>) -> Self {
        self.rooms.push(room_id.to_string());
        self.history.insert(room_id.to_string(), events);
        self
    }

    /// Joined room whose history fetch always fails.
    pub fn with_failing_room(mut self, room_id: &str) -> Self {
        self.rooms.push(room_id.to_string());
        self.failing_rooms.insert(room_id.to_string());
        self
    }

    /// Make redaction of `event_id` fail.
    pub fn refuse_redaction(mut self, event_id: &str) -> Self {
        self.refused.insert(event_id.to_string());
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Acknowledged redactions as `(room_id, event_id, reason)`.
    pub fn redactions(&self) -> Vec<(String, String, String)> {
        self.redactions.borrow().clone()
    }

    /// Delivered messages as `(room_id, body)`.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }
}

impl ChatClient for MockChat {
    fn list_joined_rooms(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.rooms.clone())
    }

    fn fetch_recent_messages(&self, room_id: &str, limit: u32) -> anyhow::Result<Vec<RoomEvent>> {
        if self.failing_rooms.contains(room_id) {
            anyhow::bail!("history unavailable for {room_id}");
        }
        Ok(self
            .history
            .get(room_id)
            .map(|events| events.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> anyhow::Result<()> {
        if self.refused.contains(event_id) {
            return Err(SweepError::Remote {
                action: "redact",
                detail: format!("M_FORBIDDEN for {event_id}"),
            }
            .into());
        }
        self.redactions.borrow_mut().push((
            room_id.to_string(),
            event_id.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }

    fn send_text(&self, room_id: &str, body: &str) -> anyhow::Result<()> {
        if self.fail_sends {
            anyhow::bail!("send to {room_id} timed out");
        }
        self.sent
            .borrow_mut()
            .push((room_id.to_string(), body.to_string()));
        Ok(())
    }
}
