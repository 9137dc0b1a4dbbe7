use std::time::Duration;

use mediasweep_core::{ChatClient, RoomEvent, SweepError};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);

// ── Client ──

/// Matrix homeserver client speaking the client-server API (v3).
pub struct MatrixClient {
    base: Url,
    access_token: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct WhoAmI {
    user_id: String,
}

#[derive(Deserialize)]
struct JoinedRooms {
    joined_rooms: Vec<String>,
}

#[derive(Deserialize)]
struct MessagesPage {
    #[serde(default)]
    chunk: Vec<RoomEvent>,
}

#[derive(Deserialize, Default)]
struct MatrixErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

impl MatrixClient {
    pub fn new(homeserver_url: &str, access_token: &str) -> anyhow::Result<Self> {
        let base = Url::parse(homeserver_url)
            .map_err(|e| anyhow::anyhow!("invalid homeserver url {homeserver_url:?}: {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("homeserver url {homeserver_url:?} cannot be used as a base");
        }
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Ok(Self {
            base,
            access_token: access_token.to_string(),
            agent,
        })
    }

    /// Host part of the homeserver url, used as the server label.
    pub fn server_name(&self) -> String {
        self.base.host_str().unwrap_or("unknown").to_string()
    }

    /// `/_matrix/client/v3/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("homeserver url cannot be a base"))?
            .pop_if_empty()
            .extend(["_matrix", "client", "v3"])
            .extend(segments);
        Ok(url)
    }

    fn call(
        &self,
        action: &'static str,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> anyhow::Result<Value> {
        let auth = format!("Bearer {}", self.access_token);
        let result = match method {
            Method::Get => self.agent.get(url.as_str()).header("Authorization", &auth).call(),
            Method::Post | Method::Put => {
                let payload = body.unwrap_or_else(|| json!({})).to_string();
                let request = match method {
                    Method::Post => self.agent.post(url.as_str()),
                    _ => self.agent.put(url.as_str()),
                };
                request
                    .header("Authorization", &auth)
                    .header("Content-Type", "application/json")
                    .send(payload)
            }
        };
        let mut response = result.map_err(|e| SweepError::Remote {
            action,
            detail: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| SweepError::Remote {
                action,
                detail: e.to_string(),
            })?;
        if !(200..300).contains(&status) {
            let err: MatrixErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(SweepError::Remote {
                action,
                detail: format!("HTTP {status} {} {}", err.errcode, err.error)
                    .trim_end()
                    .to_string(),
            }
            .into());
        }
        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub fn whoami(&self) -> anyhow::Result<String> {
        let url = self.endpoint(&["account", "whoami"])?;
        let me: WhoAmI = serde_json::from_value(self.call("whoami", Method::Get, url, None)?)?;
        Ok(me.user_id)
    }

    /// Rooms with a pending invite, from a non-blocking sync.
    pub fn list_invites(&self) -> anyhow::Result<Vec<String>> {
        let mut url = self.endpoint(&["sync"])?;
        url.query_pairs_mut().append_pair("timeout", "0");
        let sync = self.call("sync", Method::Get, url, None)?;
        Ok(invited_rooms(&sync))
    }

    pub fn join_room(&self, room_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["rooms", room_id, "join"])?;
        self.call("join", Method::Post, url, Some(json!({})))?;
        Ok(())
    }

    /// Join pending invites, restricted to `allowlist` when non-empty.
    /// Failed joins are logged and skipped. Returns the rooms joined.
    pub fn join_invites(&self, allowlist: &[String]) -> anyhow::Result<Vec<String>> {
        let mut joined = Vec::new();
        for room_id in self.list_invites()? {
            if !allowlist.is_empty() && !allowlist.contains(&room_id) {
                tracing::debug!(room_id = %room_id, "invite outside allowlist ignored");
                continue;
            }
            match self.join_room(&room_id) {
                Ok(()) => {
                    tracing::info!(room_id = %room_id, "joined invited room");
                    joined.push(room_id);
                }
                Err(e) => tracing::warn!(room_id = %room_id, error = %e, "join failed"),
            }
        }
        Ok(joined)
    }
}

#[derive(Clone, Copy)]
enum Method {
    Get,
    Post,
    Put,
}

fn invited_rooms(sync: &Value) -> Vec<String> {
    sync.get("rooms")
        .and_then(|r| r.get("invite"))
        .and_then(Value::as_object)
        .map(|invites| invites.keys().cloned().collect())
        .unwrap_or_default()
}

fn txn_id() -> String {
    format!("mediasweep-{}", ulid::Ulid::new())
}

impl ChatClient for MatrixClient {
    fn list_joined_rooms(&self) -> anyhow::Result<Vec<String>> {
        let url = self.endpoint(&["joined_rooms"])?;
        let rooms: JoinedRooms =
            serde_json::from_value(self.call("joined_rooms", Method::Get, url, None)?)?;
        Ok(rooms.joined_rooms)
    }

    fn fetch_recent_messages(&self, room_id: &str, limit: u32) -> anyhow::Result<Vec<RoomEvent>> {
        let mut url = self.endpoint(&["rooms", room_id, "messages"])?;
        url.query_pairs_mut()
            .append_pair("dir", "b")
            .append_pair("limit", &limit.to_string());
        let page: MessagesPage =
            serde_json::from_value(self.call("messages", Method::Get, url, None)?)?;
        Ok(page
            .chunk
            .into_iter()
            .map(|mut ev| {
                if ev.room_id.is_empty() {
                    ev.room_id = room_id.to_string();
                }
                ev
            })
            .collect())
    }

    fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> anyhow::Result<()> {
        let txn = txn_id();
        let url = self.endpoint(&["rooms", room_id, "redact", event_id, &txn])?;
        self.call("redact", Method::Put, url, Some(json!({ "reason": reason })))?;
        Ok(())
    }

    fn send_text(&self, room_id: &str, body: &str) -> anyhow::Result<()> {
        let txn = txn_id();
        let url = self.endpoint(&["rooms", room_id, "send", "m.room.message", &txn])?;
        self.call(
            "send",
            Method::Put,
            url,
            Some(json!({ "msgtype": "m.text", "body": body })),
        )?;
        Ok(())
    }
}

// ── Tests ──
