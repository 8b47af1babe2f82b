//! Realtime wire messages.
//!
//! Outbound: the one-time `phx_join` and the periodic `heartbeat`.
//! Inbound: a loose envelope of which only `postgres_changes` events are
//! acted on; every other event (join replies, system notices) is ignored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use netsync_core::NetworkRow;

pub const POSTGRES_CHANGES: &str = "postgres_changes";

fn new_ref() -> String {
    Uuid::new_v4().to_string()
}

// ── Outbound ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinMessage {
    pub event: String,
    pub topic: String,
    pub payload: JoinPayload,
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinPayload {
    pub config: JoinConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinConfig {
    pub broadcast: BroadcastConfig,
    pub postgres_changes: Vec<ChangeFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastConfig {
    #[serde(rename = "self")]
    pub receive_own: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeFilter {
    pub event: String,
    pub schema: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter: String,
}

impl JoinMessage {
    /// Join `realtime:public:<table>` for every event on rows of `chain_id`.
    pub fn new(table: &str, chain_id: u64) -> Self {
        Self {
            event: "phx_join".to_string(),
            topic: format!("realtime:public:{table}"),
            payload: JoinPayload {
                config: JoinConfig {
                    broadcast: BroadcastConfig { receive_own: true },
                    postgres_changes: vec![ChangeFilter {
                        event: "*".to_string(),
                        schema: "public".to_string(),
                        table: table.to_string(),
                        filter: format!("chain_id=eq.{chain_id}"),
                    }],
                },
            },
            reference: new_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartbeatMessage {
    pub event: String,
    pub topic: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "ref")]
    pub reference: String,
}

impl HeartbeatMessage {
    pub fn new() -> Self {
        Self {
            event: "heartbeat".to_string(),
            topic: "phoenix".to_string(),
            payload: serde_json::Map::new(),
            reference: new_ref(),
        }
    }
}

impl Default for HeartbeatMessage {
    fn default() -> Self {
        Self::new()
    }
}

// ── Inbound ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: EnvelopePayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvelopePayload {
    #[serde(default)]
    pub data: Option<ChangeData>,
}

/// Body of a `postgres_changes` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeData {
    #[serde(default)]
    pub table: String,
    /// `INSERT`, `UPDATE` or `DELETE`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Absent for deletes.
    #[serde(default)]
    pub record: Option<NetworkRow>,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_change(&self) -> bool {
        self.event == POSTGRES_CHANGES
    }

    pub fn into_change(self) -> Option<ChangeData> {
        if self.is_change() { self.payload.data } else { None }
    }
}
