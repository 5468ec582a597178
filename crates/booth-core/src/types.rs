use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A visitor identified from a ticket QR code.
///
/// Immutable once resolved; `code` doubles as the storage namespace and
/// the greeting key for the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub code: String,
}

/// One encoded still image from the webcam.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG-encoded image bytes.
    pub jpeg: Vec<u8>,
    /// Monotonic capture sequence number within one source.
    pub seq: u64,
    pub captured_at: DateTime<Utc>,
}

/// One fixed-duration window of encoded audio (20ms class).
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// An inbound tool-call request from the live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Correlation id when the transport provides one.
    pub id: Option<String>,
    pub name: String,
    pub args: serde_json::Value,
}

/// Response payload for one tool call: a free-form string-valued mapping.
///
/// Exactly one of these is sent back per inbound call, success or failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityOutput {
    pub fields: BTreeMap<String, String>,
    pub is_error: bool,
}

impl CapabilityOutput {
    pub fn ok(fields: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::from([("error".to_string(), message.into())]),
            is_error: true,
        }
    }

    /// Serialize the fields as the JSON object sent on the wire.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Bootstrap state machine phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Scanning,
    Identified,
    Streaming,
    Active,
    Terminated,
}

/// When identity is bound: before the session opens, or via a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    #[default]
    ScanFirst,
    OnDemand,
}

/// Write-once holder for the resolved [`User`], shared across handlers.
///
/// No tool dispatch may rely on a user before this binds.
#[derive(Debug, Clone, Default)]
pub struct IdentityBinding {
    slot: Arc<OnceLock<User>>,
}

impl IdentityBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the user. Returns false if an identity was already bound.
    pub fn bind(&self, user: User) -> bool {
        self.slot.set(user).is_ok()
    }

    pub fn user(&self) -> Option<User> {
        self.slot.get().cloned()
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }
}
