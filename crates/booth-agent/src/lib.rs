//! Session controller — QR-gated bootstrap and tool-call dispatch.
//!
//! The controller walks the booth through
//! `Scanning -> Identified -> Streaming -> Active -> Terminated`, wiring
//! the media pipelines to the live session and dispatching inbound tool
//! calls to the capability registry. Progress is surfaced as a stream of
//! [`BoothEvent`]s for the operator console.

use serde::{Deserialize, Serialize};

use booth_core::types::SessionPhase;

pub mod bootstrap;
pub mod dispatch;

pub use bootstrap::{BoothController, BoothDeps};
pub use dispatch::Dispatcher;

/// Events emitted by the controller during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoothEvent {
    /// The bootstrap reached a new phase.
    #[serde(rename = "phase")]
    Phase { phase: SessionPhase },

    /// A ticket QR payload was decoded.
    #[serde(rename = "qr_decoded")]
    QrDecoded { payload: String },

    /// Identity was bound.
    #[serde(rename = "user_identified")]
    UserIdentified { name: String, code: String },

    /// Text from the agent.
    #[serde(rename = "agent_text")]
    AgentText { text: String },

    /// A tool call is being dispatched.
    #[serde(rename = "tool_call")]
    ToolCall { tool: String },

    /// A tool call completed and its response was produced.
    #[serde(rename = "tool_result")]
    ToolResult { tool: String, is_error: bool },

    /// A non-fatal error.
    #[serde(rename = "error")]
    Error { message: String },
}
