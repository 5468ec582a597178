//! Live conversational-session transport.
//!
//! The controller talks to the cloud agent through the [`LiveTransport`]
//! trait; [`client::GeminiLive`] implements it over a bidirectional
//! WebSocket. Wire framing lives in [`protocol`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use booth_core::types::{AudioChunk, CapabilityOutput, Frame, FunctionCall};

pub mod client;
pub mod protocol;

pub use client::{GeminiConnector, GeminiLive, LiveOptions};

/// Declaration of one callable capability, sent at session setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Inbound events surfaced from the session.
///
/// `Closed` is terminal: it is sent exactly once, on remote close or
/// transport error, and nothing follows it.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    SetupComplete,
    /// One window of encoded agent audio for playback.
    Audio(Vec<u8>),
    Text {
        content: String,
        turn_complete: bool,
    },
    ToolCall(Vec<FunctionCall>),
    Closed(Option<String>),
}

/// The session transport seam.
///
/// Per-direction message order is preserved; nothing is promised across
/// directions. All methods are callable concurrently.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Send a free-text user turn.
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;

    /// Stream one microphone window.
    async fn send_audio(&self, chunk: AudioChunk) -> anyhow::Result<()>;

    /// Stream one webcam frame.
    async fn send_frame(&self, frame: &Frame) -> anyhow::Result<()>;

    /// Send the response for one tool call, correlated by name (and id
    /// when the transport provided one).
    async fn send_tool_response(
        &self,
        name: &str,
        id: Option<&str>,
        output: &CapabilityOutput,
    ) -> anyhow::Result<()>;

    /// Close the session. Idempotent.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Opens a session once the controller knows what to declare.
///
/// The greeting and the declared capability list are only available after
/// identity resolution and capability registration, so session opening
/// hides behind this seam.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(
        &self,
        system_instruction: String,
        declarations: Vec<ToolDeclaration>,
    ) -> anyhow::Result<(
        std::sync::Arc<dyn LiveTransport>,
        tokio::sync::mpsc::Receiver<LiveEvent>,
    )>;
}
