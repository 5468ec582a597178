//! `captureSnapshot` — grab the next webcam frame.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use booth_core::types::CapabilityOutput;
use booth_media::FrameSource;

use crate::{Capability, CapabilityContext};

/// Takes the next frame the steady-state source captures after the call
/// arrives. Waiting is bounded so a dead camera cannot hold a response
/// hostage.
pub struct SnapshotCapability {
    source: FrameSource,
    timeout: Duration,
}

impl SnapshotCapability {
    pub fn new(source: FrameSource, timeout: Duration) -> Self {
        Self { source, timeout }
    }
}

#[async_trait]
impl Capability for SnapshotCapability {
    fn name(&self) -> &str {
        "captureSnapshot"
    }

    fn description(&self) -> &str {
        "Take a webcam snapshot and return the encoded image"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn invoke(
        &self,
        _args: serde_json::Value,
        _context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput> {
        let frame = self.source.next_frame(self.timeout).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&frame.jpeg);
        Ok(CapabilityOutput::ok([("image_bytes", encoded)]))
    }
}
