//! `uploadToS3` — store a photo under the user's namespace.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use booth_core::types::CapabilityOutput;

use crate::store::{object_key, ObjectStore};
use crate::{Capability, CapabilityContext};

pub struct UploadCapability {
    store: Arc<dyn ObjectStore>,
}

impl UploadCapability {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Capability for UploadCapability {
    fn name(&self) -> &str {
        "uploadToS3"
    }

    fn description(&self) -> &str {
        "Upload image bytes and return the public URL"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "bytes": {
                    "type": "string",
                    "description": "Base64-encoded image bytes"
                },
                "user_code": {
                    "type": "string",
                    "description": "Storage namespace; defaults to the identified user"
                }
            },
            "required": ["bytes"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput> {
        let encoded = args
            .get("bytes")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'bytes' parameter"))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("invalid base64 in 'bytes': {e}"))?;

        let user_code = args
            .get("user_code")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| context.user.user().map(|u| u.code))
            .ok_or_else(|| anyhow::anyhow!("no user code available"))?;

        let key = object_key(&context.config.storage_key_prefix(), &user_code);
        self.store.put(&key, data, "image/jpeg").await?;

        let url = format!("{}/{}", context.config.storage_url_base(), key);
        Ok(CapabilityOutput::ok([("url", url)]))
    }
}
