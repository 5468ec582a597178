//! `identifyUser` — resolve identity from a QR payload mid-session.
//!
//! Registered only when the booth runs in `on_demand` identity mode; in
//! `scan_first` mode identity is bound before the session opens and this
//! capability is never declared.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use booth_core::types::CapabilityOutput;

use crate::identity::IdentityResolver;
use crate::{Capability, CapabilityContext};

pub struct IdentifyCapability {
    resolver: Arc<dyn IdentityResolver>,
}

impl IdentifyCapability {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Capability for IdentifyCapability {
    fn name(&self) -> &str {
        "identifyUser"
    }

    fn description(&self) -> &str {
        "Identify the visitor from their ticket QR payload"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "qr_data": {
                    "type": "string",
                    "description": "Decoded ticket QR payload"
                }
            },
            "required": ["qr_data"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput> {
        let qr_data = args
            .get("qr_data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'qr_data' parameter"))?;

        // Identity is write-once; a repeat call answers with the bound user.
        if let Some(user) = context.user.user() {
            return Ok(CapabilityOutput::ok([
                ("user_name", user.name),
                ("user_code", user.code),
            ]));
        }

        let user = self.resolver.resolve(qr_data).await?;
        info!(name = %user.name, code = %user.code, "User identified mid-session");
        context.user.bind(user.clone());

        Ok(CapabilityOutput::ok([
            ("user_name", user.name),
            ("user_code", user.code),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use booth_core::config::Config;
    use booth_core::types::IdentityBinding;

    use crate::identity::StaticResolver;

    fn context() -> CapabilityContext {
        CapabilityContext {
            user: IdentityBinding::new(),
            config: Arc::new(Config::default()),
        }
    }

    #[tokio::test]
    async fn test_identify_binds_the_user() {
        let capability = IdentifyCapability::new(Arc::new(StaticResolver::new("Adrian".into())));
        let context = context();

        let output = capability
            .invoke(json!({"qr_data": "WR1234"}), &context)
            .await
            .unwrap();

        assert_eq!(output.fields.get("user_name").unwrap(), "Adrian");
        assert_eq!(output.fields.get("user_code").unwrap(), "WR1234");
        assert_eq!(context.user.user().unwrap().code, "WR1234");
    }

    #[tokio::test]
    async fn test_second_identify_keeps_the_first_binding() {
        let capability = IdentifyCapability::new(Arc::new(StaticResolver::new("Adrian".into())));
        let context = context();

        capability
            .invoke(json!({"qr_data": "WR1234"}), &context)
            .await
            .unwrap();
        let output = capability
            .invoke(json!({"qr_data": "ZZ9999"}), &context)
            .await
            .unwrap();

        // answered from the existing binding, not re-resolved
        assert_eq!(output.fields.get("user_code").unwrap(), "WR1234");
        assert_eq!(context.user.user().unwrap().code, "WR1234");
    }

    #[tokio::test]
    async fn test_missing_payload_is_an_error() {
        let capability = IdentifyCapability::new(Arc::new(StaticResolver::new("Adrian".into())));
        assert!(capability.invoke(json!({}), &context()).await.is_err());
    }
}
