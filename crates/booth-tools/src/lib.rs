//! Capability handlers invoked by the session controller.
//!
//! Capabilities are the booth-side actions the cloud agent can request.
//! Each one implements the [`Capability`] trait and produces exactly one
//! [`CapabilityOutput`] per invocation, success or failure.

use std::sync::Arc;

use async_trait::async_trait;

use booth_core::config::Config;
use booth_core::types::{CapabilityOutput, IdentityBinding};

pub mod display;
pub mod identify;
pub mod identity;
pub mod qr_generate;
pub mod snapshot;
pub mod store;
pub mod tv;
pub mod upload;

pub use display::DisplayCapability;
pub use identify::IdentifyCapability;
pub use identity::{HttpResolver, IdentityResolver, StaticResolver};
pub use qr_generate::QrCodeCapability;
pub use snapshot::SnapshotCapability;
pub use store::{object_key, ObjectStore, S3HttpStore};
pub use tv::{SpoolTv, TvSurface};
pub use upload::UploadCapability;

/// Context provided to capabilities during execution.
pub struct CapabilityContext {
    /// The resolved user, once bound.
    pub user: IdentityBinding,
    pub config: Arc<Config>,
}

/// One booth-side action callable from the live session.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name as declared to the session (e.g., "captureSnapshot").
    fn name(&self) -> &str;

    /// Human-readable description for the agent.
    fn description(&self) -> &str;

    /// JSON Schema describing the capability's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with the given arguments.
    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput>;
}

/// Registry of available capabilities.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Box<dyn Capability>) {
        self.capabilities.push(capability);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    /// (name, description, schema) triples for the session declaration list.
    pub fn declarations(&self) -> Vec<(String, String, serde_json::Value)> {
        self.capabilities
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    c.description().to_string(),
                    c.parameters_schema(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}, "required": []})
        }

        async fn invoke(
            &self,
            args: serde_json::Value,
            _context: &CapabilityContext,
        ) -> anyhow::Result<CapabilityOutput> {
            Ok(CapabilityOutput::ok([(
                "echo",
                args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            )]))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(EchoCapability));

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.list(), vec!["echo"]);

        let declarations = registry.declarations();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].0, "echo");
        assert_eq!(declarations[0].2["type"], "object");
    }
}
