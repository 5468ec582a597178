//! Identity resolution — maps a decoded QR payload to a [`User`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use booth_core::types::User;

/// External ticket lookup.
///
/// Resolution must be idempotent: the same payload maps to the same `code`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, qr_payload: &str) -> anyhow::Result<User>;
}

/// Ticket lookup over HTTP: POSTs the QR payload, expects name and code back.
pub struct HttpResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResolver {
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl IdentityResolver for HttpResolver {
    async fn resolve(&self, qr_payload: &str) -> anyhow::Result<User> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "qr_data": qr_payload }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ticket lookup error {status}: {body}");
        }

        let body: serde_json::Value = resp.json().await?;
        let name = body
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("ticket lookup response missing 'name'"))?;
        let code = body
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("ticket lookup response missing 'code'"))?;

        info!(name, code, "Ticket resolved");
        Ok(User {
            name: name.to_string(),
            code: code.to_string(),
        })
    }
}

/// Rehearsal-mode resolver used when no endpoint is configured: greets with
/// a fixed name and uses the QR payload itself as the code.
pub struct StaticResolver {
    name: String,
}

impl StaticResolver {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(&self, qr_payload: &str) -> anyhow::Result<User> {
        Ok(User {
            name: self.name.clone(),
            code: qr_payload.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver_is_idempotent() {
        let resolver = StaticResolver::new("Adrian".into());

        let first = resolver.resolve("WR1234").await.unwrap();
        let second = resolver.resolve("WR1234").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Adrian");
        assert_eq!(first.code, "WR1234");
    }

    #[tokio::test]
    async fn test_static_resolver_distinct_payloads_distinct_codes() {
        let resolver = StaticResolver::new("Adrian".into());
        let a = resolver.resolve("WR1234").await.unwrap();
        let b = resolver.resolve("WR9999").await.unwrap();
        assert_ne!(a.code, b.code);
    }
}
