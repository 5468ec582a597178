//! Object storage seam for photo uploads.

use async_trait::async_trait;
use tracing::info;

/// Write-only object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
}

/// Build a fresh object key under the user's namespace.
///
/// Every call yields a new suffix; two uploads never share a key.
pub fn object_key(prefix: &str, user_code: &str) -> String {
    format!("{prefix}{user_code}/{}.jpg", uuid::Uuid::new_v4())
}

/// Stores objects with plain HTTP PUTs against the bucket's public URL.
///
/// The kiosk bucket accepts unauthenticated public-read writes; request
/// signing, when a deployment needs it, sits in front of this endpoint.
pub struct S3HttpStore {
    client: reqwest::Client,
    url_base: String,
}

impl S3HttpStore {
    pub fn new(url_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url_base,
        }
    }
}

#[async_trait]
impl ObjectStore for S3HttpStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let url = format!("{}/{}", self.url_base, key);
        let size = bytes.len();

        let resp = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .header("x-amz-acl", "public-read")
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Object store error {status}: {body}");
        }

        info!(key, size, "Object stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_shape() {
        let key = object_key("", "WR1234");
        let re = regex::Regex::new(
            r"^WR1234/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.jpg$",
        )
        .unwrap();
        assert!(re.is_match(&key), "unexpected key shape: {key}");
    }

    #[test]
    fn test_object_key_prefix_and_uniqueness() {
        let a = object_key("photos/", "WR1234");
        let b = object_key("photos/", "WR1234");
        assert!(a.starts_with("photos/WR1234/"));
        assert_ne!(a, b);
    }
}
