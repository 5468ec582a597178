//! `displayOnTV` — show an image full-screen for the dwell time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use booth_core::types::CapabilityOutput;

use crate::tv::TvSurface;
use crate::{Capability, CapabilityContext};

pub struct DisplayCapability {
    tv: Arc<dyn TvSurface>,
    dwell: Duration,
}

impl DisplayCapability {
    pub fn new(tv: Arc<dyn TvSurface>, dwell: Duration) -> Self {
        Self { tv, dwell }
    }
}

#[async_trait]
impl Capability for DisplayCapability {
    fn name(&self) -> &str {
        "displayOnTV"
    }

    fn description(&self) -> &str {
        "Show an image full-screen on the TV"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "img_b64": {
                    "type": "string",
                    "description": "Base64-encoded image to display"
                }
            },
            "required": ["img_b64"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        _context: &CapabilityContext,
    ) -> anyhow::Result<CapabilityOutput> {
        let encoded = args
            .get("img_b64")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'img_b64' parameter"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("invalid base64 in 'img_b64': {e}"))?;

        // reject undisplayable payloads before claiming the surface
        image::load_from_memory(&bytes)
            .map_err(|e| anyhow::anyhow!("undecodable image: {e}"))?;

        self.tv.show(&bytes, self.dwell).await?;
        Ok(CapabilityOutput::ok([("status", "ok".to_string())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use booth_core::config::Config;
    use booth_core::types::IdentityBinding;

    struct CountingTv(AtomicUsize);

    #[async_trait]
    impl TvSurface for CountingTv {
        async fn show(&self, _image: &[u8], dwell: Duration) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(dwell).await;
            Ok(())
        }
    }

    fn context() -> CapabilityContext {
        CapabilityContext {
            user: IdentityBinding::new(),
            config: Arc::new(Config::default()),
        }
    }

    fn png_b64() -> String {
        let img = image::ImageBuffer::from_pixel(8, 8, image::Luma([200u8]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(&buf)
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_shows_and_holds() {
        let tv = Arc::new(CountingTv(AtomicUsize::new(0)));
        let capability = DisplayCapability::new(tv.clone(), Duration::from_secs(60));

        let start = tokio::time::Instant::now();
        let output = capability
            .invoke(json!({"img_b64": png_b64()}), &context())
            .await
            .unwrap();

        assert_eq!(output.fields.get("status").unwrap(), "ok");
        assert_eq!(tv.0.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_undecodable_image_never_reaches_the_tv() {
        let tv = Arc::new(CountingTv(AtomicUsize::new(0)));
        let capability = DisplayCapability::new(tv.clone(), Duration::from_secs(60));

        let garbage = base64::engine::general_purpose::STANDARD.encode(b"not an image");
        let result = capability
            .invoke(json!({"img_b64": garbage}), &context())
            .await;

        assert!(result.is_err());
        assert_eq!(tv.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_is_an_error() {
        let tv = Arc::new(CountingTv(AtomicUsize::new(0)));
        let capability = DisplayCapability::new(tv, Duration::from_secs(1));
        assert!(capability.invoke(json!({}), &context()).await.is_err());
    }
}
