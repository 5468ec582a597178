//! External display surface seam.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

/// A full-screen display surface.
///
/// The physical surface is exclusive: implementations hold the image for
/// at least `dwell` and serialize concurrent `show` calls.
#[async_trait]
pub trait TvSurface: Send + Sync {
    async fn show(&self, image: &[u8], dwell: Duration) -> anyhow::Result<()>;
}

/// Spools the current still to a path the display process watches.
pub struct SpoolTv {
    path: PathBuf,
    surface: Mutex<()>,
}

impl SpoolTv {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            surface: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TvSurface for SpoolTv {
    async fn show(&self, image: &[u8], dwell: Duration) -> anyhow::Result<()> {
        // one image on the surface at a time
        let _guard = self.surface.lock().await;

        tokio::fs::write(&self.path, image).await?;
        info!(path = %self.path.display(), bytes = image.len(), ?dwell, "Image on TV");
        tokio::time::sleep(dwell).await;
        Ok(())
    }
}
