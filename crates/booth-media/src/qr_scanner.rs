//! QR scanner — consumes frames until one decodes, then signals the
//! payload exactly once and stops itself.

use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use booth_core::types::Frame;

/// Attempt to decode a QR payload from one encoded image.
///
/// Any failure (bad image, no grid, decode error, empty payload) is `None`;
/// the scan simply continues on the next frame.
pub fn decode_frame(encoded: &[u8]) -> Option<String> {
    let img = image::load_from_memory(encoded).ok()?.to_luma8();
    let (w, h) = img.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        img.get_pixel(x as u32, y as u32).0[0]
    });
    for grid in prepared.detect_grids() {
        if let Ok((_meta, content)) = grid.decode() {
            if !content.is_empty() {
                return Some(content);
            }
        }
    }
    None
}

/// One-shot QR scan over a frame stream.
pub struct QrScanner;

impl QrScanner {
    /// Spawn the scan loop. The returned receiver yields the first decoded
    /// payload; the loop exits on success or cancellation. Delivery of the
    /// payload is reliable (oneshot), unlike the lossy frame stream.
    pub fn spawn(
        mut frames: broadcast::Receiver<Frame>,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<String> {
        let (payload_tx, payload_rx) = oneshot::channel();

        tokio::spawn(async move {
            info!("QR scan started");
            let mut scanned: u64 = 0;
            let mut payload_tx = Some(payload_tx);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = frames.recv() => match frame {
                        Ok(frame) => {
                            scanned += 1;
                            if let Some(payload) = decode_frame(&frame.jpeg) {
                                info!(scanned, "QR payload decoded");
                                if let Some(tx) = payload_tx.take() {
                                    let _ = tx.send(payload);
                                }
                                // self-cancelling on success
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Scanner lagged, resuming at live edge");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!(scanned, "QR scan stopped");
        });

        payload_rx
    }
}
