//! Frame source — pulls frames from the camera on a fixed tick and fans
//! them out on a bounded broadcast channel.
//!
//! The producer never blocks: lagging receivers lose the oldest frames and
//! pick back up at the live edge.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use booth_core::types::Frame;

use crate::devices::Camera;

/// Handle to a running frame source.
///
/// The capture task owns the camera for its whole lifetime and stops on
/// cancellation. Handles are cheap to clone.
#[derive(Clone)]
pub struct FrameSource {
    tx: broadcast::Sender<Frame>,
}

impl FrameSource {
    /// Spawn the capture loop. `capacity` bounds the fan-out buffer.
    pub fn spawn(
        mut camera: Box<dyn Camera>,
        tick: Duration,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        let publisher = tx.clone();

        tokio::spawn(async move {
            info!(?tick, capacity, "Frame source started");
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq: u64 = 0;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        match camera.read_frame().await {
                            Ok(Some(jpeg)) => {
                                seq += 1;
                                // send never blocks; no-receivers is not an error here
                                let _ = publisher.send(Frame {
                                    jpeg,
                                    seq,
                                    captured_at: Utc::now(),
                                });
                            }
                            Ok(None) => {}
                            Err(e) => debug!(%e, "Frame read failed, skipping tick"),
                        }
                    }
                }
            }
            info!(frames = seq, "Frame source stopped");
        });

        Self { tx }
    }

    /// Subscribe to frames published from now on.
    pub fn frames(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Await the next frame captured after this call, bounded by `timeout`.
    pub async fn next_frame(&self, timeout: Duration) -> anyhow::Result<Frame> {
        let mut rx = self.tx.subscribe();
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(frame) => return Ok(frame),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        anyhow::bail!("frame source stopped")
                    }
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("no frame available within {timeout:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::SyntheticCamera;

    fn tiny_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xD9]
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_flow_to_subscriber() {
        let cancel = CancellationToken::new();
        let source = FrameSource::spawn(
            Box::new(SyntheticCamera::new(vec![tiny_jpeg()])),
            Duration::from_millis(100),
            10,
            cancel.clone(),
        );

        let frame = source.next_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.jpeg, tiny_jpeg());
        assert!(frame.seq >= 1);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_survives_full_buffer() {
        let cancel = CancellationToken::new();
        let source = FrameSource::spawn(
            Box::new(SyntheticCamera::new(vec![tiny_jpeg()])),
            Duration::from_millis(100),
            2,
            cancel.clone(),
        );

        // Subscribe but do not consume while well over `capacity` frames are
        // produced: the producer must keep ticking and the receiver must see
        // a lag, not a stall.
        let mut rx = source.frames();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                assert!(skipped > 0, "expected dropped frames under overload");
            }
            other => panic!("expected lag under overload, got {other:?}"),
        }

        // After the lag the receiver resumes at the live edge.
        let frame = rx.recv().await.unwrap();
        assert!(frame.seq > 2);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_frame_times_out_without_frames() {
        let cancel = CancellationToken::new();
        let source = FrameSource::spawn(
            Box::new(SyntheticCamera::new(Vec::new())),
            Duration::from_millis(100),
            10,
            cancel.clone(),
        );

        let err = source.next_frame(Duration::from_millis(500)).await;
        assert!(err.is_err());

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_source() {
        let cancel = CancellationToken::new();
        let source = FrameSource::spawn(
            Box::new(SyntheticCamera::new(vec![tiny_jpeg()])),
            Duration::from_millis(100),
            10,
            cancel.clone(),
        );

        let mut rx = source.frames();
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        // The capture task held the last sender clone besides the handle.
        drop(source);

        // Drain whatever was in flight; the channel must then report closed.
        loop {
            match rx.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
