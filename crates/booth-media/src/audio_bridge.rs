//! Audio bridge — duplex streaming between the audio devices and the live
//! session through two independent bounded lanes.
//!
//! Producers for live device I/O never block on a full lane: the newest
//! chunk is dropped instead.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use booth_core::types::AudioChunk;

use crate::devices::{Microphone, Speaker};

/// Handle to the two running audio lanes.
pub struct AudioBridge {
    /// Mic -> session chunks. Taken by the session forwarder.
    pub capture: mpsc::Receiver<AudioChunk>,
    /// Session -> speaker chunks. Fed by the dispatcher with a
    /// non-blocking send; drop on full.
    pub playback: mpsc::Sender<AudioChunk>,
}

impl AudioBridge {
    /// Spawn the capture and playback loops. Each task owns its device
    /// exclusively and stops on cancellation.
    pub fn spawn(
        mut mic: Box<dyn Microphone>,
        mut speaker: Box<dyn Speaker>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (capture_tx, capture_rx) = mpsc::channel::<AudioChunk>(capacity.max(1));
        let (playback_tx, mut playback_rx) = mpsc::channel::<AudioChunk>(capacity.max(1));

        let capture_cancel = cancel.clone();
        tokio::spawn(async move {
            info!(capacity, "Mic capture started");
            let mut dropped: u64 = 0;
            loop {
                tokio::select! {
                    _ = capture_cancel.cancelled() => break,
                    chunk = mic.read_chunk() => match chunk {
                        Ok(chunk) => match capture_tx.try_send(chunk) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                dropped += 1;
                                trace!(dropped, "Capture lane full, dropping chunk");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        },
                        Err(e) => {
                            warn!(%e, "Mic read failed, stopping capture");
                            break;
                        }
                    }
                }
            }
            info!(dropped, "Mic capture stopped");
        });

        tokio::spawn(async move {
            info!("Playback started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = playback_rx.recv() => match chunk {
                        Some(chunk) => {
                            if let Err(e) = speaker.play_chunk(chunk).await {
                                debug!(%e, "Playback chunk failed");
                            }
                        }
                        None => break,
                    }
                }
            }
            info!("Playback stopped");
        });

        Self {
            capture: capture_rx,
            playback: playback_tx,
        }
    }
}
