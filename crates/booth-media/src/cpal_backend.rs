//! cpal-backed audio devices (feature `backend-cpal`).
//!
//! cpal streams are not `Send`, so each device runs on a dedicated thread
//! that owns the stream; the async side talks to it through channels. The
//! realtime callbacks never block: full buffers drop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::warn;

use booth_core::types::AudioChunk;

use crate::devices::{Microphone, Speaker};

/// Default input device captured as 16-bit mono PCM windows.
pub struct CpalMicrophone {
    rx: mpsc::Receiver<AudioChunk>,
    // Dropping this unparks the device thread, which drops the stream.
    _shutdown: std::sync::mpsc::Sender<()>,
}

impl CpalMicrophone {
    pub fn open(sample_rate: u32, window: Duration) -> anyhow::Result<Self> {
        let samples_per_window = (sample_rate as u64 * window.as_millis() as u64 / 1000) as usize;
        let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>(64);
        let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<anyhow::Result<()>>();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(anyhow::anyhow!("no default input device")));
                    return;
                }
            };
            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let mut pending: Vec<i16> = Vec::with_capacity(samples_per_window);
            let stream = device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    for &sample in data {
                        pending.push(sample);
                        if pending.len() == samples_per_window {
                            let bytes: Vec<u8> = pending
                                .drain(..)
                                .flat_map(|s| s.to_le_bytes())
                                .collect();
                            // realtime thread: drop on full, never block
                            let _ = chunk_tx.try_send(AudioChunk::new(bytes));
                        }
                    }
                },
                |err| warn!(%err, "Input stream error"),
                None,
            );

            let stream = match stream.map_err(anyhow::Error::from).and_then(|s| {
                s.play().context("failed to start input stream")?;
                Ok(s)
            }) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Hold the stream until the handle drops.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        ready_rx.recv().context("input device thread died")??;
        Ok(Self {
            rx: chunk_rx,
            _shutdown: shutdown_tx,
        })
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn read_chunk(&mut self) -> anyhow::Result<AudioChunk> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("capture stream ended"))
    }
}

/// Default output device fed from a bounded sample queue; the callback
/// plays silence when the queue runs dry.
pub struct CpalSpeaker {
    queue: Arc<Mutex<VecDeque<i16>>>,
    max_queued_samples: usize,
    _shutdown: std::sync::mpsc::Sender<()>,
}

impl CpalSpeaker {
    pub fn open(sample_rate: u32) -> anyhow::Result<Self> {
        // cap the backlog at ~2s so a stalled device cannot grow unbounded
        let max_queued_samples = sample_rate as usize * 2;
        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let callback_queue = queue.clone();
        let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<anyhow::Result<()>>();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(anyhow::anyhow!("no default output device")));
                    return;
                }
            };
            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream = device.build_output_stream(
                &config,
                move |out: &mut [i16], _| {
                    let mut queue = callback_queue.lock().unwrap();
                    for slot in out.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0);
                    }
                },
                |err| warn!(%err, "Output stream error"),
                None,
            );

            let stream = match stream.map_err(anyhow::Error::from).and_then(|s| {
                s.play().context("failed to start output stream")?;
                Ok(s)
            }) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let _ = shutdown_rx.recv();
            drop(stream);
        });

        ready_rx.recv().context("output device thread died")??;
        Ok(Self {
            queue,
            max_queued_samples,
            _shutdown: shutdown_tx,
        })
    }
}

#[async_trait]
impl Speaker for CpalSpeaker {
    async fn play_chunk(&mut self, chunk: AudioChunk) -> anyhow::Result<()> {
        let samples = chunk
            .data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]));

        let mut queue = self.queue.lock().unwrap();
        for sample in samples {
            if queue.len() >= self.max_queued_samples {
                // drop the newest audio rather than grow the backlog
                break;
            }
            queue.push_back(sample);
        }
        Ok(())
    }
}
