//! Capture and playback device seams.
//!
//! The physical devices (webcam, microphone, speaker) are external
//! collaborators; each is reached through a trait so the pipelines can run
//! against synthetic devices in tests and on machines without hardware.

use std::time::Duration;

use async_trait::async_trait;

use booth_core::types::AudioChunk;

/// A video capture device yielding encoded still frames on demand.
///
/// Claimed exclusively by one frame source for its lifetime.
#[async_trait]
pub trait Camera: Send {
    /// Read one frame as encoded image bytes. `Ok(None)` means the device
    /// had nothing this tick; the caller skips and tries again next tick.
    async fn read_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
}

/// A microphone yielding one fixed audio window per call.
#[async_trait]
pub trait Microphone: Send {
    async fn read_chunk(&mut self) -> anyhow::Result<AudioChunk>;
}

/// A playback device consuming audio windows.
#[async_trait]
pub trait Speaker: Send {
    async fn play_chunk(&mut self, chunk: AudioChunk) -> anyhow::Result<()>;
}

/// Camera that cycles through a fixed list of encoded frames.
///
/// Used by tests and `--synthetic` rehearsal runs.
pub struct SyntheticCamera {
    frames: Vec<Vec<u8>>,
    next: usize,
}

impl SyntheticCamera {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self { frames, next: 0 }
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn read_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Microphone producing silent windows at the configured cadence.
pub struct SilentMicrophone {
    window: Duration,
    bytes_per_window: usize,
}

impl SilentMicrophone {
    pub fn new(sample_rate: u32, window: Duration) -> Self {
        // 16-bit mono PCM
        let samples = (sample_rate as u64 * window.as_millis() as u64 / 1000) as usize;
        Self {
            window,
            bytes_per_window: samples * 2,
        }
    }
}

#[async_trait]
impl Microphone for SilentMicrophone {
    async fn read_chunk(&mut self) -> anyhow::Result<AudioChunk> {
        tokio::time::sleep(self.window).await;
        Ok(AudioChunk::new(vec![0u8; self.bytes_per_window]))
    }
}

/// Camera fed by an external capture process that overwrites a spool file
/// with the latest still.
///
/// A tick where the file is missing or unchanged yields nothing; the frame
/// source simply tries again next tick.
pub struct SpoolCamera {
    path: std::path::PathBuf,
    last_modified: Option<std::time::SystemTime>,
}

impl SpoolCamera {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self {
            path,
            last_modified: None,
        }
    }
}

#[async_trait]
impl Camera for SpoolCamera {
    async fn read_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            // nothing spooled yet
            Err(_) => return Ok(None),
        };
        let modified = meta.modified()?;
        if self.last_modified == Some(modified) {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        self.last_modified = Some(modified);
        Ok(Some(bytes))
    }
}

/// Speaker that discards everything.
pub struct NullSpeaker;

#[async_trait]
impl Speaker for NullSpeaker {
    async fn play_chunk(&mut self, _chunk: AudioChunk) -> anyhow::Result<()> {
        Ok(())
    }
}
