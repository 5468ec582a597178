//! Media pipeline — frame capture, QR scanning, audio bridging.

pub mod audio_bridge;
pub mod devices;
pub mod frame_source;
pub mod qr_scanner;

#[cfg(feature = "backend-cpal")]
pub mod cpal_backend;

pub use audio_bridge::AudioBridge;
pub use devices::{
    Camera, Microphone, NullSpeaker, SilentMicrophone, Speaker, SpoolCamera, SyntheticCamera,
};
pub use frame_source::FrameSource;
pub use qr_scanner::QrScanner;

#[cfg(feature = "backend-cpal")]
pub use cpal_backend::{CpalMicrophone, CpalSpeaker};
