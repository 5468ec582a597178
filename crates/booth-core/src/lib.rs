//! Shared types, config, and errors for the booth kiosk.

pub mod config;
pub mod error;
pub mod types;

pub use error::{BoothError, Result};
