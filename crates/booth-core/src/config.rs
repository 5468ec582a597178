//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::IdentityMode;

/// Top-level booth configuration.
///
/// Loaded from a JSON5 file; every section is optional and falls back to
/// the defaults the kiosk shipped with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booth: Option<BoothConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<LiveConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoothConfig {
    /// When identity is bound: up-front scan, or via the `identifyUser` tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_mode: Option<IdentityMode>,

    /// System-instruction template; `{name}` is replaced with the user name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting_template: Option<String>,

    /// First free-text message sent after the session opens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kickoff_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_grace_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Spool file the capture process overwrites with the latest still.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_path: Option<String>,

    /// Capture cadence in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_ms: Option<u64>,

    /// Frame fan-out buffer capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,

    /// How long a snapshot call waits for the next frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Capture sample rate the session expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,

    /// Playback sample rate the session produces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_sample_rate: Option<u32>,

    /// Capture window length in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,

    /// Per-direction audio lane capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

/// Conversational session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl LiveConfig {
    /// Resolve the API key: direct value first, then the env-var reference.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
            .or_else(|| std::env::var(DEFAULT_API_KEY_ENV).ok().filter(|v| !v.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Ticket lookup endpoint. When unset, the static rehearsal resolver is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Name returned by the static resolver when no endpoint is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Virtual directory prepended to every object key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,

    /// Public URL base override; defaults to the bucket's virtual-host URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Minimum time an image stays on the TV, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_secs: Option<u64>,

    /// Where the current still is spooled for the display process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::BoothError::Io)?;

        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::BoothError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        PathBuf::from("booth.json")
    }

    pub fn identity_mode(&self) -> IdentityMode {
        self.booth
            .as_ref()
            .and_then(|b| b.identity_mode)
            .unwrap_or_default()
    }

    pub fn greeting_template(&self) -> String {
        self.booth
            .as_ref()
            .and_then(|b| b.greeting_template.clone())
            .unwrap_or_else(|| {
                "You are the photobooth agent at the Diffusion festival, talking to {name}. \
                 Offer to take their photo, upload it, and show them a download QR code on the TV."
                    .to_string()
            })
    }

    pub fn kickoff_text(&self) -> String {
        self.booth
            .as_ref()
            .and_then(|b| b.kickoff_text.clone())
            .unwrap_or_else(|| "standby".to_string())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(
            self.booth
                .as_ref()
                .and_then(|b| b.tool_timeout_secs)
                .unwrap_or(30),
        )
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(
            self.booth
                .as_ref()
                .and_then(|b| b.shutdown_grace_secs)
                .unwrap_or(5),
        )
    }

    pub fn camera_spool_path(&self) -> PathBuf {
        self.camera
            .as_ref()
            .and_then(|c| c.spool_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("booth-camera.jpg"))
    }

    pub fn camera_tick(&self) -> Duration {
        Duration::from_millis(self.camera.as_ref().and_then(|c| c.tick_ms).unwrap_or(100))
    }

    pub fn frame_capacity(&self) -> usize {
        self.camera
            .as_ref()
            .and_then(|c| c.channel_capacity)
            .unwrap_or(10)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(
            self.camera
                .as_ref()
                .and_then(|c| c.snapshot_timeout_secs)
                .unwrap_or(5),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio
            .as_ref()
            .and_then(|a| a.sample_rate)
            .unwrap_or(16_000)
    }

    pub fn playback_sample_rate(&self) -> u32 {
        self.audio
            .as_ref()
            .and_then(|a| a.playback_sample_rate)
            .unwrap_or(24_000)
    }

    pub fn audio_window(&self) -> Duration {
        Duration::from_millis(self.audio.as_ref().and_then(|a| a.window_ms).unwrap_or(20))
    }

    pub fn audio_capacity(&self) -> usize {
        self.audio
            .as_ref()
            .and_then(|a| a.channel_capacity)
            .unwrap_or(100)
    }

    pub fn live_model(&self) -> String {
        self.live
            .as_ref()
            .and_then(|l| l.model.clone())
            .unwrap_or_else(|| "gemini-2.0-flash-live-preview-04-09".to_string())
    }

    pub fn live_endpoint(&self) -> String {
        self.live
            .as_ref()
            .and_then(|l| l.endpoint.clone())
            .unwrap_or_else(|| {
                "wss://generativelanguage.googleapis.com/ws/\
                 google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent"
                    .to_string()
            })
    }

    pub fn live_api_key(&self) -> Option<String> {
        match &self.live {
            Some(live) => live.resolve_api_key(),
            None => std::env::var(DEFAULT_API_KEY_ENV).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn identity_endpoint(&self) -> Option<String> {
        self.identity.as_ref().and_then(|i| i.endpoint.clone())
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_secs(
            self.identity
                .as_ref()
                .and_then(|i| i.timeout_secs)
                .unwrap_or(10),
        )
    }

    pub fn identity_fallback_name(&self) -> String {
        self.identity
            .as_ref()
            .and_then(|i| i.fallback_name.clone())
            .unwrap_or_else(|| "Guest".to_string())
    }

    pub fn storage_bucket(&self) -> String {
        self.storage
            .as_ref()
            .and_then(|s| s.bucket.clone())
            .unwrap_or_else(|| "festival-booth".to_string())
    }

    pub fn storage_key_prefix(&self) -> String {
        self.storage
            .as_ref()
            .and_then(|s| s.key_prefix.clone())
            .unwrap_or_default()
    }

    pub fn storage_url_base(&self) -> String {
        self.storage
            .as_ref()
            .and_then(|s| s.url_base.clone())
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", self.storage_bucket()))
    }

    pub fn display_dwell(&self) -> Duration {
        Duration::from_secs(
            self.display
                .as_ref()
                .and_then(|d| d.dwell_secs)
                .unwrap_or(60),
        )
    }

    pub fn display_spool_path(&self) -> PathBuf {
        self.display
            .as_ref()
            .and_then(|d| d.spool_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("booth-tv.png"))
    }

    pub fn log_level(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.level.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_the_kiosk() {
        let config = Config::default();
        assert_eq!(config.camera_tick(), Duration::from_millis(100));
        assert_eq!(config.frame_capacity(), 10);
        assert_eq!(config.audio_capacity(), 100);
        assert_eq!(config.sample_rate(), 16_000);
        assert_eq!(config.playback_sample_rate(), 24_000);
        assert_eq!(config.storage_bucket(), "festival-booth");
        assert_eq!(config.display_dwell(), Duration::from_secs(60));
        assert_eq!(config.identity_mode(), IdentityMode::ScanFirst);
        assert_eq!(
            config.storage_url_base(),
            "https://festival-booth.s3.amazonaws.com"
        );
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/booth.json")).unwrap();
        assert!(config.booth.is_none());
        assert_eq!(config.storage_bucket(), "festival-booth");
    }

    #[test]
    fn test_load_json5_with_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                // kiosk overrides
                camera: {{ tick_ms: 50, channel_capacity: 4 }},
                display: {{ dwell_secs: 10 }},
                booth: {{ identity_mode: "on_demand" }},
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.camera_tick(), Duration::from_millis(50));
        assert_eq!(config.frame_capacity(), 4);
        assert_eq!(config.display_dwell(), Duration::from_secs(10));
        assert_eq!(config.identity_mode(), IdentityMode::OnDemand);
    }

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("BOOTH_TEST_BUCKET", "side-stage") };
        let input = r#"{"storage": {"bucket": "${BOOTH_TEST_BUCKET}"}}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("side-stage"));

        let config: Config = json5::from_str(&result).unwrap();
        assert_eq!(config.storage_bucket(), "side-stage");
    }

    #[test]
    fn test_resolve_secret_field_prefers_direct_value() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("BOOTH_TEST_KEY", "from-env") };
        assert_eq!(
            resolve_secret_field(&Some("direct".into()), &Some("BOOTH_TEST_KEY".into())),
            Some("direct".into())
        );
        assert_eq!(
            resolve_secret_field(&None, &Some("BOOTH_TEST_KEY".into())),
            Some("from-env".into())
        );
        assert_eq!(resolve_secret_field(&None, &None), None);
    }
}
