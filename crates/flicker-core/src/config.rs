//! Configuration system for Flicker.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FLICKER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/flicker/config.toml
//!   3. ~/.config/flicker/config.toml
//!
//! Transport constants are shared by convention between sender and receiver;
//! nothing here is negotiated over the optical channel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::frame::{DEFAULT_FRAME_CHARS, DEFAULT_THRESHOLD_CHARS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickerConfig {
    pub transport: TransportConfig,
    pub scanner: ScannerConfig,
    pub collector: CollectorConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Payloads longer than this many characters are chunked.
    pub threshold_chars: usize,
    /// Payload characters per chunked frame.
    pub frame_chars: usize,
    /// Time each frame stays on screen, in milliseconds.
    pub cycle_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Upper bound on decoded results processed per second. 0 = unbounded.
    pub max_scans_per_second: u32,
    /// Decoded results buffered between the capture source and the consumer.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Max concurrent incomplete sessions. 0 = unlimited.
    pub max_sessions: usize,
    /// Drop incomplete sessions older than this. 0 = never.
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Draw the blank border around each code.
    pub quiet_zone: bool,
    /// Terminal columns per QR module.
    pub module_width: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            threshold_chars: DEFAULT_THRESHOLD_CHARS,
            frame_chars: DEFAULT_FRAME_CHARS,
            cycle_interval_ms: 200,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_scans_per_second: 5,
            channel_capacity: 64,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            quiet_zone: true,
            module_width: 2,
        }
    }
}

// ── Accessors ─────────────────────────────────────────────────────────────────

impl TransportConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

impl ScannerConfig {
    /// Minimum spacing between processed results, if bounded.
    ///
    /// Rates above one per nanosecond are indistinguishable from unbounded.
    pub fn min_scan_spacing(&self) -> Option<Duration> {
        match self.max_scans_per_second {
            0 => None,
            n => Some(Duration::from_secs(1) / n).filter(|spacing| !spacing.is_zero()),
        }
    }
}

impl CollectorConfig {
    pub fn max_sessions(&self) -> Option<usize> {
        (self.max_sessions > 0).then_some(self.max_sessions)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("flicker")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, &'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FlickerConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit file (defaults if it does not exist), then apply
    /// env overrides and validate.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            FlickerConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FLICKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = FlickerConfig::default().to_toml()?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Reject settings the transport cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.frame_chars == 0 {
            return Err(ConfigError::Invalid("transport.frame_chars", "must be at least 1"));
        }
        if self.transport.cycle_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "transport.cycle_interval_ms",
                "must be at least 1",
            ));
        }
        if self.scanner.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "scanner.channel_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Apply FLICKER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_number("FLICKER_TRANSPORT__THRESHOLD_CHARS") {
            self.transport.threshold_chars = v;
        }
        if let Some(v) = env_number("FLICKER_TRANSPORT__FRAME_CHARS") {
            self.transport.frame_chars = v;
        }
        if let Some(v) = env_number("FLICKER_TRANSPORT__CYCLE_INTERVAL_MS") {
            self.transport.cycle_interval_ms = v;
        }
        if let Some(v) = env_number("FLICKER_SCANNER__MAX_SCANS_PER_SECOND") {
            self.scanner.max_scans_per_second = v;
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
