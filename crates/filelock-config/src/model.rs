use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use filelock_lock::{BackendKind, DEFAULT_MODE, DEFAULT_POLL_INTERVAL, LockOptions};

use crate::error::ConfigError;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value taken from an environment variable.
    Env(String),
    /// Value loaded from a configuration file.
    ConfigFile(PathBuf),
    /// Built-in default value (lowest precedence).
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Env(var) => write!(f, "env ({var})"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// Backend selection as written in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Pick the platform's native backend.
    #[default]
    Auto,
    Kernel,
    Mandatory,
    Soft,
}

impl BackendChoice {
    #[must_use]
    pub const fn to_kind(self) -> BackendKind {
        match self {
            Self::Auto => BackendKind::platform_default(),
            Self::Kernel => BackendKind::Kernel,
            Self::Mandatory => BackendKind::Mandatory,
            Self::Soft => BackendKind::Soft,
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Kernel => write!(f, "kernel"),
            Self::Mandatory => write!(f, "mandatory"),
            Self::Soft => write!(f, "soft"),
        }
    }
}

impl std::str::FromStr for BackendChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "kernel" => Ok(Self::Kernel),
            "mandatory" => Ok(Self::Mandatory),
            "soft" => Ok(Self::Soft),
            other => Err(ConfigError::InvalidValue {
                key: "backend".to_string(),
                value: other.to_string(),
                reason: "expected one of auto, kernel, mandatory, soft".to_string(),
            }),
        }
    }
}

/// `[lock]` table of a config file; every field optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockSettings {
    /// Seconds to wait; negative waits forever.
    pub timeout_secs: Option<f64>,
    pub poll_interval_ms: Option<u64>,
    /// Creation permission bits, e.g. `0o660`.
    pub mode: Option<u32>,
    pub backend: Option<BackendChoice>,
    pub create_parent_dirs: Option<bool>,
}

/// Values supplied on the command line. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file (skips discovery).
    pub config_path: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
    pub poll_interval_ms: Option<u64>,
    pub mode: Option<u32>,
    pub backend: Option<BackendChoice>,
    pub create_parent_dirs: Option<bool>,
}

/// Effective lock configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub mode: u32,
    pub backend: BackendChoice,
    pub create_parent_dirs: bool,
    /// Config file that contributed values, if any.
    pub config_file: Option<PathBuf>,
    /// Source of each field, keyed by field name.
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        let source_attribution = [
            "timeout",
            "poll_interval",
            "mode",
            "backend",
            "create_parent_dirs",
        ]
        .into_iter()
        .map(|key| (key.to_string(), ConfigSource::Defaults))
        .collect();

        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: DEFAULT_MODE,
            backend: BackendChoice::Auto,
            create_parent_dirs: false,
            config_file: None,
            source_attribution,
        }
    }
}

impl Config {
    /// Options for [`filelock_lock::FileLock::with_options`].
    #[must_use]
    pub fn to_lock_options(&self) -> LockOptions {
        LockOptions::default()
            .with_timeout(self.timeout)
            .with_poll_interval(self.poll_interval)
            .with_mode(self.mode)
            .with_backend(self.backend.to_kind())
            .with_create_parent_dirs(self.create_parent_dirs)
    }

    /// Where the effective value of `key` came from.
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        self.source_attribution.get(key)
    }
}

/// Interpret a timeout in seconds; any negative value means "wait forever".
pub fn timeout_from_secs(secs: f64) -> Result<Option<Duration>, ConfigError> {
    if secs.is_nan() || secs.is_infinite() {
        return Err(ConfigError::InvalidValue {
            key: "timeout".to_string(),
            value: secs.to_string(),
            reason: "must be a finite number of seconds".to_string(),
        });
    }
    if secs < 0.0 {
        return Ok(None);
    }
    Ok(Some(Duration::from_secs_f64(secs)))
}

/// Validate a poll interval in milliseconds.
pub fn poll_interval_from_ms(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            key: "poll_interval".to_string(),
            value: ms.to_string(),
            reason: "must be at least 1 ms".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

/// Validate creation permission bits.
pub fn mode_from_bits(mode: u32) -> Result<u32, ConfigError> {
    if mode > 0o777 {
        return Err(ConfigError::InvalidValue {
            key: "mode".to_string(),
            value: format!("{mode:#o}"),
            reason: "only permission bits (0o000-0o777) are allowed".to_string(),
        });
    }
    Ok(mode)
}
