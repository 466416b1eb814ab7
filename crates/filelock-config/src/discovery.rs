use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{
    BackendChoice, CliOverrides, Config, ConfigSource, LockSettings, mode_from_bits,
    poll_interval_from_ms, timeout_from_secs,
};

/// File name searched for when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = ".filelock.toml";

pub const ENV_CONFIG: &str = "FILELOCK_CONFIG";
pub const ENV_TIMEOUT: &str = "FILELOCK_TIMEOUT";
pub const ENV_POLL_INTERVAL_MS: &str = "FILELOCK_POLL_INTERVAL_MS";
pub const ENV_BACKEND: &str = "FILELOCK_BACKEND";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    lock: Option<LockSettings>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current directory for config file discovery and the process
    /// environment for overrides.
    pub fn discover(cli: &CliOverrides) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli, |key| std::env::var(key).ok())
    }

    /// Path-and-environment-driven variant of [`discover`](Self::discover).
    ///
    /// Tests pass their own `env` lookup to avoid touching process-global state.
    pub fn discover_from<F>(start_dir: &Path, cli: &CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let config_path = match (&cli.config_path, env(ENV_CONFIG)) {
            (Some(explicit), _) => Some(require_file(explicit)?),
            (None, Some(from_env)) => Some(require_file(Path::new(&from_env))?),
            (None, None) => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = config_path {
            let file_config = Self::load_config_file(&path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            debug!(path = %path.display(), "loaded lock configuration");
            if let Some(settings) = file_config.lock {
                config.apply(&settings, &ConfigSource::ConfigFile(path.clone()))?;
            }
            config.config_file = Some(path);
        }

        config.apply_env(&env)?;
        config.apply_cli(cli)?;
        Ok(config)
    }

    /// Search upward from `start_dir` for [`CONFIG_FILE_NAME`], stopping at a
    /// repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    fn apply(&mut self, settings: &LockSettings, source: &ConfigSource) -> Result<(), ConfigError> {
        if let Some(secs) = settings.timeout_secs {
            self.timeout = timeout_from_secs(secs)?;
            self.attribute("timeout", source);
        }
        if let Some(ms) = settings.poll_interval_ms {
            self.poll_interval = poll_interval_from_ms(ms)?;
            self.attribute("poll_interval", source);
        }
        if let Some(mode) = settings.mode {
            self.mode = mode_from_bits(mode)?;
            self.attribute("mode", source);
        }
        if let Some(backend) = settings.backend {
            self.backend = backend;
            self.attribute("backend", source);
        }
        if let Some(create) = settings.create_parent_dirs {
            self.create_parent_dirs = create;
            self.attribute("create_parent_dirs", source);
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = env(ENV_TIMEOUT) {
            let settings = LockSettings {
                timeout_secs: Some(parse_number(ENV_TIMEOUT, &raw)?),
                ..LockSettings::default()
            };
            self.apply(&settings, &ConfigSource::Env(ENV_TIMEOUT.to_string()))?;
        }
        if let Some(raw) = env(ENV_POLL_INTERVAL_MS) {
            let settings = LockSettings {
                poll_interval_ms: Some(parse_number(ENV_POLL_INTERVAL_MS, &raw)?),
                ..LockSettings::default()
            };
            self.apply(&settings, &ConfigSource::Env(ENV_POLL_INTERVAL_MS.to_string()))?;
        }
        if let Some(raw) = env(ENV_BACKEND) {
            let settings = LockSettings {
                backend: Some(raw.parse::<BackendChoice>()?),
                ..LockSettings::default()
            };
            self.apply(&settings, &ConfigSource::Env(ENV_BACKEND.to_string()))?;
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) -> Result<(), ConfigError> {
        let settings = LockSettings {
            timeout_secs: cli.timeout_secs,
            poll_interval_ms: cli.poll_interval_ms,
            mode: cli.mode,
            backend: cli.backend,
            create_parent_dirs: cli.create_parent_dirs,
        };
        self.apply(&settings, &ConfigSource::Cli)
    }

    fn attribute(&mut self, key: &str, source: &ConfigSource) {
        self.source_attribution
            .insert(key.to_string(), source.clone());
    }
}

fn require_file(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ConfigError::MissingFile {
            path: path.to_path_buf(),
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: var.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_any_source() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        let config = Config::discover_from(dir.path(), &CliOverrides::default(), no_env).unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.backend, BackendChoice::Auto);
        assert!(config.config_file.is_none());
        assert_eq!(config.source_of("mode"), Some(&ConfigSource::Defaults));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            "[lock]\ntimeout_secs = 2.5\npoll_interval_ms = 20\nmode = 0o640\nbackend = \"soft\"\n",
        );

        let config = Config::discover_from(dir.path(), &CliOverrides::default(), no_env).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.mode, 0o640);
        assert_eq!(config.backend, BackendChoice::Soft);
        assert_eq!(config.config_file.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.source_of("backend"),
            Some(&ConfigSource::ConfigFile(path))
        );
    }

    #[test]
    fn test_discovery_walks_up_to_parent() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[lock]\ntimeout_secs = -1\n");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = Config::discover_config_file_from(&nested);
        assert_eq!(found, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_discovery_stops_at_repository_root() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[lock]\n");
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();

        assert_eq!(Config::discover_config_file_from(&repo), None);
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[lock]\ntimeout_secs = 10\npoll_interval_ms = 100\n");
        let env = env_from(&[(ENV_TIMEOUT, "3"), (ENV_POLL_INTERVAL_MS, "30")]);
        let cli = CliOverrides {
            poll_interval_ms: Some(7),
            ..CliOverrides::default()
        };

        let config = Config::discover_from(dir.path(), &cli, env).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.poll_interval, Duration::from_millis(7));
        assert_eq!(
            config.source_of("timeout"),
            Some(&ConfigSource::Env(ENV_TIMEOUT.to_string()))
        );
        assert_eq!(config.source_of("poll_interval"), Some(&ConfigSource::Cli));
    }

    #[test]
    fn test_negative_cli_timeout_waits_forever() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[lock]\ntimeout_secs = 5\n");
        let cli = CliOverrides {
            timeout_secs: Some(-1.0),
            ..CliOverrides::default()
        };

        let config = Config::discover_from(dir.path(), &cli, no_env).unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.to_lock_options().timeout, None);
    }

    #[test]
    fn test_explicit_config_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let cli = CliOverrides {
            config_path: Some(dir.path().join("absent.toml")),
            ..CliOverrides::default()
        };

        let err = Config::discover_from(dir.path(), &cli, no_env).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_config_path_from_env() {
        let dir = TempDir::new().unwrap();
        let elsewhere = dir.path().join("custom.toml");
        std::fs::write(&elsewhere, "[lock]\nbackend = \"soft\"\n").unwrap();
        let env = env_from(&[(ENV_CONFIG, elsewhere.to_str().unwrap())]);

        let config = Config::discover_from(dir.path(), &CliOverrides::default(), env).unwrap();
        assert_eq!(config.backend, BackendChoice::Soft);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[lock]\nstale_after = 3\n");

        let err = Config::discover_from(dir.path(), &CliOverrides::default(), no_env).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidFile { .. })
        ));
    }

    #[test]
    fn test_invalid_env_value_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let env = env_from(&[(ENV_BACKEND, "nfs")]);

        let err = Config::discover_from(dir.path(), &CliOverrides::default(), env).unwrap_err();
        assert!(err.to_string().contains("nfs"));
    }
}
