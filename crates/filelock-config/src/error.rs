use std::path::PathBuf;

/// Configuration errors. All of them map to the CLI/config exit code.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config file {}: {reason}", path.display())]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Config file not found: {}", path.display())]
    MissingFile { path: PathBuf },
}
