//! Configuration management for filelock
//!
//! Lock settings are merged with precedence CLI > environment > file >
//! defaults. The config file is TOML with a single `[lock]` table:
//!
//! ```toml
//! [lock]
//! timeout_secs = -1        # negative waits forever
//! poll_interval_ms = 50
//! mode = 0o660
//! backend = "auto"         # auto | kernel | mandatory | soft
//! create_parent_dirs = false
//! ```

mod discovery;
mod error;
mod model;

pub use discovery::{
    CONFIG_FILE_NAME, ENV_BACKEND, ENV_CONFIG, ENV_POLL_INTERVAL_MS, ENV_TIMEOUT,
};
pub use error::ConfigError;
pub use model::{
    BackendChoice, CliOverrides, Config, ConfigSource, LockSettings, mode_from_bits,
    poll_interval_from_ms, timeout_from_secs,
};
