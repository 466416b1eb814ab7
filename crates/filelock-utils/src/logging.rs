//! Tracing setup for the filelock CLI
//!
//! Events go to stderr so that command output on stdout stays clean.
//! `RUST_LOG` overrides the built-in filter.

use std::io::IsTerminal;
use std::path::Path;

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default filter for normal runs.
pub const DEFAULT_FILTER: &str = "filelock=info,warn";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "filelock=debug,info";

/// Colored output only when stderr is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// The filter directive for the given verbosity.
#[must_use]
pub const fn default_filter(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// Initialize the global tracing subscriber.
///
/// Verbose mode adds targets and span close timings. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering work done while holding the lock at `path`.
pub fn lock_span(path: &Path, backend: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "filelock",
        path = %path.display(),
        backend = %backend,
    )
}
