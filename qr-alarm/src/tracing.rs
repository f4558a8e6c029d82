//! Logging setup shared by the binaries.

use time::UtcOffset;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// The logging macros, imported by every module as
/// `use crate::tracing::prelude::*`.
pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

/// Install the global subscriber.
///
/// Logs go to the journal when the daemon runs under systemd
/// (`JOURNAL_STREAM` is set and the journal accepts the connection), and to
/// stdout otherwise. `RUST_LOG` overrides the default `info` filter.
///
/// Call before starting the tokio runtime; `offset` should come from the
/// same startup lookup the clock uses.
pub fn init_journald_or_stdout(offset: UtcOffset) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let journald = if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_journald::layer().ok()
    } else {
        None
    };
    let stdout = journald
        .is_none()
        .then(|| fmt::layer().with_timer(OffsetTime::new(offset, Rfc3339)));

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(stdout)
        .init();
}

/// Warnings to stderr, for the command-line client.
pub fn init_stderr_warnings() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .init();
}
