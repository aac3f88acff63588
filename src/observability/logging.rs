//! # Structured Logging
//!
//! Log output goes to stderr so stdout stays free for piping. The default
//! level is `info` for this crate and `warn` for dependencies, raised to
//! `debug` with `--verbose`. `RUST_LOG` overrides both.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Install the global subscriber.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Fails only when a global subscriber is already installed.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Create a tracing span around storing one secret.
///
/// ```rust,ignore
/// let span = store_span!(key);
/// let span = store_span!(key, item = 3);
/// ```
#[macro_export]
macro_rules! store_span {
    ($key:expr) => {
        tracing::info_span!("store", key = %$key)
    };
    ($key:expr, $($field:tt)*) => {
        tracing::info_span!("store", key = %$key, $($field)*)
    };
}
