//! Log subscriber setup
//!
//! Library crates emit `tracing` events; the binary decides what is shown.
//! `REDLINE_LOG` takes `EnvFilter` directives. Logs always go to stderr so
//! summaries on stdout stay machine-readable.

use clap::ValueEnum;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "REDLINE_LOG";

/// Targets raised to debug by `--verbose`
const VERBOSE_DIRECTIVES: &str = "redline=debug,redline_build=debug,redline_config=debug";

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// Newline-delimited JSON for tooling
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    fn default_level(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal | Self::Verbose => "warn",
        }
    }
}

/// Filter directives from the environment value (if any) and verbosity
pub fn directives(verbosity: Verbosity, env: Option<&str>) -> String {
    let base = env
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(verbosity.default_level());

    match verbosity {
        Verbosity::Verbose => format!("{},{}", base, VERBOSE_DIRECTIVES),
        _ => base.to_string(),
    }
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(format: LogFormat, verbosity: Verbosity) {
    let env = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(directives(verbosity, env.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_level()));

    let _ = tracing_subscriber::registry()
        .with(create_format_layer(format).with_filter(filter))
        .try_init();
}

fn create_format_layer(format: LogFormat) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    }
}
