//! Tracing subscriber setup for the binary.

use std::io::{self, IsTerminal};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Command-line verbosity flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    pub quiet: bool,
    pub verbose: u8,
}

/// The level to log at, with flags taking precedence over configuration.
pub fn effective_level(config: &LoggingConfig, verbosity: Verbosity) -> String {
    if verbosity.quiet {
        return "error".to_string();
    }

    match verbosity.verbose {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides everything else.
///
/// Logs go to stderr so command output on stdout stays parseable.
pub fn init_logging(config: &LoggingConfig, verbosity: Verbosity) {
    let level = effective_level(config, verbosity);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warbler={level},sqlx=warn")));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        let disable_color = std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(!disable_color)
                    .with_writer(io::stderr),
            )
            .try_init()
            .ok();
    }
}
