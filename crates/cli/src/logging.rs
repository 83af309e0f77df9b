//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so `classify` output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;
use urbanroute_config::{LogFormat, LoggingConfig};

/// Filter directive: `-v` forces debug, otherwise the configured level.
fn default_directive(config: Option<&LoggingConfig>, verbose: bool) -> &str {
    if verbose {
        "debug"
    } else {
        config.map_or("info", |c| c.level.as_str())
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level
/// unless `-v` was given.
pub fn init(config: Option<&LoggingConfig>, verbose: bool) {
    let directive = default_directive(config, verbose);
    let filter = if verbose {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let format = config.map_or(LogFormat::Pretty, |c| c.format);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.with_target(false).init(),
    }
}
