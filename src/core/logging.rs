//! Diagnostics via tracing
//!
//! Logs go to stderr so stdout stays machine readable. `YQ_PROVIDER_LOG` takes an
//! `EnvFilter` directive and wins over the `--verbose` / `--quiet` defaults.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "YQ_PROVIDER_LOG";

/// Default filter directive for the CLI verbosity flags
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "warn",
    }
}

/// Install the global subscriber; a second call is a no-op
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false, false), "warn");
        assert_eq!(default_directive(true, false), "debug");
        assert_eq!(default_directive(false, true), "error");
        assert_eq!(default_directive(true, true), "debug");
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(false, true);
        init_logging(true, false);
    }
}
