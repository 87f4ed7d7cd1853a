//! Tracing setup for the command line
//!
//! Logs go to stderr so they never mix with command output. The filter comes
//! from `PARTDB_LOG` if set, then `--verbose`/`--quiet`, then the configured
//! `log_level`, and defaults to warnings only.

use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::GlobalOpts;
use crate::core::Config;

/// Environment variable holding a tracing filter directive
pub const LOG_ENV: &str = "PARTDB_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Pick the filter directive for this invocation
pub fn filter_directive(env: Option<String>, global: &GlobalOpts, config: &Config) -> String {
    if let Some(directive) = env.filter(|s| !s.trim().is_empty()) {
        return directive;
    }
    if global.verbose {
        return "partdb=debug".to_string();
    }
    if global.quiet {
        return "error".to_string();
    }
    config
        .log_level()
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Install the global subscriber; later calls are ignored
pub fn init(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    fn opts(verbose: bool, quiet: bool) -> GlobalOpts {
        GlobalOpts {
            format: OutputFormat::Auto,
            quiet,
            verbose,
            project: None,
        }
    }

    #[test]
    fn test_env_wins() {
        let config = Config {
            log_level: Some("info".to_string()),
            ..Default::default()
        };
        let directive = filter_directive(Some("partdb=trace".to_string()), &opts(true, false), &config);
        assert_eq!(directive, "partdb=trace");
    }

    #[test]
    fn test_flags_before_config() {
        let config = Config {
            log_level: Some("info".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_directive(None, &opts(true, false), &config), "partdb=debug");
        assert_eq!(filter_directive(None, &opts(false, true), &config), "error");
        assert_eq!(filter_directive(Some("  ".to_string()), &opts(false, false), &config), "info");
    }

    #[test]
    fn test_default_is_warn() {
        assert_eq!(filter_directive(None, &opts(false, false), &Config::default()), "warn");
    }
}
