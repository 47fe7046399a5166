//! Plumbing shared by the `ping` and `traceroute` binaries.

use core::time::Duration;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Diagnostics};

/// Default configuration file.
pub const DEFAULT_CONFIG: &str = "/etc/pingtrace/config.toml";

/// Install the log subscriber.
///
/// Logs go to stderr so that the output of a run stays on stdout. The level is
/// taken from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Log a failed run and convert it into an exit code.
pub fn report(result: Result<()>) -> ExitCode {
    if let Err(err) = result {
        tracing::error!("Error: {err}");

        for e in err.chain().skip(1) {
            tracing::error!("Caused by: {e}");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Load configuration from the given paths, later files overriding earlier
/// ones.
pub fn load_config(paths: &[PathBuf]) -> Result<Config> {
    let mut config = Config::default();
    let mut has_errors = false;

    for path in paths {
        let d = Diagnostics::new();

        config
            .add_from_path(path, &d)
            .with_context(|| path.display().to_string())?;

        for error in d.into_errors() {
            tracing::error!("{}: {error}", path.display());
            has_errors = true;
        }
    }

    if has_errors {
        return Err(anyhow!("Configuration had errors"));
    }

    Ok(config)
}

/// Parse a number of seconds, which may be fractional.
pub fn seconds(s: &str) -> Result<Duration, String> {
    let seconds = s
        .parse::<f64>()
        .map_err(|error| format!("`{s}`: {error}"))?;

    Duration::try_from_secs_f64(seconds).map_err(|error| format!("`{s}`: {error}"))
}

/// The identifier to put in echo requests, derived from the process id.
pub fn identifier() -> u16 {
    std::process::id() as u16
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use std::path::PathBuf;

    use super::{load_config, seconds};

    #[test]
    fn parse_seconds() {
        assert_eq!(seconds("1"), Ok(Duration::from_secs(1)));
        assert_eq!(seconds("0.25"), Ok(Duration::from_millis(250)));
        assert!(seconds("-1").is_err());
        assert!(seconds("soon").is_err());
    }

    #[test]
    fn missing_config_is_default() {
        let config = load_config(&[PathBuf::from("/nonexistent/pingtrace.toml")]).unwrap();
        assert_eq!(config.ping.count, None);
        assert_eq!(config.traceroute.max_hops, None);
    }
}
