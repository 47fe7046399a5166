use core::cell::RefCell;
use core::fmt;
use core::fmt::Write;
use core::time::Duration;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

/// Loaded configuration file.
#[derive(Default, Debug)]
pub struct Config {
    /// Defaults for ping.
    pub ping: PingConfig,
    /// Defaults for traceroute.
    pub traceroute: TracerouteConfig,
}

/// Loaded ping configuration.
#[derive(Default, Debug)]
pub struct PingConfig {
    pub count: Option<i64>,
    pub wait: Option<Duration>,
    pub size: Option<usize>,
    pub timeout: Option<Duration>,
}

/// Loaded traceroute configuration.
#[derive(Default, Debug)]
pub struct TracerouteConfig {
    pub queries: Option<u16>,
    pub max_hops: Option<u8>,
    pub numeric: Option<bool>,
    pub stats: Option<bool>,
    pub timeout: Option<Duration>,
    pub size: Option<usize>,
}

impl Config {
    /// Add to configuration from the given path.
    ///
    /// A file which cannot be read is skipped.
    pub fn add_from_path(&mut self, path: &Path, diag: &Diagnostics) -> Result<()> {
        let Ok(bytes) = fs::read(path) else {
            tracing::trace!(path = %path.display(), "skipping unreadable configuration");
            return Ok(());
        };

        let value: Value = toml::from_slice(&bytes).context("failed to parse config file")?;
        self.add_from_value(value, diag);
        Ok(())
    }

    /// Add to configuration from a string.
    pub fn add_from_str(&mut self, source: &str, diag: &Diagnostics) -> Result<()> {
        let value: Value = toml::from_str(source).context("failed to parse config")?;
        self.add_from_value(value, diag);
        Ok(())
    }

    fn add_from_value(&mut self, value: Value, diag: &Diagnostics) {
        let mut parser = Parser::new(value, diag);

        parser.take("ping", |mut p| {
            let ping = &mut self.ping;

            if let Some(count) = p.take("count", Parser::integer).flatten() {
                ping.count = Some(count);
            }

            if let Some(wait) = p.take("wait", Parser::seconds).flatten() {
                ping.wait = Some(wait);
            }

            if let Some(size) = p.take("size", Parser::integer).flatten() {
                ping.size = Some(size);
            }

            if let Some(timeout) = p.take("timeout", Parser::seconds).flatten() {
                ping.timeout = Some(timeout);
            }

            p.check();
        });

        parser.take("traceroute", |mut p| {
            let traceroute = &mut self.traceroute;

            if let Some(queries) = p.take("queries", Parser::positive).flatten() {
                traceroute.queries = Some(queries);
            }

            if let Some(max_hops) = p.take("max_hops", Parser::positive).flatten() {
                traceroute.max_hops = Some(max_hops);
            }

            if let Some(numeric) = p.take("numeric", Parser::boolean).flatten() {
                traceroute.numeric = Some(numeric);
            }

            if let Some(stats) = p.take("stats", Parser::boolean).flatten() {
                traceroute.stats = Some(stats);
            }

            if let Some(timeout) = p.take("timeout", Parser::seconds).flatten() {
                traceroute.timeout = Some(timeout);
            }

            if let Some(size) = p.take("size", Parser::integer).flatten() {
                traceroute.size = Some(size);
            }

            p.check();
        });

        parser.check();
    }
}

#[must_use = "Parser must be consumed to maintain diagnostics"]
struct Parser<'a> {
    value: Value,
    diag: &'a Diagnostics,
}

impl<'a> Parser<'a> {
    fn new(value: Value, diag: &'a Diagnostics) -> Self {
        Self { value, diag }
    }

    fn integer<T>(self) -> Option<T>
    where
        T: TryFrom<i64, Error: fmt::Display>,
    {
        let out = match self.value {
            Value::Integer(value) => match T::try_from(value) {
                Ok(value) => Some(value),
                Err(error) => {
                    self.diag.error(format_args!("{value}: {error}"));
                    None
                }
            },
            other => {
                self.diag
                    .error(format_args!("expected integer, found {}", other.type_str()));
                None
            }
        };

        self.diag.pop();
        out
    }

    fn positive<T>(self) -> Option<T>
    where
        T: TryFrom<i64, Error: fmt::Display>,
    {
        if let Value::Integer(value @ ..=0) = self.value {
            self.diag
                .error(format_args!("expected a positive integer, found {value}"));
            self.diag.pop();
            return None;
        }

        self.integer()
    }

    fn boolean(self) -> Option<bool> {
        let out = match self.value {
            Value::Boolean(value) => Some(value),
            other => {
                self.diag
                    .error(format_args!("expected boolean, found {}", other.type_str()));
                None
            }
        };

        self.diag.pop();
        out
    }

    fn seconds(self) -> Option<Duration> {
        let seconds = match self.value {
            Value::Integer(value) => Some(value as f64),
            Value::Float(value) => Some(value),
            ref other => {
                self.diag
                    .error(format_args!("expected seconds, found {}", other.type_str()));
                None
            }
        };

        let out = seconds.and_then(|seconds| match Duration::try_from_secs_f64(seconds) {
            Ok(duration) => Some(duration),
            Err(error) => {
                self.diag.error(format_args!("{seconds}: {error}"));
                None
            }
        });

        self.diag.pop();
        out
    }

    fn take<O>(&mut self, key: &str, parser: impl FnOnce(Parser<'a>) -> O) -> Option<O> {
        let value = match &mut self.value {
            Value::Table(table) => table.remove(key)?,
            _ => return None,
        };

        self.diag.key(key);
        let output = parser(Parser::new(value, self.diag));
        Some(output)
    }

    fn check(self) {
        match self.value {
            Value::Table(table) => {
                for (key, value) in table {
                    self.diag.key(&key);
                    self.diag
                        .error(format_args!("unexpected key of type {}", value.type_str()));
                    self.diag.pop();
                }
            }
            value => {
                self.diag.error(format_args!(
                    "unexpected value of type {}",
                    value.type_str()
                ));
            }
        }

        self.diag.pop();
    }
}

struct DiagnosticsInner {
    path: Vec<String>,
    errors: Vec<String>,
}

/// Collected diagnostics.
pub struct Diagnostics {
    inner: RefCell<DiagnosticsInner>,
}

impl Diagnostics {
    /// Construct new empty diagnostics.
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(DiagnosticsInner {
                path: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }

    /// Convert into errors.
    pub fn into_errors(self) -> Vec<String> {
        self.inner.into_inner().errors
    }
}

impl Diagnostics {
    fn key(&self, key: &str) {
        self.inner.borrow_mut().path.push(key.to_owned());
    }

    fn pop(&self) {
        self.inner.borrow_mut().path.pop();
    }

    fn error(&self, message: impl fmt::Display) {
        let mut error = String::new();
        let mut this = self.inner.borrow_mut();

        for key in &this.path {
            error.push('.');
            error.push_str(key);
        }

        if !error.is_empty() {
            error.push_str(": ");
        }

        _ = write!(error, "{}", message);
        this.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use std::path::Path;

    use super::{Config, Diagnostics};

    fn parse(source: &str) -> (Config, Vec<String>) {
        let mut config = Config::default();
        let diag = Diagnostics::new();
        config.add_from_str(source, &diag).unwrap();
        (config, diag.into_errors())
    }

    #[test]
    fn full_config() {
        let (config, errors) = parse(
            r#"
            [ping]
            count = 5
            wait = 0.5
            size = 120
            timeout = 2

            [traceroute]
            queries = 1
            max_hops = 16
            numeric = true
            stats = false
            timeout = 1.5
            size = 32
            "#,
        );

        assert!(errors.is_empty(), "{errors:?}");

        assert_eq!(config.ping.count, Some(5));
        assert_eq!(config.ping.wait, Some(Duration::from_millis(500)));
        assert_eq!(config.ping.size, Some(120));
        assert_eq!(config.ping.timeout, Some(Duration::from_secs(2)));

        assert_eq!(config.traceroute.queries, Some(1));
        assert_eq!(config.traceroute.max_hops, Some(16));
        assert_eq!(config.traceroute.numeric, Some(true));
        assert_eq!(config.traceroute.stats, Some(false));
        assert_eq!(config.traceroute.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.traceroute.size, Some(32));
    }

    #[test]
    fn empty_config() {
        let (config, errors) = parse("");
        assert!(errors.is_empty());
        assert_eq!(config.ping.count, None);
        assert_eq!(config.traceroute.numeric, None);
    }

    #[test]
    fn errors_carry_their_path() {
        let (config, errors) = parse(
            r#"
            verbose = true

            [ping]
            cont = 3
            wait = -1

            [traceroute]
            numeric = "yes"
            max_hops = 300
            queries = 0
            "#,
        );

        assert_eq!(config.traceroute.max_hops, None);
        assert_eq!(config.traceroute.queries, None);

        assert_eq!(
            errors,
            [
                ".ping.wait: -1: cannot convert float seconds to Duration: value is negative",
                ".ping.cont: unexpected key of type integer",
                ".traceroute.queries: expected a positive integer, found 0",
                ".traceroute.max_hops: 300: out of range integral type conversion attempted",
                ".traceroute.numeric: expected boolean, found string",
                ".verbose: unexpected key of type boolean",
            ]
        );
    }

    #[test]
    fn missing_file_is_skipped() {
        let mut config = Config::default();
        let diag = Diagnostics::new();

        config
            .add_from_path(Path::new("/nonexistent/pingtrace.toml"), &diag)
            .unwrap();

        assert!(diag.into_errors().is_empty());
    }
}
