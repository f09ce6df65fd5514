//! Command-line interface parsing for respcache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the request, cache options and fetcher settings used at startup.

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::Request;

/// Store used when `--store` is not given
pub const DEFAULT_STORE: &str = "memory";

/// Entry timeout in seconds used when `--timeout` is not given
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A `--query` argument is not of the form KEY=VALUE
    #[error("Invalid query parameter: '{0}'. Expected KEY=VALUE")]
    InvalidQuery(String),

    /// The base URL is not an http(s) URL
    #[error("Invalid base URL: '{0}'. Expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
}

/// respcache - GET a URL through a response cache
#[derive(Parser, Debug)]
#[command(name = "respcache")]
#[command(about = "Fetch an HTTP resource through a local response cache")]
#[command(version)]
pub struct Cli {
    /// Request path, resolved against the base URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Base URL of the upstream service
    #[arg(long, env = "RESPCACHE_BASE_URL", value_name = "URL")]
    pub base_url: String,

    /// Query parameter to append, may be repeated
    ///
    /// Examples:
    ///   respcache /forecast --query lat=49.27 --query lon=-123.15
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Storage backend: memory, file or memcached
    #[arg(long, default_value = DEFAULT_STORE)]
    pub store: String,

    /// Seconds an entry stays fresh when the response sets no max-age
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,

    /// Directory for the file store, or host:port for memcached
    #[arg(long, value_name = "PATH_OR_ADDR")]
    pub location: Option<String>,

    /// Seconds to wait for the upstream before giving up
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub request_timeout: u64,

    /// Print the status code and where the response came from before the body
    #[arg(long)]
    pub include_status: bool,

    /// Silence cache log messages
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also log cache hits, misses and fallbacks
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub request: Request,
    pub base_url: String,
    pub store: String,
    pub timeout: Duration,
    pub location: Option<String>,
    pub request_timeout: Duration,
    pub include_status: bool,
    pub quiet: bool,
    pub verbose: bool,
}

/// Parses one `KEY=VALUE` argument
///
/// # Returns
/// * `Ok((key, value))`; the value may be empty, the key may not
/// * `Err(CliError::InvalidQuery)` otherwise
pub fn parse_query_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidQuery(s.to_string())),
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a query parameter or the base URL is malformed
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if !(cli.base_url.starts_with("http://") || cli.base_url.starts_with("https://")) {
            return Err(CliError::InvalidBaseUrl(cli.base_url.clone()));
        }

        let mut request = Request::new(cli.path.clone());
        for arg in &cli.query {
            let (key, value) = parse_query_arg(arg)?;
            request = request.query(key, value);
        }

        Ok(StartupConfig {
            request,
            base_url: cli.base_url.clone(),
            store: cli.store.clone(),
            timeout: Duration::from_secs(cli.timeout),
            location: cli.location.clone(),
            request_timeout: Duration::from_secs(cli.request_timeout),
            include_status: cli.include_status,
            quiet: cli.quiet,
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["respcache", "--base-url", "http://example.test"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_parse_query_arg() {
        assert_eq!(
            parse_query_arg("lat=49.27").unwrap(),
            ("lat".to_string(), "49.27".to_string())
        );
        assert_eq!(
            parse_query_arg("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert_eq!(
            parse_query_arg("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_parse_query_arg_invalid() {
        for bad in ["novalue", "=value", ""] {
            let err = parse_query_arg(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid query parameter"));
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&["/beaches"]);
        assert_eq!(cli.path, "/beaches");
        assert_eq!(cli.store, DEFAULT_STORE);
        assert_eq!(cli.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(cli.location.is_none());
        assert!(cli.query.is_empty());
        assert!(!cli.quiet);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_repeated_query() {
        let cli = parse(&["/forecast", "-q", "lat=1", "--query", "lon=2"]);
        assert_eq!(cli.query, vec!["lat=1", "lon=2"]);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from([
            "respcache",
            "--base-url",
            "http://example.test",
            "/x",
            "--quiet",
            "--verbose",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_startup_config_from_cli() {
        let cli = parse(&[
            "/Forecast",
            "--query",
            "lat=1",
            "--store",
            "file",
            "--timeout",
            "600",
            "--location",
            "/tmp/respcache-test",
        ]);
        let config = StartupConfig::from_cli(&cli).unwrap();

        assert_eq!(config.request.logical_key(), "/forecast?lat=1");
        assert_eq!(config.store, "file");
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.location.as_deref(), Some("/tmp/respcache-test"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_startup_config_rejects_bad_query() {
        let cli = parse(&["/x", "--query", "oops"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_startup_config_rejects_non_http_base_url() {
        let cli = Cli::parse_from(["respcache", "--base-url", "ftp://example.test", "/x"]);
        assert!(matches!(
            StartupConfig::from_cli(&cli),
            Err(CliError::InvalidBaseUrl(_))
        ));
    }
}
