//! respcache - GET an HTTP resource through a local response cache
//!
//! Resolves one request, writing the raw body to stdout. Log lines go to stderr.

use std::io::{IsTerminal, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use respcache::cli::{Cli, StartupConfig};
use respcache::{Cache, CachedClient, HttpFetcher, Logger, StoreConfig};

/// Installs a stderr subscriber; `RUST_LOG` applies unless `--verbose` is set
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("respcache=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("respcache=info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

async fn run(config: StartupConfig) -> Result<(), Box<dyn std::error::Error>> {
    let logger = if config.quiet {
        Logger::silent()
    } else {
        Logger::tracing()
    };

    let mut store_config = StoreConfig::with_timeout(config.timeout).logger(logger);
    if let Some(location) = &config.location {
        store_config = store_config.location(location.clone());
    }
    let cache = Cache::new(&config.store, store_config)?;

    let fetcher = HttpFetcher::new(config.base_url.clone()).with_timeout(config.request_timeout);
    let client = CachedClient::new(cache, fetcher);

    let resolved = client.get(&config.request).await?;
    let mut stdout = std::io::stdout().lock();
    if config.include_status {
        writeln!(stdout, "{} {:?}", resolved.response.status, resolved.origin)?;
    }
    stdout.write_all(&resolved.response.body)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
