use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use sockcheck::config::{CacheConfig, Config, Header, DEFAULT_CACHE_TTL_HOURS};
use sockcheck::{checker, logging, report};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// sockcheck: one-shot parallel TCP/HTTP/ICMP health checker.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sockcheck",
    version,
    about = "One-shot parallel TCP/HTTP/ICMP health checker for a declarative list of sockets.",
    long_about = None
)]
struct Cli {
    /// Socket list: path to a JSON file or an http(s):// URL.
    #[arg(long, env = "SOCKCHECK_SOURCE")]
    source: String,

    /// Extra request header for the remote fetch, as `Name: value`.
    #[arg(long, env = "SOCKCHECK_HEADER")]
    header: Option<String>,

    /// Debug logging on stderr.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Per-test timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Never read or write the socket-list cache.
    #[arg(long = "no-cache", default_value_t = false)]
    no_cache: bool,

    /// Cache directory for remote socket lists.
    #[arg(long = "cache-dir", env = "SOCKCHECK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Maximum age of a cached socket list, in hours.
    #[arg(long = "cache-ttl-hours", default_value_t = DEFAULT_CACHE_TTL_HOURS)]
    cache_ttl_hours: u64,

    /// Write the report as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip the results table.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> Result<Config> {
        let header = self.header.as_deref().map(Header::parse).transpose()?;
        let dir = self.cache_dir.clone().unwrap_or_else(CacheConfig::default_dir);
        Ok(Config {
            source: self.source.clone(),
            header,
            verbose: self.verbose,
            timeout: Duration::from_millis(self.timeout_ms),
            cache: CacheConfig::from_hours(!self.no_cache, dir, self.cache_ttl_hours),
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("sockcheck: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every socket passed.
async fn run(cli: &Cli) -> Result<bool> {
    let config = cli.to_config()?;

    // Ctrl-C cancels in-flight tests; they come back as failures.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let results = checker::run(&config, cancel).await?;

    if !cli.quiet {
        report::print_report_table(&results);
    }
    for line in &results.failures {
        eprintln!("{line}");
    }
    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = report::write_report_json(path, &results) {
            eprintln!("Failed to write JSON to {}: {e:#}", path.display());
        } else if !cli.quiet {
            println!("Wrote JSON report to {}", path.display());
        }
    }
    Ok(results.is_healthy())
}
