/*!
 * Orbit Extract CLI - Command Line Interface
 *
 * Plans a bounded extraction from a bucket URL and either prints the plan
 * (--dry-run) or materializes the selected bytes into an output directory.
 */

use clap::{Parser, ValueEnum};
use orbit_extract::{
    backend::{open_store, BucketUrl, StoreOptions},
    config::{ExtractConfig, LogLevel},
    error::{ExtractError, Result, EXIT_SUCCESS},
    extract::{download::key_path, ExtractionPlan, Extractor, FileSequence, Strategy},
    logging,
    stats::{format_bytes, ExtractStats},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "orbit-extract")]
#[command(version, about = "Extract a bounded subset of an object store into local files", long_about = None)]
struct Cli {
    /// Bucket URL with a glob pattern (s3://bucket/data/**/*.csv, file:///srv/logs/*.json)
    #[arg(value_name = "URL")]
    url: String,

    /// Keep the first or last N matching objects
    #[arg(long, value_enum, value_name = "STRATEGY")]
    files_strategy: Option<StrategyArg>,

    /// Number of objects kept by --files-strategy
    #[arg(long, value_name = "N", requires = "files_strategy")]
    files_limit: Option<i64>,

    /// Keep the leading or trailing bytes
    #[arg(long, value_enum, value_name = "STRATEGY")]
    rows_strategy: Option<StrategyArg>,

    /// Byte budget; per object with --files-strategy, for the whole run otherwise
    #[arg(long, value_name = "BYTES", requires = "rows_strategy")]
    rows_limit_bytes: Option<i64>,

    /// Concurrent downloads
    #[arg(short = 'w', long, value_name = "K")]
    workers: Option<usize>,

    /// Keys requested per listing page
    #[arg(long, value_name = "P")]
    page_size: Option<usize>,

    /// Configuration file (TOML)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory receiving the extracted files
    #[arg(short = 'o', long, value_name = "DIR", required_unless_present = "dry_run")]
    output: Option<PathBuf>,

    /// Print the plan without downloading anything
    #[arg(long)]
    dry_run: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// AWS region for s3:// URLs
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Log file path (JSON lines)
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StrategyArg {
    Head,
    Tail,
}

impl From<StrategyArg> for Strategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Head => Strategy::Head,
            StrategyArg::Tail => Strategy::Tail,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

/// JSON report of a materialized run
#[derive(Serialize)]
struct RunReport<'a> {
    url: &'a str,
    output: &'a Path,
    files: Vec<ExtractedFile>,
    stats: ExtractStats,
}

#[derive(Serialize)]
struct ExtractedFile {
    key: String,
    path: PathBuf,
    bytes: u64,
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    // Validate the URL and pattern before touching the network
    let url = BucketUrl::parse(&cli.url)?;
    let store = open_store(&url, &StoreOptions::from(&config)).await?;
    let extractor = Extractor::new(store, &url.pattern, &config)?;

    let cancel = extractor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling extraction");
            cancel.cancel();
        }
    });

    if cli.dry_run {
        let plan = extractor.dry_run().await?;
        return print_plan(&plan, cli.json);
    }

    let output = cli
        .output
        .clone()
        .ok_or_else(|| ExtractError::Config("--output is required without --dry-run".to_string()))?;
    let mut files = extractor.run().await?;
    let copied = copy_all(&mut files, &output, cli.json).await;
    let closed = files.close().await;
    let copied = match (copied, closed) {
        (Ok(copied), Ok(())) => copied,
        (Err(e), Ok(())) => return Err(e),
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), Err(cleanup)) => return Err(e.with_cleanup(cleanup)),
    };

    if cli.json {
        let report = RunReport {
            url: &cli.url,
            output: &output,
            files: copied,
            stats: files.stats().clone(),
        };
        println!("{}", to_json(&report)?);
    } else {
        println!("Extracted {}", files.stats().summary());
    }
    Ok(())
}

/// Merge the config file with command line overrides
fn build_config(cli: &Cli) -> Result<ExtractConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractConfig::from_file(path)?,
        None => ExtractConfig::default(),
    };

    if let Some(strategy) = cli.files_strategy {
        config.policy.files_strategy = strategy.into();
        config.policy.files_limit = cli.files_limit.ok_or_else(|| {
            ExtractError::Config("--files-strategy needs --files-limit".to_string())
        })?;
    }
    if let Some(strategy) = cli.rows_strategy {
        config.policy.rows_strategy = strategy.into();
        config.policy.rows_limit_bytes = cli.rows_limit_bytes.ok_or_else(|| {
            ExtractError::Config("--rows-strategy needs --rows-limit-bytes".to_string())
        })?;
    }
    if let Some(workers) = cli.workers {
        config.download.workers = workers;
    }
    if let Some(page_size) = cli.page_size {
        config.glob.page_size = page_size;
    }
    if cli.region.is_some() {
        config.region = cli.region.clone();
    }
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    Ok(config)
}

/// Copy every file of the sequence under `output`, preserving key paths
async fn copy_all(files: &mut FileSequence, output: &Path, quiet: bool) -> Result<Vec<ExtractedFile>> {
    let mut copied = Vec::new();
    while let Some(file) = files.next().await? {
        let dest = key_path(output, file.key())?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file.path(), &dest).await?;

        if !quiet {
            println!(
                "{:>10}  {:<16}  {}",
                format_bytes(file.bytes),
                file.item.plan.to_string(),
                file.key()
            );
        }
        copied.push(ExtractedFile {
            key: file.key().to_string(),
            path: dest,
            bytes: file.bytes,
        });
    }
    Ok(copied)
}

fn print_plan(plan: &ExtractionPlan, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(plan)?);
        return Ok(());
    }

    for item in &plan.items {
        println!(
            "{:>10}  {:<16}  {}",
            format_bytes(item.object.size),
            item.plan.to_string(),
            item.key()
        );
    }
    println!(
        "{} of {} matching objects selected, {} to fetch{}",
        plan.items.len(),
        plan.matched,
        format_bytes(plan.planned_bytes()),
        if plan.truncated {
            " (listing truncated by glob limits)"
        } else {
            ""
        }
    );
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ExtractError::Io(std::io::Error::other(e)))
}
