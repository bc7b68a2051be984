//! eodlake CLI: historical ingestion from EODHD into a partitioned Parquet lake.
//!
//! Commands:
//! - `prices` fetch daily bars for the ticker file, write year partitions
//! - `retry` rerun only the units recorded in a checkpoint
//! - `fundamentals` store fundamentals documents as JSON
//! - `corporate-actions` dividends or splits, partitioned by year
//! - `macro` one macro indicator for a set of countries
//! - `sync` mirror every local dataset to the configured remote store
//! - `checkpoint show` list the failed units of the last run

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use eodlake_core::data::TickerSource;
use eodlake_core::domain::{Identifier, ResourceKind};
use eodlake_runner::{sync_datasets, IngestConfig, Pipeline, RunSummary};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "config/eodlake.toml";

#[derive(Parser)]
#[command(name = "eodlake", about = "eodlake: EODHD history into a partitioned Parquet lake")]
struct Cli {
    /// TOML config file. Defaults to config/eodlake.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Start date (YYYY-MM-DD). Overrides fetch.start.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Overrides fetch.end; defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Concurrent requests. The rate limit is shared regardless.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip the remote sync after writing.
    #[arg(long, default_value_t = false)]
    no_sync: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily prices for every ticker and write year partitions.
    Prices {
        #[command(flatten)]
        run: RunArgs,

        /// Ticker file. Overrides tickers.file.
        #[arg(long)]
        tickers: Option<PathBuf>,
    },
    /// Rerun only the units in the checkpoint; results are merged into existing partitions.
    Retry {
        /// prices, dividends, splits or fundamentals.
        #[arg(long, default_value = "prices")]
        kind: String,

        /// Fundamentals filter used by the failed run.
        #[arg(long)]
        section: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch fundamentals documents and store them as-is.
    Fundamentals {
        /// EODHD filter, e.g. Financials::Balance_Sheet::quarterly.
        #[arg(long)]
        section: Option<String>,

        /// Ticker file. Overrides tickers.file.
        #[arg(long)]
        tickers: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch dividends or splits and write year partitions.
    CorporateActions {
        /// dividend or split.
        #[arg(long)]
        kind: String,

        /// Ticker file. Overrides tickers.file.
        #[arg(long)]
        tickers: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch one macro indicator for the given countries (ISO-3 codes).
    Macro {
        /// Country code; repeat for several (e.g. --country USA --country DEU).
        #[arg(long = "country", required = true)]
        countries: Vec<String>,

        /// Indicator name, e.g. gdp_current_usd.
        #[arg(long)]
        indicator: String,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Upload every local dataset to the configured remote store.
    Sync,
    /// Checkpoint inspection.
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// List the units that failed in the last run of a kind.
    Show {
        #[arg(long, default_value = "prices")]
        kind: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_json)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Prices { run, tickers } => {
            let pipeline = build_pipeline(config, &run, tickers)?;
            let identifiers = pipeline.load_tickers()?;
            let range = pipeline.config().fetch.range(today());
            report(pipeline.run_prices(&identifiers, range)?)
        }
        Commands::Retry { kind, section, run } => {
            let kind = parse_kind(&kind)?;
            if section.is_some() && kind != ResourceKind::Fundamentals {
                bail!("--section only applies to fundamentals");
            }
            let pipeline = build_pipeline(config, &run, None)?;
            let range = pipeline.config().fetch.range(today());
            report(pipeline.retry(kind, range, section.as_deref())?)
        }
        Commands::Fundamentals {
            section,
            tickers,
            run,
        } => {
            let pipeline = build_pipeline(config, &run, tickers)?;
            let identifiers = pipeline.load_tickers()?;
            report(pipeline.run_fundamentals(&identifiers, section.as_deref())?)
        }
        Commands::CorporateActions { kind, tickers, run } => {
            let kind = match parse_kind(&kind)? {
                k @ (ResourceKind::Dividend | ResourceKind::Split) => k,
                _ => bail!("--kind must be dividend or split"),
            };
            let pipeline = build_pipeline(config, &run, tickers)?;
            let identifiers = pipeline.load_tickers()?;
            let range = pipeline.config().fetch.range(today());
            report(pipeline.run_corporate_actions(&identifiers, range, kind)?)
        }
        Commands::Macro {
            countries,
            indicator,
            run,
        } => {
            let countries = TickerSource::new(None)
                .from_lines(countries.iter().map(String::as_str))
                .context("parsing --country values")?;
            let pipeline = build_pipeline(config, &run, None)?;
            report(pipeline.run_macro(&countries, &indicator)?)
        }
        Commands::Sync => run_sync(&config),
        Commands::Checkpoint {
            action: CheckpointAction::Show { kind },
        } => show_checkpoint(&config, parse_kind(&kind)?),
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    match path {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            IngestConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading config {DEFAULT_CONFIG}"))
        }
        None => {
            tracing::info!("no config file found, using defaults");
            Ok(IngestConfig::default())
        }
    }
}

fn build_pipeline(
    mut config: IngestConfig,
    run: &RunArgs,
    tickers: Option<PathBuf>,
) -> Result<Pipeline> {
    if let Some(start) = run.start {
        config.fetch.start = start;
    }
    if let Some(end) = run.end {
        config.fetch.end = Some(end);
    }
    if let Some(concurrency) = run.concurrency {
        config.fetch.concurrency = concurrency;
    }
    if let Some(file) = tickers {
        config.tickers.file = file;
    }

    let pipeline = Pipeline::from_config(config).context("building pipeline")?;
    Ok(if run.no_sync {
        pipeline.without_store()
    } else {
        pipeline
    })
}

fn parse_kind(name: &str) -> Result<ResourceKind> {
    Ok(match name.trim().to_ascii_lowercase().as_str() {
        "prices" | "eod" | "eod_price" => ResourceKind::EodPrice,
        "fundamentals" => ResourceKind::Fundamentals,
        "dividend" | "dividends" => ResourceKind::Dividend,
        "split" | "splits" => ResourceKind::Split,
        "macro" => ResourceKind::Macro,
        other => bail!(
            "unknown kind '{other}'. Valid: prices, fundamentals, dividend, split, macro"
        ),
    })
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Print the summary; any failed unit, partition or upload exits 1.
fn report(summary: RunSummary) -> Result<()> {
    println!("{summary}");
    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_sync(config: &IngestConfig) -> Result<()> {
    let Some(remote) = &config.remote else {
        bail!("no [remote] section in the config");
    };
    let store = remote.build_store().context("building remote store")?;
    let results = sync_datasets(config, &store)?;

    if results.is_empty() {
        println!("Nothing to sync: no local datasets found.");
        return Ok(());
    }

    println!();
    println!("{:<14} {:>8} {:>8} {:>12}", "Dataset", "Files", "Failed", "Bytes");
    println!("{}", "-".repeat(46));
    let mut failed = 0;
    for (dataset, upload) in &results {
        println!(
            "{:<14} {:>8} {:>8} {:>12}",
            dataset.name,
            upload.uploaded,
            upload.failed.len(),
            upload.bytes
        );
        failed += upload.failed.len();
    }
    for (_, upload) in &results {
        for failure in &upload.failed {
            eprintln!("UPLOAD FAILED: {failure}");
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn show_checkpoint(config: &IngestConfig, kind: ResourceKind) -> Result<()> {
    let store = config.output.checkpoint_for(kind);
    let failed: Vec<Identifier> = store.load()?;

    println!("Checkpoint: {}", store.path().display());
    if failed.is_empty() {
        println!("No failed units.");
        return Ok(());
    }
    println!("Failed units: {}", failed.len());
    for id in &failed {
        println!("  {id}");
    }
    Ok(())
}
