//! REDLINE CLI — download, store management, and cached query commands.
//!
//! Commands:
//! - `download` — fetch OHLCV data from a provider and store as Parquet
//! - `store status` — report stored symbols, date ranges, bar counts
//! - `store clean` — remove series whose sidecar is older than N days
//! - `query` — run SQL over the store through the pooled, cached service

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use redline_core::data::{
    download_symbols, AlphaVantageProvider, CircuitBreaker, FinnhubProvider, Interval,
    MarketDataProvider, ParquetStore, StdoutProgress, StooqProvider, SyntheticProvider,
    YahooProvider,
};
use redline_query::{ParamValue, PolarsFactory, QueryParams, QueryService, RedlineConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "redline",
    about = "REDLINE CLI — market data acquisition and cached analytical queries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderKind {
    Yahoo,
    Stooq,
    AlphaVantage,
    Finnhub,
    Synthetic,
}

#[derive(Subcommand)]
enum Commands {
    /// Download OHLCV data from a provider and store as Parquet.
    Download {
        /// Symbols to download (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Data provider.
        #[arg(long, value_enum, default_value_t = ProviderKind::Yahoo)]
        provider: ProviderKind,

        /// Start date (YYYY-MM-DD). Defaults to 10 years ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Bar interval: daily, weekly, or monthly.
        #[arg(long, default_value = "daily")]
        interval: Interval,

        /// Force re-download even if the store already covers the range.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Store directory. Overrides the config file.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Path to a redline.toml config file (provider keys, store dir).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Store management commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Run SQL over the store through the pooled, cached query service.
    Query {
        /// SQL text; the store is registered as the `bars` table with
        /// `symbol` and `timeframe` partition columns.
        sql: String,

        /// Bound parameters as name=value; referenced as $name in the SQL.
        #[arg(long = "param")]
        params: Vec<String>,

        /// Run the query this many times (repeats demonstrate cache hits).
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        /// Store directory. Overrides the config file.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Path to a redline.toml config file (pool and cache sizing).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report stored symbols, date ranges, and bar counts.
    Status {
        /// Symbols to report on. Defaults to everything in the store.
        symbols: Vec<String>,

        /// Bar interval to report.
        #[arg(long, default_value = "daily")]
        interval: Interval,

        /// Store directory.
        #[arg(long, default_value = "data")]
        store_dir: PathBuf,
    },
    /// Remove series whose sidecar is older than the given number of days.
    Clean {
        /// Remove series last stored more than this many days ago.
        #[arg(long)]
        older_than_days: u64,

        /// Store directory.
        #[arg(long, default_value = "data")]
        store_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            provider,
            start,
            end,
            interval,
            force,
            store_dir,
            config,
        } => run_download(symbols, provider, start, end, interval, force, store_dir, config),
        Commands::Store { action } => match action {
            StoreAction::Status {
                symbols,
                interval,
                store_dir,
            } => run_store_status(symbols, interval, &store_dir),
            StoreAction::Clean {
                older_than_days,
                store_dir,
                confirm,
            } => run_store_clean(&store_dir, older_than_days, confirm),
        },
        Commands::Query {
            sql,
            params,
            repeat,
            store_dir,
            config,
        } => run_query(&sql, &params, repeat, store_dir, config),
    }
}

/// Load the config file if given, else defaults; `--store-dir` wins over both.
fn effective_config(
    config_path: Option<PathBuf>,
    store_dir: Option<PathBuf>,
) -> Result<RedlineConfig> {
    let mut config = match config_path {
        Some(path) => RedlineConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RedlineConfig::default(),
    };
    if let Some(dir) = store_dir {
        config.store.dir = dir;
    }
    Ok(config)
}

/// Resolve the provider once at startup, including API-key checks.
fn build_provider(
    kind: ProviderKind,
    config: &RedlineConfig,
) -> Result<Box<dyn MarketDataProvider>> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider: Box<dyn MarketDataProvider> = match kind {
        ProviderKind::Yahoo => Box::new(YahooProvider::new(breaker)),
        ProviderKind::Stooq => Box::new(StooqProvider::new(breaker)),
        ProviderKind::AlphaVantage => Box::new(AlphaVantageProvider::from_key(
            config.providers.alpha_vantage_key.clone(),
            breaker,
        )?),
        ProviderKind::Finnhub => Box::new(FinnhubProvider::from_key(
            config.providers.finnhub_key.clone(),
            breaker,
        )?),
        ProviderKind::Synthetic => Box::new(SyntheticProvider::new()),
    };
    Ok(provider)
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{text}' (expected YYYY-MM-DD)"))
}

#[allow(clippy::too_many_arguments)]
fn run_download(
    symbols: Vec<String>,
    provider_kind: ProviderKind,
    start: Option<String>,
    end: Option<String>,
    interval: Interval,
    force: bool,
    store_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = effective_config(config_path, store_dir)?;

    let start_date = start
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive() - chrono::Duration::days(365 * 10));

    let end_date = end
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    if end_date < start_date {
        bail!("end date {end_date} precedes start date {start_date}");
    }

    let provider = build_provider(provider_kind, &config)?;
    let store = ParquetStore::new(&config.store.dir);
    let progress = StdoutProgress;

    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    let summary = download_symbols(
        provider.as_ref(),
        &store,
        &sym_refs,
        start_date,
        end_date,
        interval,
        force,
        &progress,
    );

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_store_status(symbols: Vec<String>, interval: Interval, store_dir: &Path) -> Result<()> {
    let store = ParquetStore::new(store_dir);

    let symbols = if symbols.is_empty() {
        store.symbols()?
    } else {
        symbols
    };

    if symbols.is_empty() {
        println!("Store is empty: {}", store_dir.display());
        return Ok(());
    }

    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    for status in store.status(&sym_refs, interval) {
        if status.stored {
            println!(
                "{:<10} {}  {} → {}  ({} bars)",
                status.symbol,
                interval,
                status.start_date.map(|d| d.to_string()).unwrap_or_default(),
                status.end_date.map(|d| d.to_string()).unwrap_or_default(),
                status.bar_count.unwrap_or(0),
            );
        } else {
            println!("{:<10} {}  (not stored)", status.symbol, interval);
        }
    }

    Ok(())
}

fn run_store_clean(store_dir: &Path, older_than_days: u64, confirm: bool) -> Result<()> {
    let store = ParquetStore::new(store_dir);
    let stale = store.stale(older_than_days)?;

    if stale.is_empty() {
        println!("Nothing stored more than {older_than_days} days ago.");
        return Ok(());
    }

    for meta in &stale {
        if confirm {
            store.remove(&meta.symbol, meta.interval)?;
            println!("Removed {} ({})", meta.symbol, meta.interval);
        } else {
            println!(
                "Would remove {} ({}) — last stored {}",
                meta.symbol, meta.interval, meta.stored_at
            );
        }
    }

    if !confirm {
        println!("\nRe-run with --confirm to delete.");
    }

    Ok(())
}

/// Parse `name=value` CLI parameters, inferring scalar types.
fn parse_params(raw: &[String]) -> Result<Option<QueryParams>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let mut params = QueryParams::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("invalid parameter '{entry}' (expected name=value)");
        };
        params.insert(name.to_string(), ParamValue::infer(value));
    }
    Ok(Some(params))
}

fn run_query(
    sql: &str,
    raw_params: &[String],
    repeat: u32,
    store_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = effective_config(config_path, store_dir)?;
    let params = parse_params(raw_params)?;

    let factory = Arc::new(PolarsFactory::new(&config.store.dir));
    let service = QueryService::new(factory, &config);

    for run in 1..=repeat.max(1) {
        let outcome = service.query(sql, params.as_ref())?;
        let provenance = if outcome.from_cache { "cache" } else { "engine" };
        println!(
            "run {run}: {} rows × {} columns ({provenance})",
            outcome.result.num_rows(),
            outcome.result.num_columns(),
        );
        if run == 1 {
            println!("{}", outcome.result.frame());
        }
    }

    let stats = service.cache_stats();
    println!(
        "\ncache: {}/{} entries, ttl {}s",
        stats.size,
        stats.max_size,
        stats.ttl.as_secs()
    );

    service.shutdown();
    Ok(())
}
