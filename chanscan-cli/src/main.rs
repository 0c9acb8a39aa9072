//! ChanScan CLI — scan, single-symbol analysis, universe and cache commands.
//!
//! Commands:
//! - `scan` — filter the universe, analyze every symbol, archive the hits
//! - `analyze <CODE>` — analyze one 6-digit code, optionally archive it
//! - `universe` — fetch (or load from cache) and print today's universe
//! - `cache status` — what the cache holds for today
//! - `cache prune` — remove cache days older than a cutoff

use anyhow::{bail, Context, Result};
use chanscan_core::data::{
    load_universe, CacheManager, MarketDataProvider, SyntheticEngine, SyntheticProvider,
    UnavailableProvider,
};
use chanscan_core::engine::AnalysisEngine;
use chanscan_core::ScanContext;
use chanscan_runner::{
    analyze_symbol, AnalysisOutcome, Analyzer, ResultArchiver, ScanConfig, ScanRequest, Scanner,
    TracingProgress,
};
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "chanscan", about = "ChanScan — A-share buy-point scanner")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run as if today were this date (YYYY-MM-DD).
    #[arg(long, global = true)]
    date: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the filtered universe for recent buy points.
    Scan {
        /// Worker threads (overrides scan.workers).
        #[arg(long)]
        workers: Option<usize>,

        /// Use the built-in synthetic provider and engine.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Skip writing the result archive.
        #[arg(long, default_value_t = false)]
        no_archive: bool,

        /// Re-fetch the universe even if today's snapshot is cached.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Analyze a single stock code.
    Analyze {
        /// Six-digit stock code, e.g. 000001.
        code: String,

        /// Use the built-in synthetic engine.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Write the single-symbol archive.
        #[arg(long, default_value_t = false)]
        archive: bool,
    },
    /// Print today's filtered universe.
    Universe {
        /// Use the built-in synthetic provider.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-fetch even if today's snapshot is cached.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report what the cache holds for today.
    Status,
    /// Remove cache days older than the given number of days.
    Prune {
        /// Keep this many most recent days (today counts as one).
        #[arg(long)]
        keep_days: u32,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    let today = resolve_today(cli.date.as_deref())?;

    match cli.command {
        Commands::Scan {
            workers,
            synthetic,
            no_archive,
            refresh,
        } => run_scan(&config, today, workers, synthetic, no_archive, refresh),
        Commands::Analyze {
            code,
            synthetic,
            archive,
        } => run_analyze(&config, today, &code, synthetic, archive),
        Commands::Universe { synthetic, refresh } => run_universe(&config, today, synthetic, refresh),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config.paths.cache_dir, today),
            CacheAction::Prune { keep_days, confirm } => {
                run_cache_prune(&config.paths.cache_dir, today, keep_days, confirm)
            }
        },
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn resolve_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --date '{s}', expected YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn provider_for(config: &ScanConfig, synthetic: bool) -> Box<dyn MarketDataProvider> {
    if synthetic {
        Box::new(SyntheticProvider::new())
    } else {
        Box::new(UnavailableProvider::new(format!(
            "no {} adapter is linked into this build; rerun with --synthetic",
            config.data.source.display_name()
        )))
    }
}

fn engine_for(config: &ScanConfig, synthetic: bool) -> Result<Arc<dyn AnalysisEngine>> {
    if !synthetic {
        bail!(
            "no analysis engine adapter for data source {} is linked into this build; rerun with --synthetic",
            config.data.source
        );
    }
    Ok(Arc::new(SyntheticEngine::new()))
}

fn context(config: &ScanConfig, today: NaiveDate) -> ScanContext {
    ScanContext::new(today).with_cache(CacheManager::new(&config.paths.cache_dir))
}

fn run_scan(
    config: &ScanConfig,
    today: NaiveDate,
    workers: Option<usize>,
    synthetic: bool,
    no_archive: bool,
    refresh: bool,
) -> Result<()> {
    let ctx = context(config, today);
    let provider = provider_for(config, synthetic);
    let filter = config.universe_filter()?;

    let universe = load_universe(&ctx, provider.as_ref(), &filter, refresh)
        .context("universe stage failed")?;
    if universe.is_empty() {
        println!("Universe is empty for {today} (non-trading day?). Nothing to scan.");
        return Ok(());
    }

    let engine = engine_for(config, synthetic)?;
    let request = ScanRequest::from_config(config, today);
    let analyzer = Analyzer::new(engine, ctx);
    let workers = workers.unwrap_or(config.scan.workers);
    if workers == 0 {
        bail!("--workers must be greater than zero");
    }

    let scanner = Scanner::new(analyzer.clone()).with_workers(workers);
    let report = scanner.run(&universe, &request, &TracingProgress::default());

    let s = &report.summary;
    println!(
        "Scan {today}: attempted {}, succeeded {}, skipped/failed {}, hits {}",
        s.attempted,
        s.succeeded,
        s.skipped_or_failed(),
        s.signal_hits
    );
    println!();
    println!("{:<8} {:<12} {:<6} {:<10} {:<16}", "Code", "Name", "Level", "Type", "Time");
    println!("{}", "-".repeat(56));
    for hit in &report.hits {
        println!(
            "{:<8} {:<12} {:<6} {:<10} {:<16}",
            hit.symbol.code,
            hit.symbol.name,
            hit.level.label(),
            hit.signal.kind,
            hit.signal.time_label(hit.level)
        );
    }

    if no_archive {
        return Ok(());
    }
    let archiver = ResultArchiver::with_html_charts(&config.paths.result_dir)
        .with_rehydration(analyzer, request);
    let paths = archiver
        .archive_scan(&report, today)
        .context("failed to write scan archive")?;
    println!();
    println!("Archive: {}", paths.dir.display());
    println!("Charts saved: {}", paths.charts.len());
    if let Some(log) = &paths.chart_error_log {
        println!("Chart errors: {} (see {})", paths.chart_errors.len(), log.display());
    }
    Ok(())
}

fn run_analyze(
    config: &ScanConfig,
    today: NaiveDate,
    code: &str,
    synthetic: bool,
    archive: bool,
) -> Result<()> {
    let engine = engine_for(config, synthetic)?;
    let request = ScanRequest::from_config(config, today);
    let analyzer = Analyzer::new(engine, context(config, today));

    let analysis = analyze_symbol(&analyzer, code, &request)?;
    match &analysis.outcome {
        AnalysisOutcome::Succeeded { .. } => {}
        AnalysisOutcome::SkippedStale { last_bar } => {
            let last = last_bar.map_or_else(|| "none".to_string(), |d| d.to_string());
            bail!("{code}: data is stale (last bar {last})");
        }
        AnalysisOutcome::Failed { error } => bail!("{code}: analysis failed: {error}"),
    }

    println!(
        "{} {} ({})",
        analysis.full_code,
        analysis.symbol.name,
        analysis.level.label()
    );
    println!();
    for (title, points) in [("Buy points", &analysis.buy_points), ("Sell points", &analysis.sell_points)] {
        println!("{title} ({} total):", points.len());
        for p in points.iter().take(10) {
            let price = p.price.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            println!("  {:<6} {:<16} {price}", p.kind, p.time_label(analysis.level));
        }
    }

    if archive {
        let archiver = ResultArchiver::with_html_charts(&config.paths.result_dir);
        let paths = archiver
            .archive_symbol(&analysis, today)
            .context("failed to write symbol archive")?;
        println!();
        println!("Archive: {}", paths.dir.display());
        if paths.chart.is_none() {
            println!("Chart could not be generated; see chart_errors.log");
        }
    }
    Ok(())
}

fn run_universe(config: &ScanConfig, today: NaiveDate, synthetic: bool, refresh: bool) -> Result<()> {
    let ctx = context(config, today);
    let provider = provider_for(config, synthetic);
    let filter = config.universe_filter()?;
    let universe = load_universe(&ctx, provider.as_ref(), &filter, refresh)
        .context("universe stage failed")?;

    info!(symbols = universe.len(), "universe ready");
    println!("Universe {}: {} symbols", universe.date(), universe.len());
    for symbol in universe.symbols() {
        println!("  {:<10} {}", symbol.full_code(), symbol.name);
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path, today: NaiveDate) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let status = CacheManager::new(cache_dir).status(today)?;

    println!("Cache: {}", cache_dir.display());
    println!("Date: {today}");
    match status.universe_symbols {
        Some(n) => println!("Universe: cached ({n} symbols)"),
        None => println!("Universe: not cached"),
    }
    println!("Analysis records: {}", status.analysis_records);
    if !status.other_days.is_empty() {
        println!();
        println!("Older days on disk (invisible today):");
        for day in &status.other_days {
            println!("  {day}");
        }
    }
    Ok(())
}

/// First day kept when retaining `keep_days` days up to and including `today`.
fn prune_cutoff(today: NaiveDate, keep_days: u32) -> Result<NaiveDate> {
    if keep_days == 0 {
        bail!("--keep-days must be at least 1");
    }
    today
        .checked_sub_days(Days::new(u64::from(keep_days) - 1))
        .with_context(|| format!("--keep-days {keep_days} reaches before the earliest date"))
}

fn run_cache_prune(cache_dir: &Path, today: NaiveDate, keep_days: u32, confirm: bool) -> Result<()> {
    let cutoff = prune_cutoff(today, keep_days)?;
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = CacheManager::new(cache_dir);
    let doomed: Vec<NaiveDate> = cache
        .cached_days()?
        .into_iter()
        .filter(|d| *d < cutoff)
        .collect();

    if doomed.is_empty() {
        println!("No cache days before {cutoff} to remove.");
        return Ok(());
    }
    println!("Found {} cache day(s) before {cutoff}:", doomed.len());
    for day in &doomed {
        println!("  {day}");
    }

    if !confirm {
        println!();
        println!("Dry run — pass --confirm to actually delete.");
        return Ok(());
    }

    let report = cache.prune_before(cutoff)?;
    println!(
        "Done. Removed {} universe file(s) and {} analysis day(s).",
        report.universe_files, report.analysis_days
    );
    Ok(())
}
