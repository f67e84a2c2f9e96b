//! AquaGuard - Community Water Quality Monitor
//!
//! A CLI over three core computations: deterministic risk tier
//! classification, filtered/sorted/summarized views over sensor readings,
//! and an AI-generated bilingual health risk narrative delegated to an
//! external language model.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input file, rejected reading, analysis unavailable, etc.)
//!   2 - Latest reading's risk tier at or above --fail-on

mod aggregate;
mod analysis;
mod classify;
mod cli;
mod config;
mod models;
mod monitor;
mod report;
mod store;

use analysis::{AnalysisError, AnalysisOrchestrator, HttpBackend, OrchestratorConfig, Verdict};
use anyhow::{Context, Result};
use chrono::Utc;
use classify::{RiskPolicy, ThreeTierPolicy};
use cli::{Args, Language, SortOrderArg, TierArg};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{RiskTier, SensorReading, WaterAnalysis, WaterSource};
use monitor::{Monitor, Refresh};
use store::{NewReading, ReadingStore};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("AquaGuard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .aquaguard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".aquaguard.toml");

    if path.exists() {
        eprintln!("⚠️  .aquaguard.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .aquaguard.toml")?;

    println!("✅ Created .aquaguard.toml with default settings.");
    println!("   Edit it to customize the model, endpoint, and export directory.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .aquaguard.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Load the datasets
    let readings = match args.input {
        Some(ref path) => store::load_readings(path)?,
        None => Vec::new(),
    };
    let sources = match args.sources {
        Some(ref path) => store::load_sources(path)?,
        None => Vec::new(),
    };
    info!(
        "Loaded {} readings and {} sources",
        readings.len(),
        sources.len()
    );

    let mut store = ReadingStore::with_readings(readings);

    // Step 2: Record a manual reading, if given
    if let Some(ref json) = args.add {
        let new: NewReading =
            serde_json::from_str(json).context("Failed to parse the --add record")?;
        let reading = store
            .insert(new)
            .map_err(|e| anyhow::anyhow!("Reading rejected: {}", e))?;
        println!("✅ Recorded reading {} at {}", reading.id, reading.location);
    }

    // Follow mode takes over the terminal until the feed closes
    if args.follow {
        return run_follow(&args, &config, store, sources).await;
    }

    // Step 3: Build the filtered, sorted view
    let snapshot = store.readings();
    let filtered = aggregate::filter_by_date_range(&snapshot, args.from, args.to);
    let filtered = aggregate::filter_by_source(&filtered, args.source_filter());
    let view = aggregate::sort_by(&filtered, args.sort_field(), sort_order(args.order));

    // Step 4: Render the requested view
    if let Some(ref ids) = args.compare {
        let comparisons = aggregate::compare_sources(&snapshot, ids);
        println!("{}", report::generate_comparison_table(&comparisons, &sources));
    } else if args.summary {
        let summary = aggregate::summarize(&view);
        println!("{}", report::generate_summary_text(&summary));
    } else if !args.quiet {
        println!("{}", report::generate_table(&view, &sources));
        println!("   Total records: {}", view.len());
    }

    // Step 5: Export
    if args.export.is_some() {
        let dir = Path::new(&config.export.directory);
        let path = report::write_csv(&view, &sources, dir, Utc::now().date_naive())?;
        println!("📄 Export written to {}", path.display());
    }

    // Step 6: AI analysis of the most recent reading
    if args.analyze {
        run_analysis(&args, &config, &snapshot).await?;
    }

    // Step 7: --fail-on gate on the latest reading's three-tier classification
    if let Some(level) = args.fail_on {
        if let Some(latest) = store.latest() {
            let tier = ThreeTierPolicy.classify(latest);
            if tier >= fail_on_to_tier(level) {
                eprintln!(
                    "\n⛔ Latest reading is {} risk (at or above {:?}). Failing (exit code 2).",
                    tier, level
                );
                return Ok(2);
            }
        }
    }

    Ok(0)
}

/// Request the analysis for the most recent reading and print the verdict.
async fn run_analysis(args: &Args, config: &Config, readings: &[SensorReading]) -> Result<()> {
    println!("🤖 Requesting AI analysis...");
    println!("   Model: {}", config.model.name);
    println!("   Endpoint: {}", config.model.endpoint_url);

    let orchestrator = AnalysisOrchestrator::new(orchestrator_config(args, config));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("Failed to build spinner style"),
    );
    spinner.set_message("Analyzing water quality...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = orchestrator.analyze_latest(readings).await;
    spinner.finish_and_clear();

    match outcome {
        Err(AnalysisError::NoData) => {
            anyhow::bail!("No sensor readings available for analysis")
        }
        Ok(Verdict::Succeeded(analysis)) => {
            print_analysis(&analysis, args.language);
            Ok(())
        }
        Ok(Verdict::FallbackApplied { analysis, reason }) => {
            warn!("Analysis fell back to the conservative narrative: {}", reason);
            println!("⚠️  The model response could not be used; showing the conservative default.");
            print_analysis(&analysis, args.language);
            Ok(())
        }
        Ok(Verdict::Failed { error }) => {
            anyhow::bail!("Analysis unavailable: {}", error)
        }
    }
}

/// Follow the real-time feed on stdin: append each pushed reading, re-tag
/// it, and keep the narrative analysis fresh for the newest reading.
async fn run_follow(
    args: &Args,
    config: &Config,
    store: ReadingStore,
    sources: Vec<WaterSource>,
) -> Result<i32> {
    println!("📡 Following reading feed on stdin (one JSON reading per line; Ctrl-D to stop)");

    let orchestrator: AnalysisOrchestrator<HttpBackend> =
        AnalysisOrchestrator::new(orchestrator_config(args, config));
    let (mut monitor, mut refreshes) = Monitor::new(store, orchestrator);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut feed_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if feed_open => {
                match line.context("Failed to read from the feed")? {
                    Some(line) if !line.trim().is_empty() => {
                        match serde_json::from_str::<SensorReading>(line.trim()) {
                            Ok(reading) => {
                                let name = models::source_name(&sources, reading.source_id);
                                let tier = monitor.ingest(reading);
                                println!("📥 {} -> {} {} risk", name, tier.emoji(), tier);
                            }
                            Err(e) => warn!("Skipping malformed feed record: {}", e),
                        }
                    }
                    Some(_) => {}
                    None => {
                        feed_open = false;
                        // Drain any verdict already delivered before deciding to stop.
                        while let Ok(refresh) = refreshes.try_recv() {
                            if monitor.is_current(&refresh) {
                                print_refresh(&refresh, args.language);
                            }
                        }
                        if !monitor.has_in_flight() {
                            break;
                        }
                    }
                }
            }
            refresh = refreshes.recv() => {
                match refresh {
                    Some(refresh) if monitor.is_current(&refresh) => {
                        print_refresh(&refresh, args.language);
                        if !feed_open {
                            break;
                        }
                    }
                    Some(refresh) => {
                        debug!("Dropping stale verdict for reading {}", refresh.reading_id);
                    }
                    None => break,
                }
            }
        }
    }

    println!(
        "\n✅ Feed closed. {} readings in the working set.",
        monitor.store().len()
    );
    Ok(0)
}

/// Print a finished orchestration refresh from follow mode.
fn print_refresh(refresh: &Refresh, language: Language) {
    match &refresh.verdict {
        Verdict::Succeeded(analysis) => {
            println!(
                "\n🔄 Analysis refreshed for reading {} ({} {} risk)",
                refresh.reading_id,
                refresh.tier.emoji(),
                refresh.tier
            );
            print_analysis(analysis, language);
        }
        Verdict::FallbackApplied { analysis, reason } => {
            println!(
                "\n⚠️  Analysis for reading {} fell back to the conservative default ({})",
                refresh.reading_id, reason
            );
            print_analysis(analysis, language);
        }
        Verdict::Failed { error } => {
            eprintln!(
                "\n❌ Analysis unavailable for reading {}: {}",
                refresh.reading_id, error
            );
        }
    }
}

/// Print the bilingual narrative in the selected language(s).
fn print_analysis(analysis: &WaterAnalysis, language: Language) {
    println!("\n📊 Health Risk Assessment");
    println!(
        "   Risk Level: {} {}",
        analysis.risk_level.emoji(),
        analysis.risk_level.to_string().to_uppercase()
    );

    if matches!(language, Language::En | Language::Both) {
        println!("\n   Potential Causes:\n   {}", analysis.causes_en);
        println!("\n   Recommended Precautions:\n   {}", analysis.precautions_en);
    }
    if matches!(language, Language::Te | Language::Both) {
        println!("\n   సంభావ్య కారణాలు:\n   {}", analysis.causes_te);
        println!("\n   సిఫార్సు చేయబడిన జాగ్రత్తలు:\n   {}", analysis.precautions_te);
    }
}

/// Convert the CLI sort order to the aggregation engine's.
fn sort_order(order: SortOrderArg) -> aggregate::SortOrder {
    match order {
        SortOrderArg::Asc => aggregate::SortOrder::Asc,
        SortOrderArg::Desc => aggregate::SortOrder::Desc,
    }
}

/// Convert TierArg to RiskTier for comparison.
fn fail_on_to_tier(level: TierArg) -> RiskTier {
    match level {
        TierArg::Low => RiskTier::Low,
        TierArg::Medium => RiskTier::Medium,
        TierArg::High => RiskTier::High,
    }
}

/// Assemble the orchestrator configuration from config file and CLI.
fn orchestrator_config(args: &Args, config: &Config) -> OrchestratorConfig {
    OrchestratorConfig {
        endpoint_url: config.model.endpoint_url.clone(),
        api_key: args.api_key.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        max_tokens: config.model.max_tokens,
        timeout_seconds: config.model.timeout_seconds,
    }
}
