//! MFD CLI
//!
//! 시간별 ZROP 산출 도구
//! CSV → per-hour zone population tables, input cache, floor-area preparation

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "mfd")]
#[command(about = "Hourly dasymetric interpolation of mobile activity counts", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run the hourly pipeline and write one CSV per hour
    Run {
        /// YAML run configuration
        #[arg(long)]
        config: PathBuf,

        /// Read inputs from a cache built with `mfd cache`
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Narrow the configured hour range (e.g. "7-9" or "13")
        #[arg(long)]
        hours: Option<String>,

        /// Process hours one after another
        #[arg(long, default_value = "false")]
        sequential: bool,

        /// Write the run summary JSON here (overrides output.summary)
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Parse the input CSVs once and write a MsgPack+LZ4 cache
    Cache {
        /// YAML run configuration
        #[arg(long)]
        config: PathBuf,

        /// Output MsgPack+LZ4 file path
        #[arg(long)]
        out: PathBuf,

        /// Schema version
        #[arg(long, default_value = mfd_cli::INPUT_CACHE_SCHEMA)]
        schema_version: String,

        /// Verify cache after building
        #[arg(long, default_value = "false")]
        verify: bool,

        /// Output metadata JSON file
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Estimate floor areas and write the physical surface table with RFA
    FloorArea {
        /// YAML run configuration (column names and calibration)
        #[arg(long)]
        config: PathBuf,

        /// Input parts CSV
        #[arg(long)]
        r#in: PathBuf,

        /// Output surface CSV
        #[arg(long)]
        out: PathBuf,
    },

    /// Validate the configuration and the input tables without running
    Check {
        /// YAML run configuration
        #[arg(long)]
        config: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Run {
            config,
            cache,
            hours,
            sequential,
            summary,
        } => {
            let mut cfg = load_config(&config)?;
            if let Some(text) = hours {
                let range = mfd_core::HourRange::parse(&text)
                    .with_context(|| format!("Invalid hour range: {}", text))?;
                cfg = cfg.with_hours(range);
            }
            if sequential {
                cfg.parallel = false;
            }
            run(cfg, cache.as_deref(), summary)?;
        }

        Commands::Cache {
            config,
            out,
            schema_version,
            verify,
            metadata,
        } => {
            let cfg = load_config(&config)?;
            println!("🔨 Building input cache...");
            println!("   Config: {}", config.display());
            println!("   Hours:  {}", cfg.hours);
            println!("   Output: {}", out.display());
            println!("   Schema: {}", schema_version);

            let meta = mfd_cli::build_input_cache(&cfg, &out, &schema_version)?;

            print_metadata(&meta);

            if verify {
                verify_cache_integrity(&out, &meta.checksum)?;
            }

            if let Some(metadata_path) = metadata {
                save_metadata(&metadata_path, &meta)?;
            }
        }

        Commands::FloorArea { config, r#in, out } => {
            let cfg = load_config(&config)?;
            println!("🔨 Estimating floor areas...");
            println!("   Parts:  {}", r#in.display());
            println!("   Output: {}", out.display());

            let stats = mfd_cli::build_surface_table(&cfg, &r#in, &out)?;

            println!(
                "\n✅ {} parts in {} cells ({} land, {} cells without floor area)",
                stats.parts, stats.cells, stats.land_parts, stats.zero_area_cells
            );
        }

        Commands::Check { config } => {
            let cfg = load_config(&config)?;
            println!("🔍 Checking inputs for hours {}...", cfg.hours);

            let source = mfd_cli::CsvInputSource::new(cfg.delimiter_byte());
            let tables = mfd_core::InputSource::load(&source, &cfg.inputs, cfg.hours)?;
            let prepared = mfd_core::PreparedInputs::prepare(&tables)?;

            println!("   Profiles: {}", tables.profiles.len());
            println!("   Units:    {}", tables.units.len());
            println!("   Cells:    {}", tables.cells.len());
            println!("   Zones:    {}", tables.zones.len());
            println!("   RFA deviations: {}", prepared.rfa_deviations.len());
            println!("\n✅ Inputs are usable");
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default tracing subscriber failed")
}

#[cfg(feature = "cli")]
fn load_config(path: &Path) -> Result<mfd_core::MfdConfig> {
    mfd_core::MfdConfig::from_yaml_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

#[cfg(feature = "cli")]
fn run(
    cfg: mfd_core::MfdConfig,
    cache: Option<&Path>,
    summary_override: Option<PathBuf>,
) -> Result<()> {
    let hours = cfg.hours;
    let summary_path = summary_override.or_else(|| cfg.output.summary.clone());
    let writer = mfd_cli::CsvZoneWriter::from_config(&cfg);
    let mut orchestrator = mfd_core::Orchestrator::new(cfg)?;

    println!("🚀 Running hours {}...", hours);
    let summary = match cache {
        Some(cache_path) => {
            println!("   Inputs: cache {}", cache_path.display());
            let cached = mfd_cli::load_input_cache(cache_path)?;
            let tables = cached.tables_for(hours)?;
            orchestrator.run_tables(tables, &writer)?
        }
        None => {
            println!("   Inputs: CSV");
            let source = mfd_cli::CsvInputSource::new(orchestrator.config().delimiter_byte());
            orchestrator.run(&source, &writer)?
        }
    };

    let meta = mfd_cli::RunMetadata::from_summary(hours, cache, &summary);
    print_run_table(&meta);

    if let Some(path) = summary_path {
        meta.save(&path)?;
        println!("\n📄 Summary saved to: {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn print_run_table(meta: &mfd_cli::RunMetadata) {
    println!(
        "\n{:>4}  {:>7}  {:>9}  {:>9}  {:>7}  {:>6}  output",
        "hour", "zones", "share", "zrop", "missing", "degen"
    );
    for entry in &meta.entries {
        println!(
            "{:>4}  {:>7}  {:>9.6}  {:>9.6}  {:>7}  {:>6}  {}",
            entry.hour,
            entry.zones_written,
            entry.share_total,
            entry.zone_total,
            entry.issues.missing_join_matches(),
            entry.issues.degenerate_groups,
            entry.file.display()
        );
    }

    if meta.cancelled {
        println!("\n⚠️  Cancelled, {} hours skipped", meta.skipped_hours.len());
    } else {
        println!("\n✅ {} hours written", meta.entries.len());
    }
    let total = meta.total_issues();
    if !total.is_clean() {
        println!(
            "   Excluded units: {} (no profile {}, no share {})",
            total.missing_join_matches(),
            total.missing_profile,
            total.missing_share
        );
        println!("   Degenerate cells: {}", total.degenerate_groups);
        println!(
            "   Zone key cast failures: {} keys, {} rows",
            total.key_cast_failures, total.key_cast_rows
        );
        println!("   Uncovered cells: {}", total.uncovered_cells);
    }
    if meta.rfa_deviations > 0 {
        println!("   Cells with RFA sum ≠ 1: {}", meta.rfa_deviations);
    }
}

#[cfg(feature = "cli")]
fn print_metadata(meta: &mfd_cli::CacheMetadata) {
    println!("\n✅ Cache built successfully!");
    println!(
        "   MsgPack size:    {}",
        mfd_cli::human_bytes(meta.original_size)
    );
    println!(
        "   Compressed size: {}",
        mfd_cli::human_bytes(meta.compressed_size)
    );
    println!("   Compression:     {:.1}%", meta.compression_ratio * 100.0);
    println!("   Checksum:        {}", meta.checksum);
    println!("   Created:         {}", meta.created_at);
}

#[cfg(feature = "cli")]
fn verify_cache_integrity(cache_path: &Path, checksum: &str) -> Result<()> {
    println!("\n🔍 Verifying cache integrity...");
    let is_valid = mfd_cli::verify_cache(cache_path, checksum)?;

    if is_valid {
        println!("✅ Cache verification passed");
        Ok(())
    } else {
        anyhow::bail!("❌ Cache verification failed - checksum mismatch!")
    }
}

#[cfg(feature = "cli")]
fn save_metadata(path: &Path, meta: &mfd_cli::CacheMetadata) -> Result<()> {
    let metadata_json = serde_json::to_string_pretty(meta)?;
    std::fs::write(path, metadata_json)
        .with_context(|| format!("Failed to write metadata: {}", path.display()))?;
    println!("\n📄 Metadata saved to: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("mfd CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
