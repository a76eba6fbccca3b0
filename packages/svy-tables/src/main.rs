//! svy-tables - replicate-weight small-area tables from survey microdata
//!
//! Exit codes:
//!   0 - every requested (category, geography) table was written
//!   1 - configuration or input error, or at least one table failed

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use svy_tables::{
    Aggregator, Collator, EngineConfig, EstimationSettings, MicrodataSet, MicrodataTable,
    Universe, CATALOG_VERSION,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "svy-tables.toml";

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("svy-tables v{} (catalog {})", env!("CARGO_PKG_VERSION"), CATALOG_VERSION);
    debug!("Arguments: {:?}", args);

    match run(&args) {
        Ok(0) => Ok(()),
        Ok(failed) => {
            error!(failed, "some tables were not produced");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG);
        std::process::exit(1);
    }

    let content = EngineConfig::default_toml()?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", DEFAULT_CONFIG))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG);
    Ok(())
}

/// `RUST_LOG` takes precedence over the verbosity flags.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    if let Some(ref path) = args.config {
        info!("Loading config from: {}", path.display());
        return EngineConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        match EngineConfig::load(default_path) {
            Ok(config) => {
                info!("Loaded default config from {}", DEFAULT_CONFIG);
                return Ok(config);
            }
            Err(e) => warn!("Failed to load {}: {}", DEFAULT_CONFIG, e),
        }
    } else {
        debug!("No config file found, using defaults");
    }
    Ok(EngineConfig::default())
}

fn load_table(
    path: Option<&PathBuf>,
    universe: Universe,
    config: &EngineConfig,
) -> Result<Option<MicrodataTable>> {
    path.map(|p| {
        MicrodataTable::read_csv(p, universe, config)
            .with_context(|| format!("Failed to load {} microdata from {}", universe, p.display()))
    })
    .transpose()
}

/// Publishes every requested pair. Returns the number of pairs that failed.
fn run(args: &Args) -> Result<usize> {
    let start_time = Instant::now();
    let config = load_config(args)?;
    let settings = EstimationSettings::from_config(&config.survey)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));

    let data = MicrodataSet {
        person: load_table(args.person.as_ref(), Universe::Person, &config)?,
        household: load_table(args.household.as_ref(), Universe::Household, &config)?,
    };

    let mut written = 0usize;
    let mut failed = 0usize;
    for level in args.levels() {
        let aggregator = Aggregator::new(&data, level, settings);
        let collator = Collator::new(&aggregator, config.output.include_denominator);

        for category in args.categories() {
            let outcome = collator
                .collate(category)
                .and_then(|table| table.write_csv(&output_dir, config.output.round_digits));
            match outcome {
                Ok(path) => {
                    written += 1;
                    info!(category = %category, geography = %level, "wrote {}", path.display());
                }
                Err(e) => {
                    failed += 1;
                    error!(category = %category, geography = %level, "table failed: {}", e);
                }
            }
        }
    }

    info!(
        written,
        failed,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(failed)
}
