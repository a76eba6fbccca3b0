//! Command-line interface argument parsing.

use clap::Parser;
use std::path::PathBuf;
use svy_tables::{GeographyLevel, TopicalCategory};

/// svy-tables - small-area tables with replicate-weight sampling error
///
/// Reads ACS PUMS style person and household extracts and writes one CSV per
/// topical category and geography level.
///
/// Examples:
///   svy-tables --person pums_person.csv --household pums_household.csv
///   svy-tables --person pums_person.csv --category demographics --geography puma
///   svy-tables --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Person-level microdata CSV
    #[arg(long, value_name = "FILE", env = "SVY_TABLES_PERSON")]
    pub person: Option<PathBuf>,

    /// Household-level microdata CSV
    #[arg(long, value_name = "FILE", env = "SVY_TABLES_HOUSEHOLD")]
    pub household: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for svy-tables.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Topical category to publish
    #[arg(long, value_enum, default_value_t = CategoryArg::All)]
    pub category: CategoryArg,

    /// Geography level to publish
    #[arg(long, value_enum, default_value_t = GeographyArg::All)]
    pub geography: GeographyArg,

    /// Root output folder (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default svy-tables.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CategoryArg {
    Demographics,
    Economics,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GeographyArg {
    Citywide,
    Borough,
    Puma,
    All,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }
        if self.person.is_none() && self.household.is_none() {
            return Err("at least one of --person or --household is required".to_string());
        }
        if self.verbose && self.quiet {
            return Err("--verbose and --quiet cannot be used together".to_string());
        }
        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn categories(&self) -> Vec<TopicalCategory> {
        match self.category {
            CategoryArg::Demographics => vec![TopicalCategory::Demographics],
            CategoryArg::Economics => vec![TopicalCategory::Economics],
            CategoryArg::All => TopicalCategory::ALL.to_vec(),
        }
    }

    pub fn levels(&self) -> Vec<GeographyLevel> {
        match self.geography {
            GeographyArg::Citywide => vec![GeographyLevel::Citywide],
            GeographyArg::Borough => vec![GeographyLevel::Borough],
            GeographyArg::Puma => vec![GeographyLevel::Puma],
            GeographyArg::All => GeographyLevel::ALL.to_vec(),
        }
    }
}
