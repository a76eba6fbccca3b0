// src/error.rs

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Replicate weight mismatch: expected {expected} columns named `{prefix}1..`, found {found}"
    )]
    ReplicateCount {
        prefix: String,
        expected: usize,
        found: usize,
    },

    #[error("Missing column `{0}`")]
    MissingColumn(String),

    #[error("Indicator `{indicator}` assigned undeclared category `{label}`")]
    UndeclaredCategory {
        indicator: &'static str,
        label: String,
    },

    #[error("Indicator `{indicator}` failed: {source}")]
    Indicator {
        indicator: &'static str,
        #[source]
        source: Box<EngineError>,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    /// Tag an error with the indicator whose computation raised it.
    pub fn in_indicator(self, indicator: &'static str) -> Self {
        match self {
            already @ EngineError::Indicator { .. } => already,
            other => EngineError::Indicator {
                indicator,
                source: Box::new(other),
            },
        }
    }

    /// Name of the failing indicator, if the error was tagged.
    pub fn indicator(&self) -> Option<&'static str> {
        match self {
            EngineError::Indicator { indicator, .. } => Some(indicator),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
