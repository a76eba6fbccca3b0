// src/lib.rs
//! Small-area survey tables with replicate-weight sampling error.
//!
//! Microdata records are filtered and assigned to categories by a static
//! catalog of indicator definitions, estimated per geography with the
//! replicate-weight method, and collated into one wide table per topical
//! category and geography level.

pub mod aggregate;
pub mod catalog;
pub mod collate;
pub mod config;
pub mod error;
pub mod estimation;
pub mod geography;
pub mod microdata;
pub mod naming;

pub use aggregate::{Aggregator, CellSeries, EstimateCell, EstimationSettings, IndicatorEstimates};
pub use catalog::{
    IndicatorDefinition, StatisticKind, TopicalCategory, Universe, CATALOG_VERSION,
};
pub use collate::{CollatedTable, Collator};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use estimation::{Estimate, ReplicateEstimator, ReplicateVariance};
pub use geography::GeographyLevel;
pub use microdata::{MicrodataSet, MicrodataTable, Record};
pub use naming::{column_name, column_order, MeasureKind};
