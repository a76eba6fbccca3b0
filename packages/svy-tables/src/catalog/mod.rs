// src/catalog/mod.rs
//! Indicator definitions: categories, assignment rules, denominators and crosstabs
//!
//! Rules are plain functions over a [`Record`]; an assignment returning `None`
//! marks the record "not applicable" for that indicator, which removes it from
//! both numerator and denominator.

pub mod demographics;
pub mod economics;
pub mod race;

use std::collections::HashSet;
use std::fmt;

use crate::error::{EngineError, Result};
use crate::microdata::Record;

pub use demographics::DEMOGRAPHICS;
pub use economics::ECONOMICS;

/// Bumped whenever a definition changes the published columns.
pub const CATALOG_VERSION: &str = "2024.1";

pub type AssignFn = fn(&Record<'_>) -> Option<&'static str>;
pub type FilterFn = fn(&Record<'_>) -> bool;
pub type ValueFn = fn(&Record<'_>) -> Option<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universe {
    Person,
    Household,
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Universe::Person => f.write_str("person"),
            Universe::Household => f.write_str("household"),
        }
    }
}

/// What is published per category.
#[derive(Debug, Clone, Copy)]
pub enum StatisticKind {
    /// Weighted counts plus percentages of the eligible population
    Count,
    /// Weighted median of a value per category
    Median { value: ValueFn },
}

/// Restricts the base population of an indicator
#[derive(Debug, Clone, Copy)]
pub struct DenominatorFilter {
    pub name: &'static str,
    pub keep: FilterFn,
}

/// Secondary breakdown repeated for every category
#[derive(Debug, Clone, Copy)]
pub struct CrosstabDefinition {
    pub name: &'static str,
    pub categories: &'static [&'static str],
    pub assign: AssignFn,
    pub attributes: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct IndicatorDefinition {
    pub name: &'static str,
    pub universe: Universe,
    pub statistic: StatisticKind,
    /// Output order; also the set `assign` may return
    pub categories: &'static [&'static str],
    pub assign: AssignFn,
    pub denominator: Option<DenominatorFilter>,
    pub crosstab: Option<CrosstabDefinition>,
    /// Columns read by `assign`, the filter and the value function
    pub attributes: &'static [&'static str],
}

impl IndicatorDefinition {
    /// Attribute columns of the indicator and its crosstab.
    pub fn required_attributes(&self) -> impl Iterator<Item = &'static str> {
        let crosstab = self.crosstab.map(|c| c.attributes).unwrap_or(&[]);
        self.attributes.iter().chain(crosstab.iter()).copied()
    }

    pub fn is_eligible(&self, record: &Record<'_>) -> bool {
        self.denominator.map_or(true, |d| (d.keep)(record))
    }

    /// Position of the record's category, `None` when not applicable.
    pub fn category_index(&self, record: &Record<'_>) -> Result<Option<usize>> {
        declared_index(self.name, self.categories, (self.assign)(record))
    }

    /// Position of the record's crosstab value.
    pub fn crosstab_index(&self, record: &Record<'_>) -> Result<Option<usize>> {
        match &self.crosstab {
            Some(ct) => declared_index(self.name, ct.categories, (ct.assign)(record)),
            None => Ok(None),
        }
    }

    /// Declaration checks that do not depend on data.
    pub fn validate(&self) -> Result<()> {
        check_labels(self.name, "categories", self.categories)?;
        if let Some(ct) = &self.crosstab {
            check_labels(self.name, ct.name, ct.categories)?;
        }
        Ok(())
    }
}

fn declared_index(
    indicator: &'static str,
    declared: &[&'static str],
    label: Option<&'static str>,
) -> Result<Option<usize>> {
    match label {
        None => Ok(None),
        Some(label) => declared
            .iter()
            .position(|c| *c == label)
            .map(Some)
            .ok_or_else(|| EngineError::UndeclaredCategory {
                indicator,
                label: label.to_string(),
            }),
    }
}

fn check_labels(indicator: &str, what: &str, labels: &[&str]) -> Result<()> {
    if labels.is_empty() {
        return Err(EngineError::Configuration(format!(
            "indicator `{indicator}` declares no {what}"
        )));
    }
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(*label) {
            return Err(EngineError::Configuration(format!(
                "indicator `{indicator}` declares `{label}` twice in {what}"
            )));
        }
    }
    Ok(())
}

/// Group of indicators published together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicalCategory {
    Demographics,
    Economics,
}

impl TopicalCategory {
    pub const ALL: [TopicalCategory; 2] =
        [TopicalCategory::Demographics, TopicalCategory::Economics];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicalCategory::Demographics => "demographics",
            TopicalCategory::Economics => "economics",
        }
    }

    /// Indicators in publication order.
    pub fn indicators(&self) -> &'static [IndicatorDefinition] {
        match self {
            TopicalCategory::Demographics => &DEMOGRAPHICS,
            TopicalCategory::Economics => &ECONOMICS,
        }
    }
}

impl fmt::Display for TopicalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Shared rule helpers. Attributes arrive either as cleaned ACS labels or as
// raw numeric codes, so most rules look at both.

pub(crate) fn age(record: &Record<'_>) -> Option<f64> {
    record.num("AGEP")
}

/// Text label when present, otherwise the numeric code.
pub(crate) enum Coded<'a> {
    Label(&'a str),
    Code(i64),
}

pub(crate) fn coded<'a>(record: &Record<'a>, name: &str) -> Option<Coded<'a>> {
    if let Some(text) = record.text(name) {
        let trimmed = text.trim();
        return match trimmed.parse::<f64>() {
            Ok(v) => Some(Coded::Code(v as i64)),
            Err(_) => Some(Coded::Label(trimmed)),
        };
    }
    record.num(name).map(|v| Coded::Code(v as i64))
}
