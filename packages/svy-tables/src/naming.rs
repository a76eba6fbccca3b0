// src/naming.rs
//! Output column vocabulary and ordering

use crate::catalog::{IndicatorDefinition, StatisticKind};

/// Every published measure has exactly one suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureKind {
    Count,
    CountMoe,
    CountCv,
    Pct,
    PctMoe,
    PctDenom,
    Median,
    MedianMoe,
    MedianCv,
}

impl MeasureKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            MeasureKind::Count => "count",
            MeasureKind::CountMoe => "count_moe",
            MeasureKind::CountCv => "count_cv",
            MeasureKind::Pct => "pct",
            MeasureKind::PctMoe => "pct_moe",
            MeasureKind::PctDenom => "pct_denom",
            MeasureKind::Median => "median",
            MeasureKind::MedianMoe => "median_moe",
            MeasureKind::MedianCv => "median_cv",
        }
    }
}

/// Statistic family of one block of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Count,
    Fraction,
    Median,
}

impl Statistic {
    pub fn measures(&self, include_denominator: bool) -> &'static [MeasureKind] {
        match (self, include_denominator) {
            (Statistic::Count, _) => {
                &[MeasureKind::Count, MeasureKind::CountMoe, MeasureKind::CountCv]
            }
            (Statistic::Fraction, true) => {
                &[MeasureKind::Pct, MeasureKind::PctMoe, MeasureKind::PctDenom]
            }
            (Statistic::Fraction, false) => &[MeasureKind::Pct, MeasureKind::PctMoe],
            (Statistic::Median, _) => {
                &[MeasureKind::Median, MeasureKind::MedianMoe, MeasureKind::MedianCv]
            }
        }
    }
}

/// `{category}[_{crosstab}]_{suffix}`
pub fn column_name(category: &str, crosstab: Option<&str>, kind: MeasureKind) -> String {
    match crosstab {
        Some(ct) => format!("{}_{}_{}", category, ct, kind.suffix()),
        None => format!("{}_{}", category, kind.suffix()),
    }
}

/// One block of columns: a category, optionally within a crosstab value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnBlock {
    pub category: &'static str,
    pub crosstab: Option<&'static str>,
    pub statistic: Statistic,
}

impl ColumnBlock {
    pub fn columns(&self, include_denominator: bool) -> impl Iterator<Item = String> + '_ {
        self.statistic
            .measures(include_denominator)
            .iter()
            .map(move |&kind| column_name(self.category, self.crosstab, kind))
    }
}

fn statistics(def: &IndicatorDefinition) -> &'static [Statistic] {
    match def.statistic {
        StatisticKind::Count => &[Statistic::Count, Statistic::Fraction],
        StatisticKind::Median { .. } => &[Statistic::Median],
    }
}

/// Blocks in publication order: every category overall, then every category
/// per crosstab value.
pub fn column_blocks(def: &IndicatorDefinition) -> Vec<ColumnBlock> {
    let mut blocks = Vec::new();
    for &category in def.categories {
        for &statistic in statistics(def) {
            blocks.push(ColumnBlock {
                category,
                crosstab: None,
                statistic,
            });
        }
    }
    if let Some(ct) = &def.crosstab {
        for &category in def.categories {
            for &value in ct.categories {
                for &statistic in statistics(def) {
                    blocks.push(ColumnBlock {
                        category,
                        crosstab: Some(value),
                        statistic,
                    });
                }
            }
        }
    }
    blocks
}

pub fn column_order(def: &IndicatorDefinition, include_denominator: bool) -> Vec<String> {
    column_blocks(def)
        .iter()
        .flat_map(|block| block.columns(include_denominator).collect::<Vec<_>>())
        .collect()
}
