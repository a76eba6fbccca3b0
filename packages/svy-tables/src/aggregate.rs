// src/aggregate.rs
//! Per-indicator aggregation: filter, assign, estimate per category and crosstab

use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::catalog::{IndicatorDefinition, StatisticKind, Universe};
use crate::config::SurveyConfig;
use crate::error::{EngineError, Result};
use crate::estimation::{
    DomainMeans, Estimate, ReplicateEstimator, ReplicateVariance, SvyQuantileMethod,
};
use crate::geography::{GeographyIndex, GeographyLevel};
use crate::microdata::{MicrodataSet, MicrodataTable};
use crate::naming::{column_blocks, column_name, ColumnBlock, MeasureKind, Statistic};

/// Replication and reporting constants shared by every indicator of a run
#[derive(Debug, Clone, Copy)]
pub struct EstimationSettings {
    pub variance: ReplicateVariance,
    pub quantile_method: SvyQuantileMethod,
    pub z_score: f64,
}

impl EstimationSettings {
    pub fn from_config(survey: &SurveyConfig) -> Result<Self> {
        survey.validate()?;
        Ok(Self {
            variance: survey.variance()?,
            quantile_method: survey.quantile_method()?,
            z_score: survey.z_score,
        })
    }
}

/// Published measures of one (geography, indicator, category[, crosstab]) cell.
///
/// Sampling-error fields are `None`, never zero, when nothing supports them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EstimateCell {
    pub estimate: Option<f64>,
    pub standard_error: Option<f64>,
    pub coefficient_of_variation: Option<f64>,
    pub margin_of_error: Option<f64>,
    pub denominator: Option<f64>,
}

impl EstimateCell {
    fn from_estimate(est: Estimate, z: f64) -> Self {
        Self {
            estimate: est.value,
            standard_error: est.se,
            coefficient_of_variation: est.cv(),
            margin_of_error: est.moe(z),
            denominator: None,
        }
    }

    /// A zero count carries no error measures.
    pub fn count(est: Estimate, z: f64) -> Self {
        let est = if est.value == Some(0.0) {
            Estimate::new(0.0, None)
        } else {
            est
        };
        Self::from_estimate(est, z)
    }

    /// Share of `denominator`; undefined when the denominator has no weight.
    pub fn fraction(est: Estimate, denominator: f64, z: f64) -> Self {
        if denominator <= 0.0 {
            return Self {
                denominator: Some(0.0),
                ..Self::default()
            };
        }
        let est = match est.value {
            Some(v) if v == 0.0 => Estimate::new(0.0, None),
            _ => est,
        };
        Self {
            denominator: Some(denominator),
            ..Self::from_estimate(est, z)
        }
    }

    pub fn median(est: Estimate, z: f64) -> Self {
        Self::from_estimate(est, z)
    }

    pub fn value(&self, kind: MeasureKind) -> Option<f64> {
        match kind {
            MeasureKind::Count | MeasureKind::Pct | MeasureKind::Median => self.estimate,
            MeasureKind::CountMoe | MeasureKind::PctMoe | MeasureKind::MedianMoe => {
                self.margin_of_error
            }
            MeasureKind::CountCv | MeasureKind::MedianCv => self.coefficient_of_variation,
            MeasureKind::PctDenom => self.denominator,
        }
    }
}

/// One column block with a cell per geography
#[derive(Debug, Clone)]
pub struct CellSeries {
    pub block: ColumnBlock,
    pub cells: Vec<EstimateCell>,
}

/// Geography-indexed result of one indicator, blocks in publication order
#[derive(Debug, Clone)]
pub struct IndicatorEstimates {
    pub indicator: &'static str,
    pub geographies: Vec<String>,
    pub series: Vec<CellSeries>,
}

impl IndicatorEstimates {
    pub fn columns(&self, include_denominator: bool) -> Vec<(String, Vec<Option<f64>>)> {
        let mut columns = Vec::new();
        for series in &self.series {
            let block = &series.block;
            for &kind in block.statistic.measures(include_denominator) {
                columns.push((
                    column_name(block.category, block.crosstab, kind),
                    series.cells.iter().map(|cell| cell.value(kind)).collect(),
                ));
            }
        }
        columns
    }

    pub fn cell(
        &self,
        category: &str,
        crosstab: Option<&str>,
        statistic: Statistic,
        geography: &str,
    ) -> Option<&EstimateCell> {
        let g = self.geographies.iter().position(|k| k == geography)?;
        self.series
            .iter()
            .find(|s| {
                s.block.category == category
                    && s.block.crosstab == crosstab
                    && s.block.statistic == statistic
            })
            .map(|s| &s.cells[g])
    }
}

/// Per-row category and crosstab positions of one indicator
struct Assignment<'g> {
    geo: &'g GeographyIndex,
    category: Vec<Option<usize>>,
    crosstab: Vec<Option<usize>>,
    n_categories: usize,
    n_crosstab: usize,
}

impl Assignment<'_> {
    fn n_geo(&self) -> usize {
        self.geo.len()
    }

    /// Domain of a (geography, category[, crosstab]) count or median.
    fn cell_domain(&self, g: usize, c: usize, x: Option<usize>) -> usize {
        let gc = g * self.n_categories + c;
        match x {
            Some(x) => gc * self.n_crosstab + x,
            None => gc,
        }
    }

    /// Domain of a (geography[, crosstab]) fraction base.
    fn base_domain(&self, g: usize, x: Option<usize>) -> usize {
        match x {
            Some(x) => g * self.n_crosstab + x,
            None => g,
        }
    }

    fn cell_ids(&self, by_crosstab: bool) -> (Vec<u32>, usize) {
        let ids = (0..self.category.len())
            .map(|i| match (self.category[i], by_crosstab, self.crosstab[i]) {
                (Some(c), false, _) => self.cell_domain(self.geo.ids[i] as usize, c, None) as u32,
                (Some(c), true, Some(x)) => {
                    self.cell_domain(self.geo.ids[i] as usize, c, Some(x)) as u32
                }
                _ => u32::MAX,
            })
            .collect();
        let n = self.n_geo() * self.n_categories * if by_crosstab { self.n_crosstab } else { 1 };
        (ids, n)
    }

    fn base_ids(&self, by_crosstab: bool) -> (Vec<u32>, usize) {
        let ids = (0..self.category.len())
            .map(|i| match (self.category[i], by_crosstab, self.crosstab[i]) {
                (Some(_), false, _) => self.base_domain(self.geo.ids[i] as usize, None) as u32,
                (Some(_), true, Some(x)) => {
                    self.base_domain(self.geo.ids[i] as usize, Some(x)) as u32
                }
                _ => u32::MAX,
            })
            .collect();
        let n = self.n_geo() * if by_crosstab { self.n_crosstab } else { 1 };
        (ids, n)
    }

    fn indicator_of(&self, c: usize) -> Vec<f64> {
        self.category
            .iter()
            .map(|cat| if *cat == Some(c) { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Estimates for every category of every crosstab pass
struct Computed {
    overall: Vec<Vec<EstimateCell>>,
    by_crosstab: Vec<Vec<EstimateCell>>,
}

fn index_table(table: &MicrodataTable, level: GeographyLevel) -> GeographyIndex {
    let index = GeographyIndex::build(level, table.pumas());
    if index.is_empty() {
        warn!(
            universe = %table.universe(),
            geography = %level,
            "no record maps to a geography"
        );
    } else {
        debug!(
            universe = %table.universe(),
            geography = %level,
            keys = index.len(),
            "geography indexed"
        );
    }
    index
}

/// Runs indicator definitions against the microdata at one geography level.
#[derive(Debug)]
pub struct Aggregator<'a> {
    data: &'a MicrodataSet,
    level: GeographyLevel,
    settings: EstimationSettings,
    person_geo: Option<GeographyIndex>,
    household_geo: Option<GeographyIndex>,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        data: &'a MicrodataSet,
        level: GeographyLevel,
        settings: EstimationSettings,
    ) -> Self {
        let person_geo = data.person.as_ref().map(|t| index_table(t, level));
        let household_geo = data.household.as_ref().map(|t| index_table(t, level));
        Self {
            data,
            level,
            settings,
            person_geo,
            household_geo,
        }
    }

    pub fn level(&self) -> GeographyLevel {
        self.level
    }

    fn geography(&self, universe: Universe) -> Result<&GeographyIndex> {
        let geo = match universe {
            Universe::Person => self.person_geo.as_ref(),
            Universe::Household => self.household_geo.as_ref(),
        };
        geo.ok_or_else(|| {
            EngineError::Configuration(format!("no {universe} microdata table supplied"))
        })
    }

    pub fn aggregate(&self, def: &IndicatorDefinition) -> Result<IndicatorEstimates> {
        let span = info_span!("aggregate", indicator = def.name, geography = %self.level);
        let _guard = span.enter();
        let start = Instant::now();

        def.validate()?;
        let table = self.data.table(def.universe)?;
        if let Some(missing) = def.required_attributes().find(|a| !table.has_attribute(a)) {
            return Err(EngineError::MissingColumn(missing.to_string()));
        }
        let geo = self.geography(def.universe)?;

        let (assignment, values) = assign(def, table, geo)?;
        let estimator = ReplicateEstimator::new(
            table.weights(),
            table.rep_weights(),
            self.settings.variance,
        )?
        .with_quantile_method(self.settings.quantile_method);
        debug!(
            rows = estimator.n_rows(),
            n_reps = estimator.n_reps(),
            assigned = assignment.category.iter().filter(|c| c.is_some()).count(),
            "records assigned"
        );

        let has_crosstab = def.crosstab.is_some();
        let mut series = Vec::new();

        match def.statistic {
            StatisticKind::Count => {
                let counts = self.counts(&estimator, &assignment, has_crosstab);
                let fractions = self.fractions(&estimator, &assignment, has_crosstab);
                for block in column_blocks(def) {
                    let source = match block.statistic {
                        Statistic::Fraction => &fractions,
                        _ => &counts,
                    };
                    series.push(collect_series(def, &assignment, source, block));
                }
            }
            StatisticKind::Median { .. } => {
                let medians = self.medians(&estimator, &assignment, &values, has_crosstab);
                for block in column_blocks(def) {
                    series.push(collect_series(def, &assignment, &medians, block));
                }
            }
        }

        info!(
            geographies = geo.len(),
            columns = series.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indicator aggregated"
        );

        Ok(IndicatorEstimates {
            indicator: def.name,
            geographies: geo.keys.clone(),
            series,
        })
    }

    fn counts(
        &self,
        estimator: &ReplicateEstimator<'_>,
        assignment: &Assignment<'_>,
        has_crosstab: bool,
    ) -> Computed {
        let z = self.settings.z_score;
        let ones = vec![1.0; assignment.category.len()];
        let totals = |by_crosstab: bool| -> Vec<EstimateCell> {
            let (ids, n) = assignment.cell_ids(by_crosstab);
            estimator
                .total_by_domain(&ones, &ids, n)
                .into_iter()
                .map(|est| EstimateCell::count(est, z))
                .collect()
        };
        Computed {
            overall: vec![totals(false)],
            by_crosstab: if has_crosstab { vec![totals(true)] } else { Vec::new() },
        }
    }

    /// Weighted mean of the 0/1 category indicator over the assignable base.
    fn fractions(
        &self,
        estimator: &ReplicateEstimator<'_>,
        assignment: &Assignment<'_>,
        has_crosstab: bool,
    ) -> Computed {
        let z = self.settings.z_score;
        let shares = |by_crosstab: bool| -> Vec<Vec<EstimateCell>> {
            let (ids, n) = assignment.base_ids(by_crosstab);
            (0..assignment.n_categories)
                .map(|c| {
                    let y = assignment.indicator_of(c);
                    let DomainMeans {
                        estimates,
                        weight_totals,
                    } = estimator.mean_by_domain(&y, &ids, n);
                    estimates
                        .into_iter()
                        .zip(weight_totals)
                        .map(|(est, denom)| EstimateCell::fraction(est, denom, z))
                        .collect()
                })
                .collect()
        };
        Computed {
            overall: shares(false),
            by_crosstab: if has_crosstab { shares(true) } else { Vec::new() },
        }
    }

    fn medians(
        &self,
        estimator: &ReplicateEstimator<'_>,
        assignment: &Assignment<'_>,
        values: &[f64],
        has_crosstab: bool,
    ) -> Computed {
        let z = self.settings.z_score;
        let medians = |by_crosstab: bool| -> Vec<EstimateCell> {
            let (ids, n) = assignment.cell_ids(by_crosstab);
            estimator
                .median_by_domain(values, &ids, n)
                .into_iter()
                .map(|est| EstimateCell::median(est, z))
                .collect()
        };
        Computed {
            overall: vec![medians(false)],
            by_crosstab: if has_crosstab { vec![medians(true)] } else { Vec::new() },
        }
    }
}

/// Filter and assign every row. Values are NaN outside a median's support.
fn assign<'g>(
    def: &IndicatorDefinition,
    table: &MicrodataTable,
    geo: &'g GeographyIndex,
) -> Result<(Assignment<'g>, Vec<f64>)> {
    let n = table.height();
    let mut category = vec![None; n];
    let mut crosstab = vec![None; n];
    let mut values = Vec::new();
    let value_fn = match def.statistic {
        StatisticKind::Median { value } => {
            values = vec![f64::NAN; n];
            Some(value)
        }
        StatisticKind::Count => None,
    };

    for record in table.records() {
        let i = record.row();
        if geo.ids[i] == u32::MAX || !def.is_eligible(&record) {
            continue;
        }
        category[i] = def.category_index(&record)?;
        if category[i].is_none() {
            continue;
        }
        crosstab[i] = def.crosstab_index(&record)?;
        if let Some(value) = value_fn {
            values[i] = value(&record).unwrap_or(f64::NAN);
        }
    }

    let assignment = Assignment {
        geo,
        category,
        crosstab,
        n_categories: def.categories.len(),
        n_crosstab: def.crosstab.map_or(0, |ct| ct.categories.len()),
    };
    Ok((assignment, values))
}

/// Cells of one block, one per geography.
///
/// Count and median passes hold a single domain vector indexed by category;
/// fraction passes hold one vector per category indexed by base domain.
fn collect_series(
    def: &IndicatorDefinition,
    assignment: &Assignment<'_>,
    computed: &Computed,
    block: ColumnBlock,
) -> CellSeries {
    let c = def
        .categories
        .iter()
        .position(|cat| *cat == block.category)
        .unwrap_or_default();
    let x = block.crosstab.and_then(|value| {
        def.crosstab
            .and_then(|ct| ct.categories.iter().position(|v| *v == value))
    });
    let pass = if x.is_some() {
        &computed.by_crosstab
    } else {
        &computed.overall
    };

    let cells = (0..assignment.n_geo())
        .map(|g| match block.statistic {
            Statistic::Fraction => pass[c][assignment.base_domain(g, x)],
            Statistic::Count | Statistic::Median => pass[0][assignment.cell_domain(g, c, x)],
        })
        .collect();

    CellSeries { block, cells }
}
