// src/collate.rs
//! Merge every indicator of a topical category into one wide table per geography level

use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span};

use crate::aggregate::{Aggregator, IndicatorEstimates};
use crate::catalog::{IndicatorDefinition, TopicalCategory};
use crate::error::{EngineError, Result};
use crate::geography::GeographyLevel;

/// Wide table: one row per geography key, indicator columns in catalog order.
#[derive(Debug, Clone)]
pub struct CollatedTable {
    pub category: TopicalCategory,
    pub level: GeographyLevel,
    pub geographies: Vec<String>,
    pub columns: Vec<(String, Vec<Option<f64>>)>,
}

impl CollatedTable {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Value at (`column`, `geography`); `None` for empty cells too.
    pub fn value(&self, column: &str, geography: &str) -> Option<f64> {
        let row = self.geographies.iter().position(|g| g == geography)?;
        self.column(column)?[row]
    }

    /// Geography column first, named after the level.
    pub fn to_dataframe(&self, round_digits: Option<u32>) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Column::new(self.level.as_str().into(), self.geographies.clone()));
        for (name, values) in &self.columns {
            let values: Vec<Option<f64>> = match round_digits {
                Some(digits) => values.iter().map(|v| v.map(|v| round_to(v, digits))).collect(),
                None => values.clone(),
            };
            columns.push(Column::new(name.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Writes `<output_dir>/<category>/<category>_<geography>.csv`.
    pub fn write_csv(&self, output_dir: &Path, round_digits: Option<u32>) -> Result<PathBuf> {
        let dir = output_dir.join(self.category.as_str());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_{}.csv", self.category, self.level));

        let mut df = self.to_dataframe(round_digits)?;
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "table written"
        );
        Ok(path)
    }
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Runs the indicators of a category in parallel and joins them on geography.
pub struct Collator<'a> {
    aggregator: &'a Aggregator<'a>,
    include_denominator: bool,
}

impl<'a> Collator<'a> {
    pub fn new(aggregator: &'a Aggregator<'a>, include_denominator: bool) -> Self {
        Self {
            aggregator,
            include_denominator,
        }
    }

    pub fn collate(&self, category: TopicalCategory) -> Result<CollatedTable> {
        self.collate_indicators(category, category.indicators())
    }

    /// Any failing indicator fails the table, tagged with its name.
    pub fn collate_indicators(
        &self,
        category: TopicalCategory,
        definitions: &[IndicatorDefinition],
    ) -> Result<CollatedTable> {
        let level = self.aggregator.level();
        let span = info_span!("collate", category = %category, geography = %level);
        let _guard = span.enter();
        let start = Instant::now();

        let results: Vec<IndicatorEstimates> = definitions
            .par_iter()
            .map(|def| {
                self.aggregator
                    .aggregate(def)
                    .map_err(|e| e.in_indicator(def.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let table = self.join(category, level, &results)?;
        info!(
            indicators = results.len(),
            geographies = table.geographies.len(),
            columns = table.columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "category collated"
        );
        Ok(table)
    }

    fn join(
        &self,
        category: TopicalCategory,
        level: GeographyLevel,
        results: &[IndicatorEstimates],
    ) -> Result<CollatedTable> {
        let geographies: Vec<String> = results
            .iter()
            .flat_map(|r| r.geographies.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<&str, usize> = geographies
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for result in results {
            let rows: Vec<usize> = result
                .geographies
                .iter()
                .map(|g| row_of[g.as_str()])
                .collect();
            for (name, values) in result.columns(self.include_denominator) {
                if !seen.insert(name.clone()) {
                    return Err(EngineError::Configuration(format!(
                        "column `{}` of indicator `{}` is already published",
                        name, result.indicator
                    )));
                }
                let mut joined = vec![None; geographies.len()];
                for (value, &row) in values.into_iter().zip(&rows) {
                    joined[row] = value;
                }
                columns.push((name, joined));
            }
        }

        Ok(CollatedTable {
            category,
            level,
            geographies,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EstimationSettings;
    use crate::catalog::{StatisticKind, Universe};
    use crate::config::EngineConfig;
    use crate::estimation::{ReplicateVariance, SvyQuantileMethod, VarianceCenter, Z_ONE_SIDED_95};
    use crate::microdata::tests::config_with_reps;
    use crate::microdata::{MicrodataSet, MicrodataTable, Record};
    use approx::assert_relative_eq;

    fn letter_assign(record: &Record<'_>) -> Option<&'static str> {
        match record.text("LETTER")? {
            "A" => Some("A"),
            "B" => Some("B"),
            _ => None,
        }
    }

    fn every_record(_: &Record<'_>) -> Option<&'static str> {
        Some("all")
    }

    fn stray_assign(_: &Record<'_>) -> Option<&'static str> {
        Some("Z")
    }

    fn indicator(
        name: &'static str,
        categories: &'static [&'static str],
        assign: crate::catalog::AssignFn,
    ) -> IndicatorDefinition {
        IndicatorDefinition {
            name,
            universe: Universe::Person,
            statistic: StatisticKind::Count,
            categories,
            assign,
            denominator: None,
            crosstab: None,
            attributes: &[],
        }
    }

    fn data() -> MicrodataSet {
        let factors = [0.9, 1.1, 0.9, 1.1];
        let rep = |r: usize| vec![10.0 * factors[r]; 5];
        let frame = df!(
            "PUMA" => [4101i64, 4101, 4101, 4101, 4201],
            "LETTER" => ["A", "A", "B", "B", "A"],
            "PWGTP" => [10.0; 5],
            "PWGTP1" => rep(0),
            "PWGTP2" => rep(1),
            "PWGTP3" => rep(2),
            "PWGTP4" => rep(3),
        )
        .unwrap();
        let config = config_with_reps(4);
        let person = MicrodataTable::from_frame(&frame, Universe::Person, &config).unwrap();
        MicrodataSet {
            person: Some(person),
            household: None,
        }
    }

    fn settings() -> EstimationSettings {
        EstimationSettings {
            variance: ReplicateVariance::new(1.0, VarianceCenter::FullSample),
            quantile_method: SvyQuantileMethod::default(),
            z_score: Z_ONE_SIDED_95,
        }
    }

    #[test]
    fn test_collate_joins_in_order() {
        let data = data();
        let agg = Aggregator::new(&data, GeographyLevel::Borough, settings());
        let collator = Collator::new(&agg, true);
        let defs = [
            indicator("everyone", &["all"], every_record),
            indicator("letters", &["A", "B"], letter_assign),
        ];
        let table = collator.collate_indicators(TopicalCategory::Demographics, &defs).unwrap();

        assert_eq!(table.geographies, vec!["BX", "MN"]);
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(
            &names[..6],
            &[
                "all_count",
                "all_count_moe",
                "all_count_cv",
                "all_pct",
                "all_pct_moe",
                "all_pct_denom",
            ]
        );
        assert_eq!(names[6], "A_count");
        assert_eq!(names.len(), 18);

        assert_relative_eq!(table.value("A_count", "MN").unwrap(), 20.0);
        assert_relative_eq!(
            table.value("A_count_moe", "MN").unwrap(),
            4.0 * Z_ONE_SIDED_95,
            epsilon = 1e-9
        );
        assert_relative_eq!(table.value("A_pct", "MN").unwrap(), 0.5);
        assert_relative_eq!(table.value("A_pct_denom", "MN").unwrap(), 40.0);
        assert_relative_eq!(table.value("all_count", "BX").unwrap(), 10.0);
        assert_eq!(table.value("B_count", "BX"), Some(0.0));
        assert_eq!(table.value("B_count_cv", "BX"), None);

        // Unfiltered categories add up to the population
        for geo in ["BX", "MN"] {
            let total = table.value("all_count", geo).unwrap();
            let parts = table.value("A_count", geo).unwrap() + table.value("B_count", geo).unwrap();
            assert_relative_eq!(total, parts);
        }
    }

    #[test]
    fn test_boroughs_add_up_to_citywide() {
        let frame = df!(
            "PUMA" => [4101i64, 4201, 3701, 4503],
            "PWGTP" => [10.0, 20.0, 30.0, 40.0],
            "PWGTP1" => [11.0, 18.0, 33.0, 36.0],
            "PWGTP2" => [9.0, 22.0, 27.0, 44.0],
        )
        .unwrap();
        let config = config_with_reps(2);
        let person = MicrodataTable::from_frame(&frame, Universe::Person, &config).unwrap();
        let data = MicrodataSet {
            person: Some(person),
            household: None,
        };
        let defs = [indicator("everyone", &["all"], every_record)];
        let table_at = |level: GeographyLevel| {
            let agg = Aggregator::new(&data, level, settings());
            Collator::new(&agg, true)
                .collate_indicators(TopicalCategory::Demographics, &defs)
                .unwrap()
        };

        let city = table_at(GeographyLevel::Citywide);
        let boroughs = table_at(GeographyLevel::Borough);
        let pumas = table_at(GeographyLevel::Puma);

        let citywide = city.value("all_count", "citywide").unwrap();
        assert_relative_eq!(citywide, 70.0);
        let by_borough: f64 = boroughs
            .geographies
            .iter()
            .map(|g| boroughs.value("all_count", g).unwrap())
            .sum();
        assert_relative_eq!(citywide, by_borough);
        assert_eq!(pumas.geographies, vec!["04101", "04201", "04503"]);
    }

    #[test]
    fn test_failing_indicator_is_tagged() {
        let data = data();
        let agg = Aggregator::new(&data, GeographyLevel::Citywide, settings());
        let collator = Collator::new(&agg, true);
        let defs = [
            indicator("letters", &["A", "B"], letter_assign),
            indicator("broken", &["A"], stray_assign),
        ];
        let err = collator
            .collate_indicators(TopicalCategory::Demographics, &defs)
            .unwrap_err();
        assert_eq!(err.indicator(), Some("broken"));
        assert!(matches!(
            err,
            EngineError::Indicator { source, .. }
                if matches!(*source, EngineError::UndeclaredCategory { .. })
        ));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let data = data();
        let agg = Aggregator::new(&data, GeographyLevel::Citywide, settings());
        let collator = Collator::new(&agg, true);
        let defs = [
            indicator("letters", &["A", "B"], letter_assign),
            indicator("letters_again", &["A", "B"], letter_assign),
        ];
        let err = collator
            .collate_indicators(TopicalCategory::Demographics, &defs)
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_write_csv() {
        let data = data();
        let agg = Aggregator::new(&data, GeographyLevel::Citywide, settings());
        let collator = Collator::new(&agg, false);
        let defs = [indicator("letters", &["A", "B"], letter_assign)];
        let table = collator.collate_indicators(TopicalCategory::Economics, &defs).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = table.write_csv(dir.path(), Some(2)).unwrap();
        assert_eq!(path, dir.path().join("economics").join("economics_citywide.csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "citywide,A_count,A_count_moe,A_count_cv,A_pct,A_pct_moe,\
             B_count,B_count_moe,B_count_cv,B_pct,B_pct_moe"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("citywide,30"));
    }

    #[test]
    fn test_demographics_catalog_end_to_end() {
        let frame = df!(
            "PUMA" => [4101i64, 4101, 4201, 4201],
            "AGEP" => [4i64, 30, 70, 45],
            "HISP" => [
                "Not Spanish/Hispanic/Latino",
                "Mexican",
                "Not Spanish/Hispanic/Latino",
                "Not Spanish/Hispanic/Latino",
            ],
            "RAC1P" => [
                "White alone",
                "White alone",
                "Asian alone",
                "Black or African American alone",
            ],
            "ENG" => [None, Some("Not well"), Some("Very well"), None],
            "NATIVITY" => ["Native", "Foreign born", "Foreign born", "Native"],
            "PWGTP" => [10.0, 20.0, 30.0, 40.0],
            "PWGTP1" => [11.0, 18.0, 33.0, 36.0],
            "PWGTP2" => [9.0, 22.0, 27.0, 44.0],
        )
        .unwrap();
        let config = config_with_reps(2);
        let person = MicrodataTable::from_frame(&frame, Universe::Person, &config).unwrap();
        let data = MicrodataSet {
            person: Some(person),
            household: None,
        };
        let config = EngineConfig::default();
        let settings = EstimationSettings::from_config(&config_with_reps(2).survey).unwrap();
        let agg = Aggregator::new(&data, GeographyLevel::Citywide, settings);
        let table = Collator::new(&agg, config.output.include_denominator)
            .collate(TopicalCategory::Demographics)
            .unwrap();

        assert_relative_eq!(table.value("total_pop_count", "citywide").unwrap(), 100.0);
        assert_relative_eq!(table.value("hsp_count", "citywide").unwrap(), 20.0);
        assert_relative_eq!(table.value("total_pop_wnh_count", "citywide").unwrap(), 10.0);
        // The four-year-old is outside the LEP base
        assert_relative_eq!(table.value("lep_pct_denom", "citywide").unwrap(), 90.0);
        assert_relative_eq!(table.value("age_p5pl_count", "citywide").unwrap(), 90.0);
        assert_relative_eq!(table.value("age_p5pl_pct", "citywide").unwrap(), 1.0);
        assert_relative_eq!(table.value("fb_count", "citywide").unwrap(), 50.0);
        assert_relative_eq!(table.value("age_median_median", "citywide").unwrap(), 45.0);

        let race_sum: f64 = ["anh", "bnh", "hsp", "onh", "wnh"]
            .iter()
            .map(|r| table.value(&format!("{r}_count"), "citywide").unwrap())
            .sum();
        assert_relative_eq!(race_sum, 100.0);
    }
}
