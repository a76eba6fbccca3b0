// src/microdata.rs
//! Microdata tables: weight design extraction and a row view for the catalog rules

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::Universe;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Raw attribute values of one column
#[derive(Debug, Clone)]
pub enum AttributeColumn {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

/// Survey records of one universe with their weight design.
#[derive(Debug, Clone)]
pub struct MicrodataTable {
    universe: Universe,
    weights: Array1<f64>,
    /// [n x R]
    rep_weights: Array2<f64>,
    pumas: Vec<Option<String>>,
    attributes: HashMap<String, AttributeColumn>,
}

impl MicrodataTable {
    pub fn read_csv(path: &Path, universe: Universe, config: &EngineConfig) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        info!(
            universe = %universe,
            path = %path.display(),
            rows = frame.height(),
            "loaded microdata"
        );
        Self::from_frame(&frame, universe, config)
    }

    pub fn from_frame(
        frame: &DataFrame,
        universe: Universe,
        config: &EngineConfig,
    ) -> Result<Self> {
        let design = config.weight_design(universe);
        let n_reps = config.survey.n_replicates;

        let found = count_replicate_columns(frame, &design.replicate_prefix);
        if found != n_reps {
            return Err(EngineError::ReplicateCount {
                prefix: design.replicate_prefix.clone(),
                expected: n_reps,
                found,
            });
        }
        let rep_cols = design.replicate_columns(n_reps);

        let weights = Array1::from(float_values(frame, &design.weight)?);
        let rep_weights = extract_rep_weights_matrix(frame, &rep_cols)?;
        let pumas = text_values(frame, &config.geography.column)?;

        let mut attributes = HashMap::new();
        for column in frame.get_columns() {
            let name = column.name().as_str();
            if name == design.weight || rep_cols.iter().any(|c| c == name) {
                continue;
            }
            attributes.insert(name.to_string(), attribute_column(column)?);
        }

        debug!(
            universe = %universe,
            rows = frame.height(),
            n_reps,
            attributes = attributes.len(),
            "weight design extracted"
        );

        Ok(Self {
            universe,
            weights,
            rep_weights,
            pumas,
            attributes,
        })
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    pub fn height(&self) -> usize {
        self.weights.len()
    }

    pub fn n_reps(&self) -> usize {
        self.rep_weights.ncols()
    }

    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    pub fn rep_weights(&self) -> ArrayView2<'_, f64> {
        self.rep_weights.view()
    }

    pub fn pumas(&self) -> &[Option<String>] {
        &self.pumas
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn record(&self, row: usize) -> Record<'_> {
        Record { table: self, row }
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.height()).map(move |row| self.record(row))
    }
}

/// Read-only view of one row's attributes.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a MicrodataTable,
    row: usize,
}

impl<'a> Record<'a> {
    pub fn row(&self) -> usize {
        self.row
    }

    /// Numeric value; text cells are parsed.
    pub fn num(&self, name: &str) -> Option<f64> {
        match self.table.attributes.get(name)? {
            AttributeColumn::Numeric(values) => values[self.row],
            AttributeColumn::Text(values) => values[self.row].as_deref()?.trim().parse().ok(),
        }
    }

    /// Text value; `None` for numeric columns.
    pub fn text(&self, name: &str) -> Option<&'a str> {
        match self.table.attributes.get(name)? {
            AttributeColumn::Text(values) => values[self.row].as_deref(),
            AttributeColumn::Numeric(_) => None,
        }
    }
}

/// Person and household tables supplied for one run.
#[derive(Debug, Clone, Default)]
pub struct MicrodataSet {
    pub person: Option<MicrodataTable>,
    pub household: Option<MicrodataTable>,
}

impl MicrodataSet {
    pub fn table(&self, universe: Universe) -> Result<&MicrodataTable> {
        let table = match universe {
            Universe::Person => self.person.as_ref(),
            Universe::Household => self.household.as_ref(),
        };
        table.ok_or_else(|| {
            EngineError::Configuration(format!("no {universe} microdata table supplied"))
        })
    }
}

/// Columns named `<prefix><digits>`.
fn count_replicate_columns(frame: &DataFrame, prefix: &str) -> usize {
    frame
        .get_column_names()
        .iter()
        .filter(|name| {
            name.strip_prefix(prefix)
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        })
        .count()
}

fn require<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column> {
    frame
        .column(name)
        .map_err(|_| EngineError::MissingColumn(name.to_string()))
}

/// Weights as f64, nulls read as zero weight.
fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = require(frame, name)?.cast(&DataType::Float64)?;
    Ok(col.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

fn text_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = require(frame, name)?.cast(&DataType::String)?;
    Ok(col.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Replicate weights as an [n x R] matrix
fn extract_rep_weights_matrix(frame: &DataFrame, rep_cols: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::<f64>::zeros((frame.height(), rep_cols.len()));
    for (r, name) in rep_cols.iter().enumerate() {
        let col = require(frame, name)?.cast(&DataType::Float64)?;
        for (i, v) in col.f64()?.into_iter().enumerate() {
            matrix[[i, r]] = v.unwrap_or(0.0);
        }
    }
    Ok(matrix)
}

fn attribute_column(column: &Column) -> Result<AttributeColumn> {
    let dtype = column.dtype();
    if dtype.is_integer() || dtype.is_float() || matches!(dtype, DataType::Boolean) {
        let values = column.cast(&DataType::Float64)?;
        Ok(AttributeColumn::Numeric(values.f64()?.into_iter().collect()))
    } else {
        let values = column.cast(&DataType::String)?;
        Ok(AttributeColumn::Text(
            values.str()?.into_iter().map(|v| v.map(str::to_string)).collect(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::WeightDesign;

    pub(crate) fn config_with_reps(n: usize) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.survey.n_replicates = n;
        config
    }

    fn person_frame() -> DataFrame {
        df!(
            "PUMA" => [4101i64, 4101, 4201, 3604301],
            "AGEP" => [34i64, 70, 3, 45],
            "ENG" => [Some("Well"), None, None, Some("Very well")],
            "PWGTP" => [10.0, 10.0, 10.0, 10.0],
            "PWGTP1" => [9.0, 11.0, 9.0, 11.0],
            "PWGTP2" => [11.0, 9.0, 11.0, 9.0],
        )
        .unwrap()
    }

    #[test]
    fn test_from_frame_extracts_design() {
        let config = config_with_reps(2);
        let table = MicrodataTable::from_frame(&person_frame(), Universe::Person, &config).unwrap();

        assert_eq!(table.height(), 4);
        assert_eq!(table.n_reps(), 2);
        assert_eq!(table.rep_weights()[[1, 0]], 11.0);
        assert_eq!(table.pumas()[3].as_deref(), Some("3604301"));
        assert!(table.has_attribute("AGEP"));
        assert!(!table.has_attribute("PWGTP1"));
    }

    #[test]
    fn test_record_access() {
        let config = config_with_reps(2);
        let table = MicrodataTable::from_frame(&person_frame(), Universe::Person, &config).unwrap();
        let rec = table.record(0);

        assert_eq!(rec.num("AGEP"), Some(34.0));
        assert_eq!(rec.text("ENG"), Some("Well"));
        assert_eq!(rec.text("AGEP"), None);
        assert_eq!(table.record(1).text("ENG"), None);
        assert_eq!(rec.num("MISSING"), None);
    }

    #[test]
    fn test_replicate_count_mismatch() {
        let config = config_with_reps(80);
        let err =
            MicrodataTable::from_frame(&person_frame(), Universe::Person, &config).unwrap_err();
        match err {
            EngineError::ReplicateCount { expected, found, .. } => {
                assert_eq!(expected, 80);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_weight_column() {
        let mut config = config_with_reps(2);
        config.person = WeightDesign {
            weight: "WEIGHT".into(),
            replicate_prefix: "PWGTP".into(),
        };
        let err =
            MicrodataTable::from_frame(&person_frame(), Universe::Person, &config).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn(c) if c == "WEIGHT"));
    }

    #[test]
    fn test_missing_household_table() {
        let set = MicrodataSet::default();
        assert!(matches!(set.table(Universe::Household), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person.csv");
        std::fs::write(
            &path,
            "PUMA,AGEP,PWGTP,PWGTP1,PWGTP2\n4101,30,10,9,11\n4102,40,20,18,22\n",
        )
        .unwrap();

        let config = config_with_reps(2);
        let table = MicrodataTable::read_csv(&path, Universe::Person, &config).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.weights()[1], 20.0);
        assert_eq!(table.record(1).num("AGEP"), Some(40.0));
    }
}
