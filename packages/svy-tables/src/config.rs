//! Survey and output configuration.
//!
//! Loaded from a TOML file; every section and key is optional and falls back
//! to the ACS PUMS defaults (80 replicates, SDR scale 4/R, one-sided 95% z).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::Universe;
use crate::error::{EngineError, Result};
use crate::estimation::{
    RepMethod, ReplicateVariance, SvyQuantileMethod, VarianceCenter, Z_ONE_SIDED_95,
};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub survey: SurveyConfig,

    /// Weight columns of person records.
    #[serde(default = "WeightDesign::person")]
    pub person: WeightDesign,

    /// Weight columns of household records.
    #[serde(default = "WeightDesign::household")]
    pub household: WeightDesign,

    #[serde(default)]
    pub geography: GeographyConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            survey: SurveyConfig::default(),
            person: WeightDesign::person(),
            household: WeightDesign::household(),
            geography: GeographyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Replication and reporting constants of one survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Replication method used to derive the variance scale (`sdr` or `brr`).
    #[serde(default = "default_method")]
    pub method: String,

    /// Number of replicate weight columns per table.
    #[serde(default = "default_n_replicates")]
    pub n_replicates: usize,

    /// Explicit variance scale; overrides the method's default.
    #[serde(default)]
    pub scale: Option<f64>,

    /// Fay coefficient for `brr`.
    #[serde(default)]
    pub fay_coef: f64,

    /// Variance centering (`full_sample` or `rep_mean`).
    #[serde(default = "default_center")]
    pub center: String,

    /// Quantile multiplying SE into the published margin of error.
    #[serde(default = "default_z_score")]
    pub z_score: f64,

    /// Rule for medians at an exact CDF step (`lower`, `higher`, `middle`, `linear`).
    #[serde(default = "default_median_method")]
    pub median_method: String,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            n_replicates: default_n_replicates(),
            scale: None,
            fay_coef: 0.0,
            center: default_center(),
            z_score: default_z_score(),
            median_method: default_median_method(),
        }
    }
}

fn default_method() -> String {
    "sdr".to_string()
}

fn default_n_replicates() -> usize {
    80
}

fn default_center() -> String {
    "full_sample".to_string()
}

fn default_z_score() -> f64 {
    Z_ONE_SIDED_95
}

fn default_median_method() -> String {
    "lower".to_string()
}

impl SurveyConfig {
    pub fn rep_method(&self) -> Result<RepMethod> {
        RepMethod::from_str(&self.method).ok_or_else(|| {
            EngineError::Configuration(format!(
                "unknown replication method `{}`; use `sdr` or `brr`",
                self.method
            ))
        })
    }

    pub fn variance(&self) -> Result<ReplicateVariance> {
        let center = VarianceCenter::from_str(&self.center).ok_or_else(|| {
            EngineError::Configuration(format!(
                "unknown variance center `{}`; use `full_sample` or `rep_mean`",
                self.center
            ))
        })?;
        let scale = match self.scale {
            Some(s) => s,
            None => self.rep_method()?.scale(self.n_replicates, self.fay_coef),
        };
        Ok(ReplicateVariance::new(scale, center))
    }

    pub fn quantile_method(&self) -> Result<SvyQuantileMethod> {
        SvyQuantileMethod::from_str(&self.median_method).ok_or_else(|| {
            EngineError::Configuration(format!(
                "unknown median method `{}`",
                self.median_method
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_replicates == 0 {
            return Err(EngineError::Configuration(
                "n_replicates must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.fay_coef) {
            return Err(EngineError::Configuration(format!(
                "fay_coef must be in [0, 1), got {}",
                self.fay_coef
            )));
        }
        if let Some(s) = self.scale {
            if !(s.is_finite() && s > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "scale must be positive, got {s}"
                )));
            }
        }
        if !(self.z_score.is_finite() && self.z_score > 0.0) {
            return Err(EngineError::Configuration(format!(
                "z_score must be positive, got {}",
                self.z_score
            )));
        }
        self.variance()?;
        self.quantile_method()?;
        Ok(())
    }
}

/// Primary weight column and replicate weight column prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightDesign {
    pub weight: String,
    pub replicate_prefix: String,
}

impl WeightDesign {
    pub fn person() -> Self {
        Self {
            weight: "PWGTP".to_string(),
            replicate_prefix: "PWGTP".to_string(),
        }
    }

    pub fn household() -> Self {
        Self {
            weight: "WGTP".to_string(),
            replicate_prefix: "WGTP".to_string(),
        }
    }

    /// `<prefix>1 ..= <prefix>n`
    pub fn replicate_columns(&self, n_replicates: usize) -> Vec<String> {
        (1..=n_replicates)
            .map(|r| format!("{}{}", self.replicate_prefix, r))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographyConfig {
    /// Column holding the PUMA code.
    #[serde(default = "default_geography_column")]
    pub column: String,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            column: default_geography_column(),
        }
    }
}

fn default_geography_column() -> String {
    "PUMA".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Emit `{cat}_pct_denom` columns.
    #[serde(default = "default_include_denominator")]
    pub include_denominator: bool,

    /// Round published values to this many decimals.
    #[serde(default)]
    pub round_digits: Option<u32>,

    /// Root folder for `<category>/<category>_<geography>.csv`.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_denominator: default_include_denominator(),
            round_digits: None,
            directory: default_directory(),
        }
    }
}

fn default_include_denominator() -> bool {
    true
}

fn default_directory() -> String {
    ".staging".to_string()
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.survey.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn weight_design(&self, universe: Universe) -> &WeightDesign {
        match universe {
            Universe::Person => &self.person,
            Universe::Household => &self.household,
        }
    }

    /// Default configuration rendered as TOML.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&EngineConfig::default())
            .map_err(|e| EngineError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_acs() {
        let config = EngineConfig::default();
        assert_eq!(config.survey.n_replicates, 80);
        assert_eq!(config.survey.quantile_method().unwrap(), SvyQuantileMethod::Lower);
        let var = config.survey.variance().unwrap();
        assert_relative_eq!(var.scale, 0.05);
        assert_eq!(var.center, VarianceCenter::FullSample);
        assert_eq!(config.person.weight, "PWGTP");
        assert_eq!(config.household.replicate_prefix, "WGTP");
        assert!(config.output.include_denominator);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [survey]
            n_replicates = 4
            z_score = 1.96

            [output]
            include_denominator = false
            round_digits = 2
            "#,
        )
        .unwrap();

        assert_relative_eq!(config.survey.variance().unwrap().scale, 1.0);
        assert_relative_eq!(config.survey.z_score, 1.96);
        assert!(!config.output.include_denominator);
        assert_eq!(config.output.round_digits, Some(2));
        assert_eq!(config.geography.column, "PUMA");
    }

    #[test]
    fn test_scale_override() {
        let config = EngineConfig::from_toml_str("[survey]\nscale = 0.25\n").unwrap();
        assert_relative_eq!(config.survey.variance().unwrap().scale, 0.25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_toml_str("[survey]\nn_replicates = 0\n").is_err());
        assert!(EngineConfig::from_toml_str("[survey]\nmethod = \"bootstrap\"\n").is_err());
        assert!(EngineConfig::from_toml_str("[survey]\nmedian_method = \"mode\"\n").is_err());
    }

    #[test]
    fn test_default_toml_round_trips() {
        let text = EngineConfig::default_toml().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.survey.n_replicates, 80);
        assert_eq!(parsed.person, WeightDesign::person());
    }

    #[test]
    fn test_replicate_columns() {
        let cols = WeightDesign::household().replicate_columns(3);
        assert_eq!(cols, vec!["WGTP1", "WGTP2", "WGTP3"]);
    }
}
