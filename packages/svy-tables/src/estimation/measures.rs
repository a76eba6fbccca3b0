// src/estimation/measures.rs

/// One-sided 95% standard normal quantile, the published MOE multiplier.
pub const Z_ONE_SIDED_95: f64 = 1.644_853_626_951_472_2;

/// Point estimate with its replicate standard error.
///
/// `value` is `None` when the statistic is undefined (a mean or median with no
/// weight behind it); `se` is `None` whenever the variance cannot be estimated,
/// which is never reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    pub value: Option<f64>,
    pub se: Option<f64>,
}

impl Estimate {
    pub fn new(value: f64, se: Option<f64>) -> Self {
        Self {
            value: Some(value),
            se,
        }
    }

    pub fn undefined() -> Self {
        Self::default()
    }

    /// Coefficient of variation in percent; `None` for a zero estimate.
    pub fn cv(&self) -> Option<f64> {
        match (self.value, self.se) {
            (Some(v), Some(se)) if v != 0.0 => Some(se / v * 100.0),
            _ => None,
        }
    }

    pub fn moe(&self, z: f64) -> Option<f64> {
        self.se.map(|se| se * z)
    }
}
