// src/estimation/quantile.rs

/// Rule applied when the target probability falls exactly on a step of the
/// weighted empirical CDF.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SvyQuantileMethod {
    /// Inverse CDF: smallest value whose cumulative share reaches `p`
    #[default]
    Lower,
    /// Next support point when `p` sits exactly on a step
    Higher,
    /// Average of lower and higher (the textbook median for equal weights)
    Middle,
    /// Linear interpolation between adjacent support points
    Linear,
}

impl SvyQuantileMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lower" | "math" => Some(SvyQuantileMethod::Lower),
            "higher" => Some(SvyQuantileMethod::Higher),
            "middle" | "school" => Some(SvyQuantileMethod::Middle),
            "linear" => Some(SvyQuantileMethod::Linear),
            _ => None,
        }
    }
}

const STEP_TOL: f64 = 1e-12;

/// Weighted quantile from sorted values and their CDF (cumsum(w) / sum(w)).
///
/// Returns NaN for an empty support or `p` outside [0, 1].
pub fn weighted_quantile(
    y_sorted: &[f64],
    cdf: &[f64],
    p: f64,
    method: SvyQuantileMethod,
) -> f64 {
    let n = y_sorted.len();
    if n == 0 || cdf.len() != n || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if n == 1 {
        return y_sorted[0];
    }

    let idx = cdf.partition_point(|&c| c < p - STEP_TOL).min(n - 1);
    let at_step = (cdf[idx] - p).abs() < STEP_TOL && idx + 1 < n;

    let lower = y_sorted[idx];
    let higher = if at_step { y_sorted[idx + 1] } else { lower };

    match method {
        SvyQuantileMethod::Lower => lower,
        SvyQuantileMethod::Higher => higher,
        SvyQuantileMethod::Middle => (lower + higher) / 2.0,
        SvyQuantileMethod::Linear => {
            if idx == 0 {
                return y_sorted[0];
            }
            let denom = cdf[idx] - cdf[idx - 1];
            if denom <= 0.0 {
                return y_sorted[idx];
            }
            let t = (p - cdf[idx - 1]) / denom;
            (1.0 - t) * y_sorted[idx - 1] + t * y_sorted[idx]
        }
    }
}

/// Weighted median of values already sorted ascending.
///
/// Non-positive weights and non-finite values are dropped; NaN when nothing
/// carries weight.
pub fn weighted_median(y_sorted: &[f64], weights: &[f64], method: SvyQuantileMethod) -> f64 {
    let (ys, ws): (Vec<f64>, Vec<f64>) = y_sorted
        .iter()
        .zip(weights.iter())
        .filter(|(y, w)| **w > 0.0 && y.is_finite())
        .map(|(y, w)| (*y, *w))
        .unzip();

    let total_w: f64 = ws.iter().sum();
    if ys.is_empty() || total_w <= 0.0 {
        return f64::NAN;
    }

    let mut cdf = Vec::with_capacity(ws.len());
    let mut cumsum = 0.0;
    for w in &ws {
        cumsum += w;
        cdf.push(cumsum / total_w);
    }

    weighted_quantile(&ys, &cdf, 0.5, method)
}
