// src/estimation/replication.rs
//! Replication-based variance estimation (SDR, BRR) for totals, means and medians

use ndarray::{Array2, ArrayView1, ArrayView2};
use std::cmp::Ordering;

use super::measures::Estimate;
use super::quantile::{weighted_median, SvyQuantileMethod};
use crate::error::{EngineError, Result};

/// Replication method, used to derive the default variance scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RepMethod {
    /// Successive difference replication (ACS): scale = 4/R
    SDR,
    /// Balanced repeated replication, optionally with Fay's adjustment
    BRR,
}

impl RepMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sdr" | "acs" | "successive-difference" => Some(RepMethod::SDR),
            "brr" | "fay" => Some(RepMethod::BRR),
            _ => None,
        }
    }

    /// Multiplier applied to the sum of squared replicate deviations
    pub fn scale(self, n_reps: usize, fay_coef: f64) -> f64 {
        match self {
            RepMethod::SDR => 4.0 / n_reps as f64,
            RepMethod::BRR => 1.0 / (n_reps as f64 * (1.0 - fay_coef).powi(2)),
        }
    }
}

/// Centering method for variance estimation
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum VarianceCenter {
    /// Center on the full sample estimate (published ACS formula)
    #[default]
    FullSample,
    /// Center on the mean of replicate estimates
    ReplicateMean,
}

impl VarianceCenter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full_sample" | "fullsample" | "full" | "estimate" | "mse" => {
                Some(VarianceCenter::FullSample)
            }
            "rep_mean" | "repmean" | "mean" | "average" | "replicates" => {
                Some(VarianceCenter::ReplicateMean)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplicateVariance {
    pub scale: f64,
    pub center: VarianceCenter,
}

impl ReplicateVariance {
    pub fn new(scale: f64, center: VarianceCenter) -> Self {
        Self { scale, center }
    }

    /// Variance of `theta_full` from its replicate estimates.
    ///
    /// `None` when there are no replicates or any estimate is undefined.
    pub fn variance(&self, theta_full: f64, theta_reps: &[f64]) -> Option<f64> {
        let n_reps = theta_reps.len();
        if n_reps == 0 || !theta_full.is_finite() || theta_reps.iter().any(|t| !t.is_finite()) {
            return None;
        }

        let center_value = match self.center {
            VarianceCenter::FullSample => theta_full,
            VarianceCenter::ReplicateMean => theta_reps.iter().sum::<f64>() / n_reps as f64,
        };

        let ss: f64 = theta_reps
            .iter()
            .map(|&rep| {
                let diff = rep - center_value;
                diff * diff
            })
            .sum();

        Some(self.scale * ss)
    }

    pub fn standard_error(&self, theta_full: f64, theta_reps: &[f64]) -> Option<f64> {
        self.variance(theta_full, theta_reps).map(f64::sqrt)
    }
}

// ============================================================================
// Domain accumulation
// ============================================================================

/// Weighted sums per domain for the full sample and every replicate
#[derive(Debug, Clone)]
pub struct DomainSums {
    pub sum_wy: Vec<f64>,
    pub sum_w: Vec<f64>,
    /// [K x R]
    pub rep_sum_wy: Array2<f64>,
    /// [K x R]
    pub rep_sum_w: Array2<f64>,
}

/// Single pass over the rows. Rows whose domain id is `>= n_domains` are skipped.
pub fn sums_by_domain(
    y: &[f64],
    weights: ArrayView1<f64>,
    rep_weights: ArrayView2<f64>,
    domain_ids: &[u32],
    n_domains: usize,
) -> DomainSums {
    let n_reps = rep_weights.ncols();
    let mut sum_wy = vec![0.0; n_domains];
    let mut sum_w = vec![0.0; n_domains];
    let mut rep_sum_wy = Array2::<f64>::zeros((n_domains, n_reps));
    let mut rep_sum_w = Array2::<f64>::zeros((n_domains, n_reps));

    for (i, &d) in domain_ids.iter().enumerate() {
        let d = d as usize;
        if d >= n_domains {
            continue;
        }

        let yi = y[i];
        let wi = weights[i];

        sum_wy[d] += yi * wi;
        sum_w[d] += wi;

        let row = rep_weights.row(i);
        for r in 0..n_reps {
            let w_ir = row[r];
            rep_sum_wy[[d, r]] += yi * w_ir;
            rep_sum_w[[d, r]] += w_ir;
        }
    }

    DomainSums {
        sum_wy,
        sum_w,
        rep_sum_wy,
        rep_sum_w,
    }
}

/// Means per domain together with the weighted base each one was computed on
#[derive(Debug, Clone)]
pub struct DomainMeans {
    pub estimates: Vec<Estimate>,
    pub weight_totals: Vec<f64>,
}

/// Totals per domain. A domain with no weight has total 0 and no SE.
pub fn total_by_domain(
    y: &[f64],
    weights: ArrayView1<f64>,
    rep_weights: ArrayView2<f64>,
    domain_ids: &[u32],
    n_domains: usize,
    variance: &ReplicateVariance,
) -> Vec<Estimate> {
    let sums = sums_by_domain(y, weights, rep_weights, domain_ids, n_domains);

    (0..n_domains)
        .map(|d| {
            if sums.sum_w[d] <= 0.0 {
                return Estimate::new(0.0, None);
            }
            let theta_full = sums.sum_wy[d];
            let theta_reps = sums.rep_sum_wy.row(d).to_vec();
            Estimate::new(theta_full, variance.standard_error(theta_full, &theta_reps))
        })
        .collect()
}

/// Weighted means per domain. A domain with no weight has an undefined mean.
pub fn mean_by_domain(
    y: &[f64],
    weights: ArrayView1<f64>,
    rep_weights: ArrayView2<f64>,
    domain_ids: &[u32],
    n_domains: usize,
    variance: &ReplicateVariance,
) -> DomainMeans {
    let sums = sums_by_domain(y, weights, rep_weights, domain_ids, n_domains);

    let estimates = (0..n_domains)
        .map(|d| {
            let w = sums.sum_w[d];
            if w <= 0.0 {
                return Estimate::undefined();
            }
            let theta_full = sums.sum_wy[d] / w;
            let theta_reps: Vec<f64> = sums
                .rep_sum_wy
                .row(d)
                .iter()
                .zip(sums.rep_sum_w.row(d).iter())
                .map(|(&wy, &w_r)| if w_r > 0.0 { wy / w_r } else { f64::NAN })
                .collect();
            Estimate::new(theta_full, variance.standard_error(theta_full, &theta_reps))
        })
        .collect();

    DomainMeans {
        estimates,
        weight_totals: sums.sum_w,
    }
}

/// Weighted medians per domain. Rows with a non-finite value are skipped.
///
/// Each domain is sorted once; replicate medians reuse that order.
pub fn median_by_domain(
    y: &[f64],
    weights: ArrayView1<f64>,
    rep_weights: ArrayView2<f64>,
    domain_ids: &[u32],
    n_domains: usize,
    variance: &ReplicateVariance,
    q_method: SvyQuantileMethod,
) -> Vec<Estimate> {
    let n_reps = rep_weights.ncols();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_domains];

    for (i, &d) in domain_ids.iter().enumerate() {
        let d = d as usize;
        if d < n_domains && y[i].is_finite() {
            members[d].push(i);
        }
    }

    members
        .into_iter()
        .map(|mut rows| {
            rows.sort_by(|&a, &b| y[a].partial_cmp(&y[b]).unwrap_or(Ordering::Equal));
            let y_sorted: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
            let w_sorted: Vec<f64> = rows.iter().map(|&i| weights[i]).collect();

            let theta_full = weighted_median(&y_sorted, &w_sorted, q_method);
            if !theta_full.is_finite() {
                return Estimate::undefined();
            }

            let theta_reps: Vec<f64> = (0..n_reps)
                .map(|r| {
                    let w_r: Vec<f64> = rows.iter().map(|&i| rep_weights[[i, r]]).collect();
                    weighted_median(&y_sorted, &w_r, q_method)
                })
                .collect();

            Estimate::new(theta_full, variance.standard_error(theta_full, &theta_reps))
        })
        .collect()
}

// ============================================================================
// Estimator
// ============================================================================

/// Replicate-weight estimator over one weight design
#[derive(Debug, Clone, Copy)]
pub struct ReplicateEstimator<'a> {
    weights: ArrayView1<'a, f64>,
    rep_weights: ArrayView2<'a, f64>,
    variance: ReplicateVariance,
    q_method: SvyQuantileMethod,
}

impl<'a> ReplicateEstimator<'a> {
    pub fn new(
        weights: ArrayView1<'a, f64>,
        rep_weights: ArrayView2<'a, f64>,
        variance: ReplicateVariance,
    ) -> Result<Self> {
        if weights.len() != rep_weights.nrows() {
            return Err(EngineError::Configuration(format!(
                "weight vector has {} rows but replicate matrix has {}",
                weights.len(),
                rep_weights.nrows()
            )));
        }
        Ok(Self {
            weights,
            rep_weights,
            variance,
            q_method: SvyQuantileMethod::default(),
        })
    }

    pub fn with_quantile_method(mut self, q_method: SvyQuantileMethod) -> Self {
        self.q_method = q_method;
        self
    }

    pub fn n_rows(&self) -> usize {
        self.weights.len()
    }

    pub fn n_reps(&self) -> usize {
        self.rep_weights.ncols()
    }

    pub fn total(&self, y: &[f64]) -> Estimate {
        self.total_by_domain(y, &vec![0; y.len()], 1)[0]
    }

    pub fn mean(&self, y: &[f64]) -> Estimate {
        self.mean_by_domain(y, &vec![0; y.len()], 1).estimates[0]
    }

    pub fn median(&self, y: &[f64]) -> Estimate {
        self.median_by_domain(y, &vec![0; y.len()], 1)[0]
    }

    pub fn total_by_domain(
        &self,
        y: &[f64],
        domain_ids: &[u32],
        n_domains: usize,
    ) -> Vec<Estimate> {
        total_by_domain(y, self.weights, self.rep_weights, domain_ids, n_domains, &self.variance)
    }

    pub fn mean_by_domain(&self, y: &[f64], domain_ids: &[u32], n_domains: usize) -> DomainMeans {
        mean_by_domain(y, self.weights, self.rep_weights, domain_ids, n_domains, &self.variance)
    }

    pub fn median_by_domain(
        &self,
        y: &[f64],
        domain_ids: &[u32],
        n_domains: usize,
    ) -> Vec<Estimate> {
        median_by_domain(
            y,
            self.weights,
            self.rep_weights,
            domain_ids,
            n_domains,
            &self.variance,
            self.q_method,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
