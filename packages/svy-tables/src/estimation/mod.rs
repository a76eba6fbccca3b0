// src/estimation/mod.rs
pub mod measures;
pub mod quantile;
pub mod replication;

pub use measures::{Estimate, Z_ONE_SIDED_95};
pub use quantile::{weighted_median, weighted_quantile, SvyQuantileMethod};
pub use replication::{
    mean_by_domain, median_by_domain, sums_by_domain, total_by_domain, DomainMeans, DomainSums,
    RepMethod, ReplicateEstimator, ReplicateVariance, VarianceCenter,
};
