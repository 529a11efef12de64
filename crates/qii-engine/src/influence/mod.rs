//! Influence estimation: Shapley and Banzhaf values of input features.
//!
//! This module implements the engine that attributes a quantity of interest
//! (see [`crate::qoi`]) to the individual features of a single data point.
//!
//! # How It Works
//!
//! A computation runs in three steps:
//!
//! 1. **Resolve** - [`InfluenceEngine::resolve`] turns [`ComputeOptions`] into a
//!    [`RunConfig`]: the evaluated features, the background pool and the
//!    iteration budget. Invalid combinations are rejected here, before any
//!    model call.
//! 2. **Iterate** - each iteration processes one permutation (Shapley) or one
//!    subset (Banzhaf) and adds the marginal contribution of every feature it
//!    visits to that feature's running total.
//! 3. **Normalize** - totals are divided by the number of iterations processed.
//!
//! # Marginal Contribution
//!
//! For a feature `i` and a coalition `S` of randomized features:
//!
//! ```text
//! contribution(i, S) = QoI(S) - QoI(S ∪ {i})
//! ```
//!
//! With the label-unchanged ratio this is the drop in agreement with the
//! original prediction caused by also randomizing `i`.
//!
//! # Exact and Approximate Modes
//!
//! | Index   | Exact (`feature_exhaustive`)  | Approximate                          |
//! |---------|-------------------------------|--------------------------------------|
//! | Shapley | all `k!` permutations         | `n` uniform random permutations      |
//! | Banzhaf | all `2^k - 1` nonempty subsets | `n` subsets, fair coin per feature  |
//!
//! In approximate mode `n = min(n_samplings, exact count)`. The effective count
//! is reported in [`InfluenceScores::iterations`].
//!
//! # Parallelism
//!
//! Iterations are independent. With `workers > 1` they are spread over scoped
//! threads, each with its own generator seeded from the caller's generator.
//! Totals are merged in worker order and progress reports are serialized.
//!
//! # Example
//!
//! ```
//! use qii_engine::{
//!     dataset::Dataset,
//!     influence::{ComputeOptions, InfluenceEngine, Method},
//!     oracle::PredictError,
//!     progress::NoProgress,
//!     qoi::QoiRegistry,
//! };
//!
//! let data = Dataset::from_rows(vec![
//!     vec![0.0, 0.0],
//!     vec![1.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![1.0, 1.0],
//! ])
//! .unwrap();
//! let model = |rows: &Dataset| -> Result<Vec<f64>, PredictError> {
//!     Ok(rows.rows().map(|r| if r[0] > 0.5 { 1.0 } else { 0.0 }).collect())
//! };
//!
//! let engine = InfluenceEngine::new(data, QoiRegistry::new());
//! let options = ComputeOptions {
//!     data_exhaustive: true,
//!     feature_exhaustive: true,
//!     method: Method::Shapley,
//!     ..ComputeOptions::default()
//! };
//! let scores = engine
//!     .compute(&[1.0, 0.0], &model, &options, &mut rand::rng(), &NoProgress)
//!     .unwrap();
//! assert_eq!(scores.iterations, 2);
//! assert_eq!(scores.scores[&0], 0.5);
//! assert_eq!(scores.scores[&1], 0.0);
//! ```

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Dataset, ShapeError},
    qoi::QoiError,
};

pub use self::run::{InfluenceEngine, InfluenceGame, RunConfig};

mod run;
mod sampling;

pub const DEFAULT_POOL_SIZE: usize = 600;
pub const DEFAULT_N_SAMPLINGS: usize = 600;

/// Power index used to aggregate marginal contributions.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Average over permutations of the evaluated features.
    #[default]
    #[display("shapley")]
    Shapley,
    /// Average over subsets of the evaluated features.
    #[display("banzhaf")]
    Banzhaf,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown method '{name}'; available options for method: \"shapley\", \"banzhaf\"")]
pub struct UnknownMethodError {
    pub name: String,
}

/// Hand-written instead of derived so the error can list the available methods.
impl FromStr for Method {
    type Err = UnknownMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("shapley") {
            Ok(Self::Shapley)
        } else if s.eq_ignore_ascii_case("banzhaf") {
            Ok(Self::Banzhaf)
        } else {
            Err(UnknownMethodError { name: s.to_owned() })
        }
    }
}

impl Method {
    /// Number of samples in the exact enumeration over `k` features.
    ///
    /// `k!` for Shapley and `2^k - 1` for Banzhaf, saturating at `usize::MAX`.
    #[must_use]
    pub fn exact_iterations(self, k: usize) -> usize {
        match self {
            Self::Shapley => (1..=k)
                .try_fold(1_usize, usize::checked_mul)
                .unwrap_or(usize::MAX),
            Self::Banzhaf => u32::try_from(k)
                .ok()
                .and_then(|k| 2_usize.checked_pow(k))
                .map_or(usize::MAX, |n| n - 1),
        }
    }

    /// Number of iterations a run over `k` features performs.
    ///
    /// ```
    /// use qii_engine::influence::Method;
    ///
    /// assert_eq!(Method::Shapley.iteration_budget(3, true, 2), 6);
    /// assert_eq!(Method::Shapley.iteration_budget(3, false, 600), 6);
    /// assert_eq!(Method::Shapley.iteration_budget(5, false, 600), 120);
    /// assert_eq!(Method::Banzhaf.iteration_budget(10, false, 600), 600);
    /// ```
    #[must_use]
    pub fn iteration_budget(self, k: usize, feature_exhaustive: bool, n_samplings: usize) -> usize {
        let exact = self.exact_iterations(k);
        if feature_exhaustive {
            exact
        } else {
            n_samplings.min(exact)
        }
    }
}

/// Where the background pool comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    /// Rows supplied by the caller.
    Explicit,
    /// The whole dataset.
    Dataset,
    /// Rows drawn uniformly with replacement from the dataset.
    Bootstrap,
}

/// Options of a single [`InfluenceEngine::compute`] call.
#[derive(Debug, Clone)]
pub struct ComputeOptions {
    /// Report the running sum of all accumulators with each progress update.
    pub show_approx: bool,
    /// Features to evaluate; all features when `None`.
    pub evaluated_features: Option<Vec<usize>>,
    /// Use the whole dataset as background pool.
    pub data_exhaustive: bool,
    /// Enumerate every permutation or subset instead of sampling.
    pub feature_exhaustive: bool,
    /// Explicit background pool; cannot be combined with `data_exhaustive`.
    pub pool: Option<Dataset>,
    /// Bootstrap sample size when neither `pool` nor `data_exhaustive` is set.
    pub pool_size: usize,
    /// Upper bound on sampled permutations or subsets in approximate mode.
    pub n_samplings: usize,
    pub method: Method,
    /// Number of worker threads.
    pub workers: usize,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            show_approx: false,
            evaluated_features: None,
            data_exhaustive: false,
            feature_exhaustive: false,
            pool: None,
            pool_size: DEFAULT_POOL_SIZE,
            n_samplings: DEFAULT_N_SAMPLINGS,
            method: Method::Shapley,
            workers: 1,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
pub enum InfluenceError {
    #[display("an explicit pool cannot be combined with data-exhaustive sampling")]
    PoolConflict,
    #[display("no features to evaluate")]
    NoFeatures,
    #[display("feature index {feature} out of range for {n_features} features")]
    FeatureOutOfRange { feature: usize, n_features: usize },
    #[display("feature index {feature} listed more than once")]
    DuplicateFeature { feature: usize },
    #[display("sampling budget must be positive")]
    ZeroSamplings,
    #[display("worker count must be positive")]
    ZeroWorkers,
    #[display("cannot draw a background pool from an empty dataset")]
    EmptyDataset,
    #[display("background pool is empty")]
    EmptyPool,
    #[display("background pool has {found} features, expected {expected}")]
    PoolShape { expected: usize, found: usize },
    #[display("{_0}")]
    Shape(ShapeError),
    #[display("{_0}")]
    Qoi(QoiError),
}

impl From<ShapeError> for InfluenceError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

impl From<QoiError> for InfluenceError {
    fn from(err: QoiError) -> Self {
        Self::Qoi(err)
    }
}

/// Normalized influence of each evaluated feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceScores {
    pub method: Method,
    /// Score per evaluated feature index; no other index appears.
    pub scores: BTreeMap<usize, f64>,
    /// Permutations or subsets actually processed (the normalization divisor).
    pub iterations: usize,
    /// Whether the iterations were an exhaustive enumeration.
    pub exhaustive: bool,
}

impl InfluenceScores {
    /// Sum of all scores.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Features ordered by decreasing score; ties keep ascending index order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(usize, f64)> {
        let mut ranked: Vec<_> = self.scores.iter().map(|(&f, &s)| (f, s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!("shapley".parse::<Method>().unwrap(), Method::Shapley);
        assert_eq!("Banzhaf".parse::<Method>().unwrap(), Method::Banzhaf);
        let err = "owen".parse::<Method>().unwrap_err();
        assert_eq!(err.name, "owen");
        assert!(err.to_string().contains("\"shapley\", \"banzhaf\""));
    }

    #[test]
    fn test_shape_errors_keep_their_own_variant() {
        let err = InfluenceError::from(ShapeError::Empty);
        assert!(err.is_shape());
        assert!(!err.is_qoi());
        assert_eq!(err.to_string(), ShapeError::Empty.to_string());
    }

    #[test]
    fn test_exact_iterations() {
        assert_eq!(Method::Shapley.exact_iterations(1), 1);
        assert_eq!(Method::Shapley.exact_iterations(4), 24);
        assert_eq!(Method::Banzhaf.exact_iterations(1), 1);
        assert_eq!(Method::Banzhaf.exact_iterations(4), 15);
    }

    #[test]
    fn test_exact_iterations_saturate() {
        assert_eq!(Method::Shapley.exact_iterations(40), usize::MAX);
        assert_eq!(Method::Banzhaf.exact_iterations(200), usize::MAX);
        assert_eq!(Method::Shapley.iteration_budget(40, false, 600), 600);
    }

    #[test]
    fn test_ranked_breaks_ties_by_index() {
        let scores = InfluenceScores {
            method: Method::Shapley,
            scores: BTreeMap::from([(0, 0.1), (1, 0.4), (2, 0.1), (3, 0.4)]),
            iterations: 24,
            exhaustive: true,
        };
        assert_eq!(
            scores.ranked(),
            vec![(1, 0.4), (3, 0.4), (0, 0.1), (2, 0.1)]
        );
        assert!((scores.total() - 1.0).abs() < 1e-12);
    }
}
