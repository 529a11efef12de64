//! Quantitative input influence for black-box models.
//!
//! This crate measures how much each input feature of a single data point
//! influences a model's behavior, using cooperative game theory.
//!
//! # Overview
//!
//! 1. **Data** ([`dataset::Dataset`]): Dense row-major tables for the data point,
//!    the dataset and the background pool
//! 2. **Oracle** ([`oracle::Predictor`]): The model, called with a batch of rows
//! 3. **Quantity of Interest** ([`qoi`]): A number describing model behavior when
//!    some features are randomized from the pool
//! 4. **Influence** ([`influence::InfluenceEngine`]): Shapley or Banzhaf values of
//!    each feature with respect to the quantity of interest, exact or sampled
//!
//! # Supporting Modules
//!
//! - [`progress`] - Per-iteration progress reports and the text progress bar
//! - [`seed`] - Reproducible seeds for pool and permutation sampling

pub mod dataset;
pub mod influence;
pub mod oracle;
pub mod progress;
pub mod qoi;
pub mod seed;
