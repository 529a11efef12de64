//! Quantities of interest: the scalar game whose value is attributed to features.
//!
//! A quantity of interest observes a model around a point of interest
//! `x0`. Features named in a subset are *randomized*: their values are taken
//! from the rows of a background pool while every other feature keeps the
//! value it has in `x0`. The quantity summarizes the predictions over that
//! perturbed batch as a number in \[0.0, 1.0\].
//!
//! # Built-in Quantities
//!
//! - [`LabelUnchangedRatio`] (`label_unchanged_ratio`) - fraction of perturbed
//!   rows whose prediction equals the prediction for `x0`
//! - [`LabelChangedRatio`] (`label_changed_ratio`) - `1.0` minus the above
//!
//! # Registry
//!
//! [`QoiRegistry`] keeps quantities by name and tracks the active one. Custom
//! quantities are added with [`QoiRegistry::add_qoi`] or
//! [`QoiRegistry::add_qoi_fn`] and selected with [`QoiRegistry::set_qoi`].
//! Selecting an unknown name returns [`UnknownQoiError`] and leaves the active
//! quantity untouched.
//!
//! ```
//! use qii_engine::qoi::QoiRegistry;
//!
//! let mut registry = QoiRegistry::new();
//! assert_eq!(registry.active_name(), "label_unchanged_ratio");
//!
//! assert!(registry.set_qoi("no_such_qoi").is_err());
//! assert_eq!(registry.active_name(), "label_unchanged_ratio");
//!
//! registry.set_qoi("label_changed_ratio").unwrap();
//! assert_eq!(registry.active_name(), "label_changed_ratio");
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    dataset::{Dataset, ShapeError},
    oracle::{PredictError, Predictor},
};

pub const LABEL_UNCHANGED_RATIO: &str = "label_unchanged_ratio";
pub const LABEL_CHANGED_RATIO: &str = "label_changed_ratio";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum QoiError {
    #[display("{_0}")]
    Predict(PredictError),
    #[display("{_0}")]
    Shape(ShapeError),
    #[display("predictor returned {found} predictions for {expected} rows")]
    PredictionCount { expected: usize, found: usize },
    #[display("background pool is empty")]
    EmptyPool,
}

impl From<PredictError> for QoiError {
    fn from(err: PredictError) -> Self {
        Self::Predict(err)
    }
}

impl From<ShapeError> for QoiError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("quantity of interest '{name}' is not registered")]
pub struct UnknownQoiError {
    pub name: String,
}

/// Inputs shared by every quantity of interest.
#[derive(Debug, Clone, Copy)]
pub struct QoiInput<'a> {
    /// The point of interest.
    pub x0: &'a [f64],
    /// Background rows supplying values for randomized features.
    pub pool: &'a Dataset,
    /// Features whose values are drawn from the pool.
    pub features: &'a [usize],
}

pub trait QuantityOfInterest: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Evaluates the quantity for the given inputs, in \[0.0, 1.0\].
    fn compute(&self, input: &QoiInput<'_>, predictor: &dyn Predictor) -> Result<f64, QoiError>;
}

pub type SharedQoi = Arc<dyn QuantityOfInterest>;

/// Builds the perturbed batch for a subset of randomized features.
///
/// The result has one row per pool row. Each row is a copy of `x0` with the
/// columns in `features` overwritten by the matching pool row.
pub fn perturb(x0: &[f64], pool: &Dataset, features: &[usize]) -> Result<Dataset, ShapeError> {
    if x0.len() != pool.n_features() {
        return Err(ShapeError::RaggedRow {
            row: 0,
            expected: pool.n_features(),
            found: x0.len(),
        });
    }
    let mut batch = Dataset::repeat_row(x0, pool.n_rows())?;
    for &feature in features {
        batch.copy_column_from(feature, pool)?;
    }
    Ok(batch)
}

fn predict_checked(predictor: &dyn Predictor, rows: &Dataset) -> Result<Vec<f64>, QoiError> {
    let predictions = predictor.predict(rows)?;
    if predictions.len() != rows.n_rows() {
        return Err(QoiError::PredictionCount {
            expected: rows.n_rows(),
            found: predictions.len(),
        });
    }
    Ok(predictions)
}

/// Fraction of perturbed rows predicted with the same label as `x0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelUnchangedRatio;

impl QuantityOfInterest for LabelUnchangedRatio {
    fn id(&self) -> &str {
        LABEL_UNCHANGED_RATIO
    }

    #[expect(clippy::cast_precision_loss, clippy::float_cmp)]
    fn compute(&self, input: &QoiInput<'_>, predictor: &dyn Predictor) -> Result<f64, QoiError> {
        if input.pool.is_empty() {
            return Err(QoiError::EmptyPool);
        }
        let reference = Dataset::repeat_row(input.x0, 1)?;
        let y0 = predict_checked(predictor, &reference)?[0];

        let batch = perturb(input.x0, input.pool, input.features)?;
        let predictions = predict_checked(predictor, &batch)?;
        // labels are compared exactly
        let unchanged = predictions.iter().filter(|&&y| y == y0).count();
        Ok(unchanged as f64 / predictions.len() as f64)
    }
}

/// Fraction of perturbed rows whose label differs from the label of `x0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelChangedRatio;

impl QuantityOfInterest for LabelChangedRatio {
    fn id(&self) -> &str {
        LABEL_CHANGED_RATIO
    }

    fn compute(&self, input: &QoiInput<'_>, predictor: &dyn Predictor) -> Result<f64, QoiError> {
        Ok(1.0 - LabelUnchangedRatio.compute(input, predictor)?)
    }
}

/// Adapts a closure into a [`QuantityOfInterest`].
pub struct FnQoi<F> {
    id: String,
    f: F,
}

impl<F> FnQoi<F> {
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> fmt::Debug for FnQoi<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnQoi")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<F> QuantityOfInterest for FnQoi<F>
where
    F: Fn(&QoiInput<'_>, &dyn Predictor) -> Result<f64, QoiError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn compute(&self, input: &QoiInput<'_>, predictor: &dyn Predictor) -> Result<f64, QoiError> {
        (self.f)(input, predictor)
    }
}

/// Named collection of quantities of interest with one active entry.
#[derive(Debug, Clone)]
pub struct QoiRegistry {
    entries: BTreeMap<String, SharedQoi>,
    active_name: String,
    active: SharedQoi,
}

impl Default for QoiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QoiRegistry {
    /// Creates a registry holding the built-in quantities, with
    /// `label_unchanged_ratio` active.
    #[must_use]
    pub fn new() -> Self {
        let unchanged: SharedQoi = Arc::new(LabelUnchangedRatio);
        let changed: SharedQoi = Arc::new(LabelChangedRatio);
        let entries = BTreeMap::from([
            (LABEL_UNCHANGED_RATIO.to_owned(), Arc::clone(&unchanged)),
            (LABEL_CHANGED_RATIO.to_owned(), changed),
        ]);
        Self {
            entries,
            active_name: LABEL_UNCHANGED_RATIO.to_owned(),
            active: unchanged,
        }
    }

    /// Registers `qoi` under `name`, replacing any previous entry.
    ///
    /// Replacing the active entry makes the new quantity active.
    pub fn add_qoi(&mut self, name: impl Into<String>, qoi: SharedQoi) {
        let name = name.into();
        if name == self.active_name {
            self.active = Arc::clone(&qoi);
        }
        self.entries.insert(name, qoi);
    }

    /// Registers a closure under `name`.
    pub fn add_qoi_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&QoiInput<'_>, &dyn Predictor) -> Result<f64, QoiError> + Send + Sync + 'static,
    {
        let name = name.into();
        let qoi = Arc::new(FnQoi::new(name.clone(), f));
        self.add_qoi(name, qoi);
    }

    /// Makes the quantity registered under `name` active.
    ///
    /// On failure the previously active quantity stays in effect.
    pub fn set_qoi(&mut self, name: &str) -> Result<(), UnknownQoiError> {
        let qoi = self.entries.get(name).ok_or_else(|| UnknownQoiError {
            name: name.to_owned(),
        })?;
        self.active = Arc::clone(qoi);
        name.clone_into(&mut self.active_name);
        Ok(())
    }

    #[must_use]
    pub fn active_name(&self) -> &str {
        &self.active_name
    }

    #[must_use]
    pub fn active(&self) -> &dyn QuantityOfInterest {
        self.active.as_ref()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn QuantityOfInterest> {
        self.entries.get(name).map(AsRef::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Evaluates the active quantity.
    pub fn compute_qoi(
        &self,
        input: &QoiInput<'_>,
        predictor: &dyn Predictor,
    ) -> Result<f64, QoiError> {
        self.active.compute(input, predictor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn threshold_on_first(rows: &Dataset) -> Result<Vec<f64>, PredictError> {
        Ok(rows
            .rows()
            .map(|r| if r[0] > 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    fn pool() -> Dataset {
        Dataset::from_rows(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.2, 1.0],
            vec![0.9, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_perturb_replaces_named_columns() {
        let pool = pool();
        let batch = perturb(&[5.0, 6.0], &pool, &[1]).unwrap();
        assert_eq!(batch.n_rows(), 4);
        assert_eq!(batch.row(0), &[5.0, 0.0]);
        assert_eq!(batch.row(2), &[5.0, 1.0]);

        let untouched = perturb(&[5.0, 6.0], &pool, &[]).unwrap();
        assert!(untouched.rows().all(|r| r == [5.0, 6.0]));
    }

    #[test]
    fn test_perturb_rejects_point_of_wrong_width() {
        assert!(perturb(&[1.0], &pool(), &[0]).is_err());
    }

    #[test]
    fn test_label_unchanged_ratio() {
        let pool = pool();
        let x0 = [1.0, 0.0];
        let all_kept = QoiInput {
            x0: &x0,
            pool: &pool,
            features: &[],
        };
        assert_eq!(
            LabelUnchangedRatio
                .compute(&all_kept, &threshold_on_first)
                .unwrap(),
            1.0
        );

        // half of the pool has feature 0 above the threshold
        let randomized = QoiInput {
            features: &[0],
            ..all_kept
        };
        assert_eq!(
            LabelUnchangedRatio
                .compute(&randomized, &threshold_on_first)
                .unwrap(),
            0.5
        );
    }

    #[test]
    fn test_label_changed_ratio_is_exact_complement() {
        let pool = pool();
        for features in [&[][..], &[0][..], &[1][..], &[0, 1][..]] {
            for x0 in [[1.0, 0.0], [0.0, 1.0], [0.7, 0.3]] {
                let input = QoiInput {
                    x0: &x0,
                    pool: &pool,
                    features,
                };
                let unchanged = LabelUnchangedRatio
                    .compute(&input, &threshold_on_first)
                    .unwrap();
                let changed = LabelChangedRatio
                    .compute(&input, &threshold_on_first)
                    .unwrap();
                assert_eq!(changed, 1.0 - unchanged);
            }
        }
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let pool = Dataset::new(2, vec![]).unwrap();
        let input = QoiInput {
            x0: &[1.0, 0.0],
            pool: &pool,
            features: &[0],
        };
        assert!(matches!(
            LabelUnchangedRatio.compute(&input, &threshold_on_first),
            Err(QoiError::EmptyPool)
        ));
    }

    #[test]
    fn test_prediction_count_mismatch() {
        let short = |_: &Dataset| -> Result<Vec<f64>, PredictError> { Ok(vec![1.0]) };
        let pool = pool();
        let input = QoiInput {
            x0: &[1.0, 0.0],
            pool: &pool,
            features: &[0],
        };
        assert!(matches!(
            LabelUnchangedRatio.compute(&input, &short),
            Err(QoiError::PredictionCount {
                expected: 4,
                found: 1
            })
        ));
    }

    #[test]
    fn test_predictor_errors_propagate() {
        let failing =
            |_: &Dataset| -> Result<Vec<f64>, PredictError> { Err(PredictError::new("boom")) };
        let pool = pool();
        let input = QoiInput {
            x0: &[1.0, 0.0],
            pool: &pool,
            features: &[],
        };
        match LabelUnchangedRatio.compute(&input, &failing) {
            Err(QoiError::Predict(err)) => assert_eq!(err.message(), "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_set_unknown_qoi_keeps_previous_selection() {
        let pool = pool();
        let x0 = [1.0, 0.0];
        let input = QoiInput {
            x0: &x0,
            pool: &pool,
            features: &[0],
        };

        let mut registry = QoiRegistry::new();
        registry.set_qoi(LABEL_CHANGED_RATIO).unwrap();
        let before = registry.compute_qoi(&input, &threshold_on_first).unwrap();

        let err = registry.set_qoi("label_flipped_ratio").unwrap_err();
        assert_eq!(err.name, "label_flipped_ratio");
        assert_eq!(registry.active_name(), LABEL_CHANGED_RATIO);

        let after = registry.compute_qoi(&input, &threshold_on_first).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_add_custom_qoi() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = QoiRegistry::new();
        registry.add_qoi_fn("randomized_fraction", move |input, _predictor| {
            counter.fetch_add(1, Ordering::Relaxed);
            #[expect(clippy::cast_precision_loss)]
            let fraction = input.features.len() as f64 / input.x0.len() as f64;
            Ok(fraction)
        });
        assert!(registry.names().any(|n| n == "randomized_fraction"));
        assert_eq!(registry.active_name(), LABEL_UNCHANGED_RATIO);
        let custom = registry.get("randomized_fraction").unwrap();
        assert_eq!(custom.id(), "randomized_fraction");
        assert!(registry.get("randomized_share").is_none());

        registry.set_qoi("randomized_fraction").unwrap();
        let pool = pool();
        let input = QoiInput {
            x0: &[1.0, 0.0],
            pool: &pool,
            features: &[1],
        };
        assert_eq!(
            registry.compute_qoi(&input, &threshold_on_first).unwrap(),
            0.5
        );
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_replacing_active_entry_switches_active() {
        let mut registry = QoiRegistry::new();
        registry.add_qoi(LABEL_UNCHANGED_RATIO, Arc::new(LabelChangedRatio));
        assert_eq!(registry.active().id(), LABEL_CHANGED_RATIO);
        assert_eq!(registry.active_name(), LABEL_UNCHANGED_RATIO);
    }
}
