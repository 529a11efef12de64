//! Contract of the black-box model whose behavior is being explained.
//!
//! The engine never looks inside a model. It only asks for predictions over
//! batches of rows and compares the results.

use crate::dataset::Dataset;

/// A single model output: a class label or a score.
///
/// The built-in quantities of interest compare predictions for exact equality,
/// so classifiers should emit label values (for example `0.0` and `1.0`).
pub type Prediction = f64;

/// Failure reported by a predictor.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("prediction failed: {message}")]
pub struct PredictError {
    message: String,
}

impl PredictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A model that maps a batch of rows to one prediction per row.
///
/// Implementations must be deterministic for a fixed model state and must
/// return an error, not garbage, when given rows of the wrong width.
///
/// Closures of the form `Fn(&Dataset) -> Result<Vec<Prediction>, PredictError>`
/// implement this trait:
///
/// ```
/// use qii_engine::{dataset::Dataset, oracle::{Predictor, PredictError}};
///
/// let first_positive = |rows: &Dataset| -> Result<Vec<f64>, PredictError> {
///     Ok(rows.rows().map(|r| f64::from(u8::from(r[0] > 0.0))).collect())
/// };
/// let rows = Dataset::from_rows(vec![vec![1.0], vec![-1.0]]).unwrap();
/// assert_eq!(first_positive.predict(&rows).unwrap(), vec![1.0, 0.0]);
/// ```
pub trait Predictor: Send + Sync {
    fn predict(&self, rows: &Dataset) -> Result<Vec<Prediction>, PredictError>;
}

impl<F> Predictor for F
where
    F: Fn(&Dataset) -> Result<Vec<Prediction>, PredictError> + Send + Sync,
{
    fn predict(&self, rows: &Dataset) -> Result<Vec<Prediction>, PredictError> {
        self(rows)
    }
}
