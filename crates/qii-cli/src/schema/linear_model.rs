use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Emits `1.0` for a positive score and `0.0` otherwise.
    Classifier,
    /// Emits the raw score.
    Regressor,
}

/// Linear model file: `score = bias + weights · row`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinearModelFile {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    pub kind: ModelKind,
}
