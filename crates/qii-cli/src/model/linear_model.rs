use qii_engine::{
    dataset::Dataset,
    oracle::{PredictError, Prediction, Predictor},
};

use crate::schema::linear_model::{LinearModelFile, ModelKind};

/// Linear classifier or regressor loaded from a model file.
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
    kind: ModelKind,
}

impl LinearModel {
    pub fn from_file(file: LinearModelFile) -> anyhow::Result<Self> {
        let LinearModelFile {
            weights,
            bias,
            kind,
        } = file;
        anyhow::ensure!(!weights.is_empty(), "model has no weights");
        anyhow::ensure!(
            weights.iter().chain([&bias]).all(|w| w.is_finite()),
            "model weights must be finite"
        );
        Ok(Self {
            weights,
            bias,
            kind,
        })
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn score(&self, row: &[f64]) -> f64 {
        let dot: f64 = self.weights.iter().zip(row).map(|(w, x)| w * x).sum();
        self.bias + dot
    }
}

impl Predictor for LinearModel {
    fn predict(&self, rows: &Dataset) -> Result<Vec<Prediction>, PredictError> {
        if rows.n_features() != self.n_features() {
            return Err(PredictError::new(format!(
                "model expects {} features, got rows with {}",
                self.n_features(),
                rows.n_features()
            )));
        }
        let predictions = rows
            .rows()
            .map(|row| {
                let score = self.score(row);
                match self.kind {
                    ModelKind::Classifier => f64::from(u8::from(score > 0.0)),
                    ModelKind::Regressor => score,
                }
            })
            .collect();
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(kind: ModelKind) -> LinearModel {
        LinearModel::from_file(LinearModelFile {
            weights: vec![2.0, -1.0],
            bias: -0.5,
            kind,
        })
        .unwrap()
    }

    #[test]
    fn test_classifier_thresholds_at_zero() {
        let rows =
            Dataset::from_rows(vec![vec![1.0, 1.0], vec![0.25, 0.0], vec![0.0, 0.0]]).unwrap();
        let predictions = model(ModelKind::Classifier).predict(&rows).unwrap();
        // scores: 0.5, 0.0, -0.5
        assert_eq!(predictions, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_regressor_returns_score() {
        let rows = Dataset::from_rows(vec![vec![1.0, 0.5]]).unwrap();
        let predictions = model(ModelKind::Regressor).predict(&rows).unwrap();
        assert_eq!(predictions, vec![1.0]);
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let rows = Dataset::from_rows(vec![vec![1.0, 0.5, 2.0]]).unwrap();
        let err = model(ModelKind::Classifier).predict(&rows).unwrap_err();
        assert!(err.message().contains("expects 2 features"));
    }

    #[test]
    fn test_parse_model_file() {
        let file: LinearModelFile =
            serde_json::from_str(r#"{ "weights": [1.0], "bias": 0.5, "kind": "classifier" }"#)
                .unwrap();
        assert_eq!(file.kind, ModelKind::Classifier);
        assert_eq!(LinearModel::from_file(file).unwrap().n_features(), 1);

        let empty = LinearModelFile {
            weights: vec![],
            bias: 0.0,
            kind: ModelKind::Regressor,
        };
        assert!(LinearModel::from_file(empty).is_err());
    }
}
