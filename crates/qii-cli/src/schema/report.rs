use chrono::{DateTime, Utc};
use qii_engine::{
    influence::{InfluenceScores, Method},
    seed::SamplingSeed,
};
use serde::{Deserialize, Serialize};

use crate::schema::data::DataFile;

/// Result of `qii compute`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluenceReport {
    pub method: Method,
    pub qoi: String,
    pub computed_at: DateTime<Utc>,
    pub seed: SamplingSeed,
    pub iterations: usize,
    pub exhaustive: bool,
    /// Evaluated features by decreasing influence.
    pub features: Vec<FeatureInfluence>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureInfluence {
    pub index: usize,
    pub name: String,
    pub influence: f64,
}

impl InfluenceReport {
    pub fn new(scores: &InfluenceScores, qoi: &str, seed: SamplingSeed, data: &DataFile) -> Self {
        let features = scores
            .ranked()
            .into_iter()
            .map(|(index, influence)| FeatureInfluence {
                index,
                name: data.feature_name(index),
                influence,
            })
            .collect();
        Self {
            method: scores.method,
            qoi: qoi.to_owned(),
            computed_at: Utc::now(),
            seed,
            iterations: scores.iterations,
            exhaustive: scores.exhaustive,
            features,
        }
    }
}

/// Result of `qii evaluate-qoi`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QoiValueReport {
    pub qoi: String,
    pub randomized: Vec<FeatureRef>,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureRef {
    pub index: usize,
    pub name: String,
}
