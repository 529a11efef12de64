use qii_engine::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// Dataset file: rows of feature values with optional column names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub rows: Dataset,
}

impl DataFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(names) = &self.feature_names {
            anyhow::ensure!(
                names.len() == self.rows.n_features(),
                "{} feature names given for {} features",
                names.len(),
                self.rows.n_features()
            );
        }
        Ok(())
    }

    /// Column name of `index`, or `x{index}` when the file has no names.
    pub fn feature_name(&self, index: usize) -> String {
        self.feature_names
            .as_ref()
            .and_then(|names| names.get(index))
            .cloned()
            .unwrap_or_else(|| format!("x{index}"))
    }
}
