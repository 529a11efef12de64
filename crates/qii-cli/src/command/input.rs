use std::path::PathBuf;

use qii_engine::qoi::{LABEL_UNCHANGED_RATIO, QoiRegistry};

use crate::{model::linear_model::LinearModel, schema::data::DataFile, util};

/// Dataset, model and point of interest shared by every subcommand.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InputArg {
    /// Dataset file (JSON)
    #[arg(long)]
    data: PathBuf,
    /// Linear model file (JSON)
    #[arg(long)]
    model: PathBuf,
    /// Explain the dataset row with this index
    #[arg(long, conflicts_with = "point", required_unless_present = "point")]
    row: Option<usize>,
    /// Explain this point, given as comma-separated feature values
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    point: Option<Vec<f64>>,
    /// Quantity of interest
    #[arg(long, default_value = LABEL_UNCHANGED_RATIO)]
    qoi: String,
}

#[derive(Debug)]
pub(crate) struct Input {
    pub data: DataFile,
    pub model: LinearModel,
    pub x0: Vec<f64>,
    pub qoi: QoiRegistry,
}

impl InputArg {
    pub(crate) fn load(&self) -> anyhow::Result<Input> {
        eprintln!("Loading dataset from {}", self.data.display());
        let data = util::read_data_file("dataset", &self.data)?;
        let model = util::read_model_file(&self.model)?;
        let n_features = data.rows.n_features();
        eprintln!(
            "Loaded {} rows with {n_features} features",
            data.rows.n_rows()
        );

        anyhow::ensure!(
            model.n_features() == n_features,
            "model expects {} features, dataset has {n_features}",
            model.n_features()
        );

        let x0 = match (self.row, &self.point) {
            (Some(row), _) => {
                anyhow::ensure!(
                    row < data.rows.n_rows(),
                    "row {row} out of range for {} rows",
                    data.rows.n_rows()
                );
                data.rows.row(row).to_vec()
            }
            (None, Some(point)) => point.clone(),
            (None, None) => anyhow::bail!("either --row or --point is required"),
        };
        anyhow::ensure!(
            x0.len() == n_features,
            "point has {} values, dataset has {n_features} features",
            x0.len()
        );

        Ok(Input {
            data,
            model,
            x0,
            qoi: self.qoi_registry(),
        })
    }

    fn qoi_registry(&self) -> QoiRegistry {
        let mut registry = QoiRegistry::new();
        if let Err(e) = registry.set_qoi(&self.qoi) {
            let available = registry.names().collect::<Vec<_>>().join(", ");
            eprintln!("Warning: {e} (available: {available})");
            eprintln!("Warning: keeping {}", registry.active_name());
        }
        registry
    }
}
