use std::path::PathBuf;

use qii_engine::qoi::QoiInput;

use crate::{
    command::input::InputArg,
    schema::report::{FeatureRef, QoiValueReport},
    util::Output,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateQoiArg {
    #[command(flatten)]
    input: InputArg,
    /// Features to randomize from the dataset, as comma-separated indices
    #[arg(long, value_delimiter = ',')]
    features: Vec<usize>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &EvaluateQoiArg) -> anyhow::Result<()> {
    let input = arg.input.load()?;
    let n_features = input.data.rows.n_features();
    if let Some(&feature) = arg.features.iter().find(|&&f| f >= n_features) {
        anyhow::bail!(
            "feature index {feature} out of range for {n_features} features"
        );
    }

    let qoi_input = QoiInput {
        x0: &input.x0,
        pool: &input.data.rows,
        features: &arg.features,
    };
    let value = input.qoi.compute_qoi(&qoi_input, &input.model)?;

    let report = QoiValueReport {
        qoi: input.qoi.active_name().to_owned(),
        randomized: arg
            .features
            .iter()
            .map(|&index| FeatureRef {
                index,
                name: input.data.feature_name(index),
            })
            .collect(),
        value,
    };
    Output::save_json(&report, arg.output.as_deref())?;
    Ok(())
}
