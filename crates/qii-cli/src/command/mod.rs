use clap::{Parser, Subcommand};

use self::{compute::ComputeArg, evaluate_qoi::EvaluateQoiArg};

mod compute;
mod evaluate_qoi;
mod input;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What to compute
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Compute Shapley or Banzhaf influence of each feature of a data point
    Compute(#[clap(flatten)] ComputeArg),
    /// Evaluate the quantity of interest with some features randomized
    EvaluateQoi(#[clap(flatten)] EvaluateQoiArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Compute(arg) => compute::run(&arg)?,
        Mode::EvaluateQoi(arg) => evaluate_qoi::run(&arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_compute() {
        let args = CommandArgs::try_parse_from([
            "qii",
            "compute",
            "--data",
            "data.json",
            "--model",
            "model.json",
            "--point",
            "0.5,-1.25,3",
            "--method",
            "Banzhaf",
            "--features",
            "0,2",
            "--workers",
            "4",
        ])
        .unwrap();
        assert!(matches!(args.mode, Mode::Compute(_)));
    }

    #[test]
    fn test_row_and_point_are_exclusive() {
        let result = CommandArgs::try_parse_from([
            "qii", "compute", "--data", "d.json", "--model", "m.json", "--row", "1", "--point",
            "1,2",
        ]);
        assert!(result.is_err());

        let result = CommandArgs::try_parse_from([
            "qii",
            "evaluate-qoi",
            "--data",
            "d.json",
            "--model",
            "m.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result = CommandArgs::try_parse_from([
            "qii", "compute", "--data", "d.json", "--model", "m.json", "--row", "0", "--method",
            "owen",
        ]);
        assert!(result.is_err());
    }
}
