use std::path::PathBuf;

use qii_engine::{
    influence::{ComputeOptions, DEFAULT_N_SAMPLINGS, DEFAULT_POOL_SIZE, InfluenceEngine, Method},
    progress::{NoProgress, Progress, ProgressObserver},
    seed::SamplingSeed,
};
use rand::Rng as _;

use crate::{
    command::input::InputArg,
    schema::report::InfluenceReport,
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ComputeArg {
    #[command(flatten)]
    input: InputArg,
    /// Power index: shapley or banzhaf
    #[arg(long, default_value = "shapley")]
    method: Method,
    /// Features to evaluate, as comma-separated indices (default: all)
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<usize>>,
    /// Use the whole dataset as background pool
    #[arg(long)]
    data_exhaustive: bool,
    /// Enumerate every permutation or subset instead of sampling
    #[arg(long)]
    feature_exhaustive: bool,
    /// Background pool file (JSON, same format as the dataset)
    #[arg(long, conflicts_with = "data_exhaustive")]
    pool: Option<PathBuf>,
    /// Number of rows drawn from the dataset as background pool
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,
    /// Maximum number of sampled permutations or subsets
    #[arg(long, default_value_t = DEFAULT_N_SAMPLINGS)]
    n_samplings: usize,
    /// Number of worker threads
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Sampling seed as 32 hex digits (default: random)
    #[arg(long)]
    seed: Option<SamplingSeed>,
    /// Show the running sum of contributions in the progress bar
    #[arg(long)]
    show_approx: bool,
    /// Do not print progress
    #[arg(long)]
    quiet: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn print_progress(progress: &Progress) {
    eprint!("\r{progress}");
    if progress.is_done() {
        eprintln!();
    }
}

pub(crate) fn run(arg: &ComputeArg) -> anyhow::Result<()> {
    let input = arg.input.load()?;
    let pool = arg
        .pool
        .as_ref()
        .map(|path| util::read_data_file("pool", path).map(|pool| pool.rows))
        .transpose()?;

    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = seed.rng();

    let options = ComputeOptions {
        show_approx: arg.show_approx,
        evaluated_features: arg.features.clone(),
        data_exhaustive: arg.data_exhaustive,
        feature_exhaustive: arg.feature_exhaustive,
        pool,
        pool_size: arg.pool_size,
        n_samplings: arg.n_samplings,
        method: arg.method,
        workers: arg.workers,
    };

    let qoi_name = input.qoi.active_name().to_owned();
    let engine = InfluenceEngine::new(input.data.rows.clone(), input.qoi);
    let config = engine.resolve(&options, &mut rng)?;
    eprintln!(
        "Computing {} influence of {} features with {qoi_name} ({} iterations, {} pool rows, seed {seed})",
        config.method,
        config.features.len(),
        config.iterations,
        config.pool.n_rows(),
    );

    let observer: &dyn ProgressObserver = if arg.quiet {
        &NoProgress
    } else {
        &print_progress
    };
    let scores = engine.run(&input.x0, &input.model, &config, &mut rng, observer)?;

    if !arg.quiet {
        eprintln!("Influence:");
        for (index, influence) in scores.ranked() {
            eprintln!("  {:>20}: {influence:.4}", input.data.feature_name(index));
        }
    }

    let report = InfluenceReport::new(&scores, &qoi_name, seed, &input.data);
    Output::save_json(&report, arg.output.as_deref())?;
    Ok(())
}
