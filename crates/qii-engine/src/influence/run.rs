use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, panic,
    sync::{Mutex, PoisonError},
    thread,
};

use rand::Rng;

use crate::{
    dataset::{Dataset, ShapeError},
    influence::{
        ComputeOptions, InfluenceError, InfluenceScores, Method, PoolSource,
        sampling::{coalitions, exact_samples, random_sample},
    },
    oracle::Predictor,
    progress::{Progress, ProgressObserver},
    qoi::{QoiError, QoiInput, QoiRegistry, QuantityOfInterest},
    seed::SamplingSeed,
};

type Totals = BTreeMap<usize, f64>;

/// Parameters of one computation, resolved from [`ComputeOptions`].
///
/// Created fresh for every call and never stored on the engine.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub features: Vec<usize>,
    pub pool: Dataset,
    pub pool_source: PoolSource,
    pub method: Method,
    pub feature_exhaustive: bool,
    /// Iterations the run performs, and the normalization divisor.
    pub iterations: usize,
    pub show_approx: bool,
    pub workers: usize,
}

/// The cooperative game played by the features of `x0`.
///
/// The value of a coalition is the quantity of interest with the coalition's
/// features randomized from the pool.
#[derive(Clone, Copy)]
pub struct InfluenceGame<'a> {
    x0: &'a [f64],
    pool: &'a Dataset,
    predictor: &'a dyn Predictor,
    qoi: &'a dyn QuantityOfInterest,
}

impl<'a> InfluenceGame<'a> {
    #[must_use]
    pub fn new(
        x0: &'a [f64],
        pool: &'a Dataset,
        predictor: &'a dyn Predictor,
        qoi: &'a dyn QuantityOfInterest,
    ) -> Self {
        Self {
            x0,
            pool,
            predictor,
            qoi,
        }
    }

    /// Quantity of interest with `coalition` randomized.
    pub fn value(&self, coalition: &[usize]) -> Result<f64, QoiError> {
        let input = QoiInput {
            x0: self.x0,
            pool: self.pool,
            features: coalition,
        };
        self.qoi.compute(&input, self.predictor)
    }

    /// `QoI(coalition) - QoI(coalition ∪ {feature})`.
    ///
    /// Costs two evaluations of the quantity of interest, each of which
    /// predicts the whole pool.
    pub fn marginal_contribution(
        &self,
        feature: usize,
        coalition: &[usize],
    ) -> Result<f64, QoiError> {
        let without = self.value(coalition)?;
        let mut with = Vec::with_capacity(coalition.len() + 1);
        with.extend_from_slice(coalition);
        with.push(feature);
        Ok(without - self.value(&with)?)
    }
}

impl fmt::Debug for InfluenceGame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluenceGame")
            .field("x0", &self.x0)
            .field("pool_rows", &self.pool.n_rows())
            .field("qoi", &self.qoi.id())
            .finish_non_exhaustive()
    }
}

/// Serializes progress reports coming from one or more workers.
struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    total: usize,
    show_approx: bool,
    state: Mutex<(usize, f64)>,
}

impl<'a> ProgressTracker<'a> {
    fn new(observer: &'a dyn ProgressObserver, total: usize, show_approx: bool) -> Self {
        Self {
            observer,
            total,
            show_approx,
            state: Mutex::new((0, 0.0)),
        }
    }

    fn record(&self, delta: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += 1;
        state.1 += delta;
        self.observer.on_progress(&Progress {
            iteration: state.0,
            total: self.total,
            running_sum: self.show_approx.then_some(state.1),
        });
    }
}

/// Estimates feature influence for data points drawn from one dataset.
///
/// The engine holds only the dataset and the quantity-of-interest registry.
/// Every call resolves its own [`RunConfig`], so one engine can serve
/// concurrent calls through a shared reference.
#[derive(Debug, Clone)]
pub struct InfluenceEngine {
    data: Dataset,
    qoi: QoiRegistry,
}

impl InfluenceEngine {
    #[must_use]
    pub fn new(data: Dataset, qoi: QoiRegistry) -> Self {
        Self { data, qoi }
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.n_features()
    }

    #[must_use]
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    #[must_use]
    pub fn qoi(&self) -> &QoiRegistry {
        &self.qoi
    }

    pub fn qoi_mut(&mut self) -> &mut QoiRegistry {
        &mut self.qoi
    }

    /// Resolves evaluated features, background pool and iteration budget.
    ///
    /// All validation happens here, before any call to a predictor. The
    /// generator is used only to draw a bootstrap pool.
    pub fn resolve<R>(
        &self,
        options: &ComputeOptions,
        rng: &mut R,
    ) -> Result<RunConfig, InfluenceError>
    where
        R: Rng + ?Sized,
    {
        if options.pool.is_some() && options.data_exhaustive {
            return Err(InfluenceError::PoolConflict);
        }
        if options.workers == 0 {
            return Err(InfluenceError::ZeroWorkers);
        }
        if !options.feature_exhaustive && options.n_samplings == 0 {
            return Err(InfluenceError::ZeroSamplings);
        }

        let features = self.resolve_features(options.evaluated_features.as_deref())?;
        let (pool, pool_source) = self.resolve_pool(options, rng)?;
        if pool.is_empty() {
            return Err(InfluenceError::EmptyPool);
        }

        let iterations = options.method.iteration_budget(
            features.len(),
            options.feature_exhaustive,
            options.n_samplings,
        );

        Ok(RunConfig {
            features,
            pool,
            pool_source,
            method: options.method,
            feature_exhaustive: options.feature_exhaustive,
            iterations,
            show_approx: options.show_approx,
            workers: options.workers,
        })
    }

    fn resolve_features(&self, requested: Option<&[usize]>) -> Result<Vec<usize>, InfluenceError> {
        let n_features = self.n_features();
        let Some(requested) = requested else {
            return Ok((0..n_features).collect());
        };
        if requested.is_empty() {
            return Err(InfluenceError::NoFeatures);
        }
        let mut seen = BTreeSet::new();
        for &feature in requested {
            if feature >= n_features {
                return Err(InfluenceError::FeatureOutOfRange {
                    feature,
                    n_features,
                });
            }
            if !seen.insert(feature) {
                return Err(InfluenceError::DuplicateFeature { feature });
            }
        }
        Ok(requested.to_vec())
    }

    fn resolve_pool<R>(
        &self,
        options: &ComputeOptions,
        rng: &mut R,
    ) -> Result<(Dataset, PoolSource), InfluenceError>
    where
        R: Rng + ?Sized,
    {
        if let Some(pool) = &options.pool {
            if pool.n_features() != self.n_features() {
                return Err(InfluenceError::PoolShape {
                    expected: self.n_features(),
                    found: pool.n_features(),
                });
            }
            return Ok((pool.clone(), PoolSource::Explicit));
        }
        if options.data_exhaustive {
            return Ok((self.data.clone(), PoolSource::Dataset));
        }

        let n_rows = self.data.n_rows();
        if n_rows == 0 {
            return Err(InfluenceError::EmptyDataset);
        }
        let indices: Vec<usize> = (0..options.pool_size)
            .map(|_| rng.random_range(0..n_rows))
            .collect();
        let pool = self.data.select_rows(&indices)?;
        Ok((pool, PoolSource::Bootstrap))
    }

    /// Resolves `options` and runs the computation for data point `x0`.
    ///
    /// Errors from the predictor or the quantity of interest abort the call
    /// and are returned unchanged inside [`InfluenceError::Qoi`].
    pub fn compute<R>(
        &self,
        x0: &[f64],
        predictor: &dyn Predictor,
        options: &ComputeOptions,
        rng: &mut R,
        observer: &dyn ProgressObserver,
    ) -> Result<InfluenceScores, InfluenceError>
    where
        R: Rng + ?Sized,
    {
        let config = self.resolve(options, rng)?;
        self.run(x0, predictor, &config, rng, observer)
    }

    /// Runs a computation with an already resolved configuration.
    ///
    /// A point whose width differs from the pool's is rejected before any
    /// prediction.
    pub fn run<R>(
        &self,
        x0: &[f64],
        predictor: &dyn Predictor,
        config: &RunConfig,
        rng: &mut R,
        observer: &dyn ProgressObserver,
    ) -> Result<InfluenceScores, InfluenceError>
    where
        R: Rng + ?Sized,
    {
        if x0.len() != config.pool.n_features() {
            return Err(InfluenceError::Shape(ShapeError::RaggedRow {
                row: 0,
                expected: config.pool.n_features(),
                found: x0.len(),
            }));
        }

        let game = InfluenceGame::new(x0, &config.pool, predictor, self.qoi.active());
        let tracker = ProgressTracker::new(observer, config.iterations, config.show_approx);

        let mut totals = if config.workers <= 1 {
            run_worker(&game, config, 0, rng, &tracker)?
        } else {
            run_parallel(&game, config, rng, &tracker)?
        };

        // every evaluated feature is reported, visited or not
        for &feature in &config.features {
            totals.entry(feature).or_insert(0.0);
        }
        #[expect(clippy::cast_precision_loss)]
        let divisor = config.iterations as f64;
        for total in totals.values_mut() {
            *total /= divisor;
        }

        Ok(InfluenceScores {
            method: config.method,
            scores: totals,
            iterations: config.iterations,
            exhaustive: config.feature_exhaustive,
        })
    }
}

fn run_parallel<R>(
    game: &InfluenceGame<'_>,
    config: &RunConfig,
    rng: &mut R,
    tracker: &ProgressTracker<'_>,
) -> Result<Totals, InfluenceError>
where
    R: Rng + ?Sized,
{
    let seeds: Vec<SamplingSeed> = (0..config.workers).map(|_| rng.random()).collect();
    let results: Vec<Result<Totals, InfluenceError>> = thread::scope(|s| {
        let handles: Vec<_> = seeds
            .into_iter()
            .enumerate()
            .map(|(worker, seed)| {
                s.spawn(move || run_worker(game, config, worker, &mut seed.rng(), tracker))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect()
    });

    let mut merged = Totals::new();
    for result in results {
        for (feature, total) in result? {
            *merged.entry(feature).or_insert(0.0) += total;
        }
    }
    Ok(merged)
}

/// Processes the share of iterations assigned to `worker`.
///
/// Exact enumeration hands out sample `i` to worker `i % workers`. Random
/// sampling splits the budget as evenly as possible.
fn run_worker<R>(
    game: &InfluenceGame<'_>,
    config: &RunConfig,
    worker: usize,
    rng: &mut R,
    tracker: &ProgressTracker<'_>,
) -> Result<Totals, InfluenceError>
where
    R: Rng + ?Sized,
{
    let workers = config.workers.max(1);
    let mut totals = Totals::new();
    if config.feature_exhaustive {
        let samples = exact_samples(config.method, &config.features)
            .take(config.iterations)
            .skip(worker)
            .step_by(workers);
        for sample in samples {
            accumulate(game, config.method, &sample, &mut totals, tracker)?;
        }
    } else {
        let share = config.iterations / workers + usize::from(worker < config.iterations % workers);
        for _ in 0..share {
            let sample = random_sample(config.method, &config.features, rng);
            accumulate(game, config.method, &sample, &mut totals, tracker)?;
        }
    }
    Ok(totals)
}

fn accumulate(
    game: &InfluenceGame<'_>,
    method: Method,
    sample: &[usize],
    totals: &mut Totals,
    tracker: &ProgressTracker<'_>,
) -> Result<(), InfluenceError> {
    let mut delta = 0.0;
    for (feature, coalition) in coalitions(method, sample) {
        let contribution = game.marginal_contribution(feature, &coalition)?;
        *totals.entry(feature).or_insert(0.0) += contribution;
        delta += contribution;
    }
    tracker.record(delta);
    Ok(())
}
