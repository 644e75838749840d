use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use ndarray::{s, Array2};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::adaptive::{calculate_adaptive_smooth, calculate_resolution};
use crate::algorithms::idw::IdwInterpolator;
#[cfg(feature = "kriging")]
use crate::algorithms::kriging::KrigingInterpolator;
use crate::algorithms::rbf::RbfInterpolator;
use crate::algorithms::strategy::{InterpolationStrategy, Method};
use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::EngineConfig;
use crate::errors::InterpError;
use crate::grids::coordinates::GridCoordinates;
use crate::grids::partition::{self, Chunk};
use crate::samples::{Extent, SampleSet};

/// Lower bound of every returned grid value.
pub const SIGNAL_MIN: f64 = 0.0;
/// Upper bound of every returned grid value.
pub const SIGNAL_MAX: f64 = 100.0;

///
/// Optional backends compiled into this build. Determined once when the engine is built.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities
{
    pub kriging: bool,
}

impl Capabilities
{
    pub fn probe() -> Self
    {
        Self { kriging: cfg!(feature = "kriging") }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason
{
    /// The backend is not part of this build or was disabled.
    Unavailable,
    /// Fitting the model failed.
    FitFailed(InterpError),
}

/// A method that was requested but replaced by another one.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback
{
    pub requested: Method,
    pub used: Method,
    pub reason: FallbackReason,
}

/// A chunk whose evaluation failed and was zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure
{
    pub chunk: Chunk,
    pub error: InterpError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source
{
    /// Returned from the result cache.
    Cache,
    /// No samples were given; the grid is all zeros and was not cached.
    NoSamples,
    /// Computed by `method`, possibly after falling back from the requested one.
    Computed { method: Method, fallbacks: Vec<Fallback>, failed_chunks: Vec<ChunkFailure> },
}

/// A grid together with a description of how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation
{
    pub grid: Array2<f64>,
    pub source: Source,
}

impl Interpolation
{
    /// True when the result came from the requested method with every chunk intact.
    pub fn is_exact(&self) -> bool
    {
        match &self.source
        {
            Source::Cache => true,
            Source::NoSamples => false,
            Source::Computed { fallbacks, failed_chunks, .. } => fallbacks.is_empty() && failed_chunks.is_empty(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String
{
    if let Some(s) = payload.downcast_ref::<&str>()
    {
        s.to_string()
    }
    else if let Some(s) = payload.downcast_ref::<String>()
    {
        s.clone()
    }
    else
    {
        "unknown panic payload".to_string()
    }
}

///
/// Interpolates scattered samples onto dense grids in parallel. Owns a fixed-size worker pool
/// and a FIFO cache of earlier results; both live as long as the engine.
///
pub struct ParallelInterpolationEngine
{
    config: EngineConfig,
    capabilities: Capabilities,
    pool: ThreadPool,
    cache: ResultCache,
}

impl ParallelInterpolationEngine
{
    pub fn new(config: EngineConfig) -> Result<Self, InterpError>
    {
        Self::with_capabilities(config, Capabilities::probe())
    }

    ///
    /// Build with a restricted set of backends. Capabilities not compiled into this build stay
    /// disabled whatever `capabilities` says.
    ///
    pub fn with_capabilities(config: EngineConfig, capabilities: Capabilities) -> Result<Self, InterpError>
    {
        config.validate()?;
        let probed = Capabilities::probe();
        let capabilities = Capabilities { kriging: capabilities.kriging && probed.kriging };
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_workers)
            .thread_name(|i| format!("heatgrid-worker-{i}"))
            .build()
            .map_err(|e| InterpError::ThreadPool(e.to_string()))?;
        tracing::debug!(workers = config.max_workers, chunk_size = config.chunk_size, kriging = capabilities.kriging, "interpolation engine ready");
        Ok(Self { cache: ResultCache::new(config.cache_capacity), config, capabilities, pool })
    }

    pub fn config(&self) -> &EngineConfig
    {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities
    {
        self.capabilities
    }

    pub fn cache_stats(&self) -> CacheStats
    {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self)
    {
        self.cache.clear();
    }

    ///
    /// Interpolate `samples` onto `grid`. The result has the grid's shape and every value lies
    /// in `[0, 100]`.
    ///
    pub fn interpolate(&mut self, samples: &SampleSet, grid: &GridCoordinates, method: Method, smooth: f64) -> Array2<f64>
    {
        self.interpolate_detailed(samples, grid, method, smooth, None).grid
    }

    ///
    /// Interpolate from raw sample columns. Fails with `LengthMismatch` when the columns differ
    /// in length; that is the only failure this call reports.
    ///
    pub fn interpolate_columns(&mut self, xs: &[f64], ys: &[f64], signals: &[f64], grid: &GridCoordinates, method: Method, smooth: f64) -> Result<Array2<f64>, InterpError>
    {
        let samples = SampleSet::from_columns(xs.to_vec(), ys.to_vec(), signals.to_vec())?;
        Ok(self.interpolate(&samples, grid, method, smooth))
    }

    ///
    /// As `interpolate`, calling `progress(completed, total)` once per finished chunk, in
    /// completion order. Cache hits do not report progress.
    ///
    pub fn interpolate_with_progress(&mut self, samples: &SampleSet, grid: &GridCoordinates, method: Method, smooth: f64, progress: &mut dyn FnMut(usize, usize)) -> Array2<f64>
    {
        self.interpolate_detailed(samples, grid, method, smooth, Some(progress)).grid
    }

    ///
    /// Build a grid for a sample area of the given extent: resolution and smoothing are chosen
    /// from the data, then the samples are interpolated onto it.
    ///
    pub fn interpolate_area(&mut self, samples: &SampleSet, area: Extent, method: Method) -> (GridCoordinates, Array2<f64>)
    {
        let (x_res, y_res) = calculate_resolution(samples.len(), area.width(), area.height());
        let smooth = calculate_adaptive_smooth(samples.signals());
        let grid = GridCoordinates::linspace((area.x_min, area.x_max), (area.y_min, area.y_max), x_res, y_res);
        let values = self.interpolate(samples, &grid, method, smooth);
        (grid, values)
    }

    ///
    /// Full interpolation pipeline, reporting where the grid came from: the cache, or which
    /// method computed it, which fallbacks happened and which chunks had to be zero-filled.
    ///
    pub fn interpolate_detailed(&mut self, samples: &SampleSet, grid: &GridCoordinates, method: Method, smooth: f64, progress: Option<&mut dyn FnMut(usize, usize)>) -> Interpolation
    {
        let (rows, cols) = grid.shape();
        let span = tracing::info_span!("interpolate", method = %method, rows, cols, samples = samples.len());
        let _guard = span.enter();

        let key = CacheKey::new(samples, (rows, cols), method, smooth);
        if let Some(cached) = self.cache.get(&key)
        {
            tracing::debug!(key = key.digest(), "cache hit");
            return Interpolation { grid: cached, source: Source::Cache };
        }
        tracing::debug!(key = key.digest(), "cache miss");

        if samples.is_empty()
        {
            tracing::warn!("no samples supplied, returning an empty heatmap");
            return Interpolation { grid: Array2::zeros((rows, cols)), source: Source::NoSamples };
        }

        let chunks = partition::split(rows, cols, self.config.chunk_size);
        let (strategy, fallbacks) = self.select_strategy(samples, method, smooth);
        tracing::debug!(chunks = chunks.len(), using = %strategy.method(), "dispatching chunks");
        let (mut values, failed_chunks) = self.dispatch(strategy.as_ref(), grid, &chunks, progress);
        values.mapv_inplace(|v| if v.is_nan() { SIGNAL_MIN } else { v.clamp(SIGNAL_MIN, SIGNAL_MAX) });

        self.cache.add(key, values.clone());
        Interpolation { grid: values, source: Source::Computed { method: strategy.method(), fallbacks, failed_chunks } }
    }

    ///
    /// Resolve `method` to a fitted strategy. Kriging degrades to RBF without smoothing, and
    /// RBF degrades to IDW, which always succeeds.
    ///
    fn select_strategy<'a>(&self, samples: &'a SampleSet, method: Method, smooth: f64) -> (Box<dyn InterpolationStrategy + 'a>, Vec<Fallback>)
    {
        let mut fallbacks = Vec::new();
        let mut smooth = smooth;
        if method == Method::Kriging
        {
            match self.fit_kriging(samples)
            {
                Ok(kriging) => return (kriging, fallbacks),
                Err(reason) =>
                {
                    tracing::warn!(?reason, "kriging unavailable, falling back to rbf");
                    fallbacks.push(Fallback { requested: Method::Kriging, used: Method::Rbf, reason });
                    smooth = 0.0;
                },
            }
        }
        if method != Method::Idw
        {
            match RbfInterpolator::fit(samples, smooth)
            {
                Ok(rbf) => return (Box::new(rbf), fallbacks),
                Err(error) =>
                {
                    tracing::warn!(%error, "rbf fit failed, falling back to idw");
                    fallbacks.push(Fallback { requested: Method::Rbf, used: Method::Idw, reason: FallbackReason::FitFailed(error) });
                },
            }
        }
        let idw = match IdwInterpolator::new(samples, self.config.idw())
        {
            Ok(idw) => idw,
            Err(error) =>
            {
                tracing::warn!(%error, "neighbour index unavailable, weighting all samples");
                IdwInterpolator::exhaustive(samples, self.config.idw_power)
            },
        };
        (Box::new(idw), fallbacks)
    }

    #[cfg(feature = "kriging")]
    fn fit_kriging<'a>(&self, samples: &'a SampleSet) -> Result<Box<dyn InterpolationStrategy + 'a>, FallbackReason>
    {
        if !self.capabilities.kriging
        {
            return Err(FallbackReason::Unavailable);
        }
        match KrigingInterpolator::fit(samples)
        {
            Ok(kriging) => Ok(Box::new(kriging)),
            Err(error) => Err(FallbackReason::FitFailed(error)),
        }
    }

    #[cfg(not(feature = "kriging"))]
    fn fit_kriging<'a>(&self, _samples: &'a SampleSet) -> Result<Box<dyn InterpolationStrategy + 'a>, FallbackReason>
    {
        Err(FallbackReason::Unavailable)
    }

    ///
    /// Evaluate every chunk on the worker pool. Workers only compute; results travel back over
    /// a channel and this thread writes each one into its own region of the output, so no two
    /// writes ever overlap.
    ///
    fn dispatch(&self, strategy: &dyn InterpolationStrategy, grid: &GridCoordinates, chunks: &[Chunk], mut progress: Option<&mut dyn FnMut(usize, usize)>) -> (Array2<f64>, Vec<ChunkFailure>)
    {
        let total = chunks.len();
        let mut values = Array2::zeros(grid.shape());
        let mut failures = Vec::new();
        let (tx, rx) = mpsc::channel::<(usize, Result<Array2<f64>, InterpError>)>();

        self.pool.in_place_scope(|scope|
        {
            for (index, chunk) in chunks.iter().enumerate()
            {
                let tx = tx.clone();
                scope.spawn(move |_|
                {
                    let (xi, yi) = grid.chunk_views(chunk);
                    let result = panic::catch_unwind(AssertUnwindSafe(|| strategy.evaluate(xi, yi)))
                        .unwrap_or_else(|payload| Err(InterpError::WorkerPanic(panic_message(&*payload))));
                    // the receiver is alive until every sender is gone
                    let _ = tx.send((index, result));
                });
            }
            drop(tx);

            for (done, (index, result)) in rx.iter().enumerate()
            {
                let chunk = chunks[index];
                let expected = (chunk.rows(), chunk.cols());
                let outcome = match result
                {
                    Ok(block) if block.dim() == expected => Ok(block),
                    Ok(block) => Err(InterpError::ChunkShapeMismatch { expected, got: block.dim() }),
                    Err(error) => Err(error),
                };
                match outcome
                {
                    Ok(block) => values.slice_mut(s![chunk.row_range(), chunk.col_range()]).assign(&block),
                    Err(error) =>
                    {
                        tracing::warn!(row_start = chunk.row_start, col_start = chunk.col_start, %error, "chunk failed, filling with zeros");
                        failures.push(ChunkFailure { chunk, error });
                    },
                }
                if let Some(report) = progress.as_deref_mut()
                {
                    report(done + 1, total);
                }
            }
        });
        (values, failures)
    }
}

#[cfg(test)]
struct Flaky;

#[cfg(test)]
impl InterpolationStrategy for Flaky
{
    fn method(&self) -> Method
    {
        Method::Idw
    }

    fn evaluate(&self, xi: ndarray::ArrayView2<f64>, _yi: ndarray::ArrayView2<f64>) -> Result<Array2<f64>, InterpError>
    {
        let corner = xi[(0, 0)];
        if corner >= 4.0 && corner < 6.0
        {
            return Err(InterpError::SingularSystem);
        }
        if corner >= 8.0
        {
            panic!("flaky chunk");
        }
        Ok(Array2::from_elem(xi.dim(), 250.0))
    }
}

#[test]
fn failing_chunks_are_zero_filled()
{
    let engine = ParallelInterpolationEngine::new(EngineConfig::default().with_max_workers(3).with_chunk_size(2)).unwrap();
    let grid = GridCoordinates::linspace((0.0, 9.0), (0.0, 3.0), 10, 4);
    let chunks = partition::split(4, 10, 2);
    let mut calls = Vec::new();
    let mut progress = |done: usize, total: usize| calls.push((done, total));
    let (values, failures) = engine.dispatch(&Flaky, &grid, &chunks, Some(&mut progress));

    assert_eq!(values.dim(), (4, 10));
    assert_eq!(failures.len(), 4);
    assert!(failures.iter().any(|f| matches!(f.error, InterpError::WorkerPanic(_))));
    assert!(failures.iter().any(|f| f.error == InterpError::SingularSystem));
    for r in 0..4
    {
        for c in 0..10
        {
            let expected = if (4..6).contains(&c) || c >= 8 { 0.0 } else { 250.0 };
            assert_eq!(values[(r, c)], expected, "cell ({r}, {c})");
        }
    }
    assert_eq!(calls, (1..=10).map(|i| (i, 10)).collect::<Vec<_>>());
}

#[test]
fn zero_workers_is_a_validation_error()
{
    let err = ParallelInterpolationEngine::new(EngineConfig::default().with_max_workers(0)).err().unwrap();
    assert!(err.is_validation());
}
