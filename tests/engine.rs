use std::sync::Once;

use approx::assert_abs_diff_eq;
use heatgrid::adaptive::calculate_resolution;
use heatgrid::engine::{Capabilities, FallbackReason};
use heatgrid::{EngineConfig, Extent, GridCoordinates, InterpError, Method, ParallelInterpolationEngine, SamplePoint, SampleSet, Source};
use proptest::prelude::*;

static TRACING: Once = Once::new();

fn init_tracing()
{
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
    });
}

fn engine(chunk_size: usize) -> ParallelInterpolationEngine
{
    init_tracing();
    ParallelInterpolationEngine::new(EngineConfig::default().with_max_workers(4).with_chunk_size(chunk_size)).unwrap()
}

fn office() -> SampleSet
{
    SampleSet::from_points(&[
        SamplePoint::new(0.5, 0.5, 92.0),
        SamplePoint::new(9.0, 1.0, 41.0),
        SamplePoint::new(4.5, 4.0, 70.0),
        SamplePoint::new(1.0, 7.5, 55.0),
        SamplePoint::new(8.0, 7.0, 23.0),
        SamplePoint::new(5.5, 1.5, 66.0),
        SamplePoint::new(2.5, 3.0, 80.0),
        SamplePoint::new(7.0, 4.5, 38.0),
    ])
}

fn grid() -> GridCoordinates
{
    GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 33, 27)
}

fn all_in_range(values: &ndarray::Array2<f64>) -> bool
{
    values.iter().all(|v| (0.0..=100.0).contains(v))
}

#[test]
fn repeated_call_is_served_from_cache()
{
    let mut engine = engine(8);
    let samples = office();
    let grid = grid();

    let first = engine.interpolate(&samples, &grid, Method::Rbf, 0.1);
    let second = engine.interpolate_detailed(&samples, &grid, Method::Rbf, 0.1, None);

    assert_eq!(second.source, Source::Cache);
    assert_eq!(first.dim(), (27, 33));
    assert!(first.iter().zip(second.grid.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.cache_size), (1, 1, 1));
    assert_eq!(stats.hit_rate, 0.5);
}

#[test]
fn smoothing_is_part_of_the_key()
{
    let mut engine = engine(8);
    let samples = office();
    let grid = grid();
    engine.interpolate(&samples, &grid, Method::Rbf, 0.0);
    let smoothed = engine.interpolate_detailed(&samples, &grid, Method::Rbf, 0.5, None);
    assert_ne!(smoothed.source, Source::Cache);
    assert_eq!(engine.cache_stats().misses, 2);
}

#[test]
fn chunking_does_not_change_the_result()
{
    let samples = office();
    let grid = grid();
    for method in [Method::Idw, Method::Rbf, Method::Kriging]
    {
        let whole = engine(1_000).interpolate(&samples, &grid, method, 0.0);
        let chunked = engine(5).interpolate(&samples, &grid, method, 0.0);
        assert_eq!(whole, chunked, "{method}");
    }
}

#[test]
fn progress_is_reported_once_per_chunk()
{
    let mut engine = engine(10);
    let samples = office();
    let grid = grid();
    let mut calls = Vec::new();
    engine.interpolate_with_progress(&samples, &grid, Method::Idw, 0.0, &mut |done: usize, total: usize| calls.push((done, total)));

    // 27 x 33 in 10 x 10 chunks
    assert_eq!(calls.len(), 12);
    assert!(calls.iter().all(|&(_, total)| total == 12));
    assert_eq!(calls.iter().map(|c| c.0).collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());

    calls.clear();
    engine.interpolate_with_progress(&samples, &grid, Method::Idw, 0.0, &mut |done: usize, total: usize| calls.push((done, total)));
    assert!(calls.is_empty());
}

#[test]
fn values_are_clamped_for_any_signal_magnitude()
{
    let wild = SampleSet::from_columns(
        vec![0.0, 3.0, 6.0, 9.0, 1.5, 7.5],
        vec![0.0, 6.0, 1.0, 7.0, 4.0, 3.0],
        vec![450.0, -300.0, 120.0, -15.0, 900.0, 60.0],
    ).unwrap();
    let mut engine = engine(6);
    for method in [Method::Rbf, Method::Idw, Method::Kriging]
    {
        let values = engine.interpolate(&wild, &grid(), method, 0.0);
        assert!(all_in_range(&values), "{method}");
    }
    let values = engine.interpolate(&office(), &grid(), Method::Rbf, 0.5);
    assert!(all_in_range(&values));
}

proptest!
{
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn generated_signals_stay_in_range(signals in proptest::collection::vec(-1.0e6f64..1.0e6, 6), smooth in 0.0f64..0.5)
    {
        let samples = SampleSet::from_columns(
            vec![0.0, 3.0, 6.0, 9.0, 1.5, 7.5],
            vec![0.0, 6.0, 1.0, 7.0, 4.0, 3.0],
            signals,
        ).unwrap();
        let coarse = GridCoordinates::linspace((-2.0, 12.0), (-2.0, 10.0), 15, 13);
        let mut engine = engine(4);
        for method in [Method::Rbf, Method::Idw, Method::Kriging]
        {
            let values = engine.interpolate(&samples, &coarse, method, smooth);
            prop_assert!(all_in_range(&values), "{}", method);
        }
    }
}

#[test]
fn mirrored_surveys_are_not_served_each_others_grid()
{
    let mut cached = engine(8);
    let grid = GridCoordinates::linspace((-4.0, 4.0), (0.0, 2.0), 9, 3);
    let left = SampleSet::from_columns(vec![-3.0, 3.0], vec![1.0, 1.0], vec![90.0, 10.0]).unwrap();
    let right = SampleSet::from_columns(vec![3.0, -3.0], vec![1.0, 1.0], vec![90.0, 10.0]).unwrap();

    cached.interpolate(&left, &grid, Method::Idw, 0.0);
    let mirrored = cached.interpolate_detailed(&right, &grid, Method::Idw, 0.0, None);
    assert_ne!(mirrored.source, Source::Cache);
    assert_eq!(mirrored.grid, engine(8).interpolate(&right, &grid, Method::Idw, 0.0));
    assert_abs_diff_eq!(mirrored.grid[(1, 1)], 10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(mirrored.grid[(1, 7)], 90.0, epsilon = 1e-6);

    let zero_two = SampleSet::from_columns(vec![-3.0, 3.0], vec![1.0, 1.0], vec![0.0, 2.0]).unwrap();
    let two_zero = SampleSet::from_columns(vec![-3.0, 3.0], vec![1.0, 1.0], vec![2.0, 0.0]).unwrap();
    cached.interpolate(&zero_two, &grid, Method::Idw, 0.0);
    let swapped = cached.interpolate_detailed(&two_zero, &grid, Method::Idw, 0.0, None);
    assert_ne!(swapped.source, Source::Cache);
    assert_abs_diff_eq!(swapped.grid[(1, 1)], 2.0, epsilon = 1e-6);
}

#[test]
fn idw_reproduces_samples_on_grid_nodes()
{
    let samples = SampleSet::from_columns(vec![0.0, 5.0, 10.0], vec![0.0, 4.0, 8.0], vec![90.0, 50.0, 10.0]).unwrap();
    let grid = GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 11, 9);
    let values = engine(4).interpolate(&samples, &grid, Method::Idw, 0.0);
    assert_abs_diff_eq!(values[(0, 0)], 90.0, epsilon = 1e-6);
    assert_abs_diff_eq!(values[(4, 5)], 50.0, epsilon = 1e-6);
    assert_abs_diff_eq!(values[(8, 10)], 10.0, epsilon = 1e-6);
}

#[test]
fn kriging_degrades_to_rbf_when_disabled()
{
    init_tracing();
    let mut engine = ParallelInterpolationEngine::with_capabilities(EngineConfig::default().with_max_workers(2), Capabilities { kriging: false }).unwrap();
    assert!(!engine.capabilities().kriging);

    let samples = office();
    let result = engine.interpolate_detailed(&samples, &grid(), Method::Kriging, 0.3, None);
    match &result.source
    {
        Source::Computed { method, fallbacks, failed_chunks } =>
        {
            assert_eq!(*method, Method::Rbf);
            assert_eq!(fallbacks.len(), 1);
            assert_eq!(fallbacks[0].requested, Method::Kriging);
            assert_eq!(fallbacks[0].reason, FallbackReason::Unavailable);
            assert!(failed_chunks.is_empty());
        },
        other => panic!("unexpected source {other:?}"),
    }
    assert!(!result.is_exact());

    // substituted rbf runs without smoothing
    let rbf = engine.interpolate(&samples, &grid(), Method::Rbf, 0.0);
    assert_eq!(result.grid, rbf);
}

#[test]
fn kriging_fit_failure_degrades_to_rbf()
{
    let mut engine = engine(16);
    let two = SampleSet::from_columns(vec![1.0, 8.0], vec![1.0, 6.0], vec![80.0, 30.0]).unwrap();
    let result = engine.interpolate_detailed(&two, &grid(), Method::Kriging, 0.0, None);
    match result.source
    {
        Source::Computed { method, fallbacks, .. } =>
        {
            assert_eq!(method, Method::Rbf);
            assert_eq!(fallbacks[0].used, Method::Rbf);
            if engine.capabilities().kriging
            {
                assert!(matches!(fallbacks[0].reason, FallbackReason::FitFailed(InterpError::InsufficientSamples { got: 2, .. })));
            }
        },
        other => panic!("unexpected source {other:?}"),
    }
}

#[cfg(feature = "kriging")]
#[test]
fn kriging_runs_when_available()
{
    let mut engine = engine(9);
    let result = engine.interpolate_detailed(&office(), &grid(), Method::Kriging, 0.0, None);
    assert!(result.is_exact());
    assert!(matches!(result.source, Source::Computed { method: Method::Kriging, .. }));
    assert!(all_in_range(&result.grid));
}

#[test]
fn singular_rbf_degrades_to_idw()
{
    let mut engine = engine(16);
    let duplicated = SampleSet::from_columns(vec![2.0, 2.0, 7.0], vec![3.0, 3.0, 5.0], vec![60.0, 70.0, 20.0]).unwrap();
    let result = engine.interpolate_detailed(&duplicated, &grid(), Method::Rbf, 0.0, None);
    match result.source
    {
        Source::Computed { method, fallbacks, .. } =>
        {
            assert_eq!(method, Method::Idw);
            assert_eq!(fallbacks[0].reason, FallbackReason::FitFailed(InterpError::SingularSystem));
        },
        other => panic!("unexpected source {other:?}"),
    }
    assert!(all_in_range(&result.grid));
}

#[test]
fn mismatched_columns_are_the_only_error()
{
    let mut engine = engine(16);
    let err = engine.interpolate_columns(&[0.0, 1.0, 2.0], &[0.0, 1.0], &[10.0, 20.0, 30.0], &grid(), Method::Idw, 0.0).unwrap_err();
    assert_eq!(err, InterpError::LengthMismatch { xs: 3, ys: 2, signals: 3 });
    assert!(err.is_validation());

    let ok = engine.interpolate_columns(&[0.0, 1.0], &[0.0, 1.0], &[10.0, 20.0], &grid(), Method::Idw, 0.0).unwrap();
    assert_eq!(ok.dim(), (27, 33));
}

#[test]
fn empty_samples_give_a_zero_grid()
{
    let mut engine = engine(16);
    let result = engine.interpolate_detailed(&SampleSet::default(), &grid(), Method::Rbf, 0.0, None);
    assert_eq!(result.source, Source::NoSamples);
    assert_eq!(result.grid.dim(), (27, 33));
    assert!(result.grid.iter().all(|&v| v == 0.0));
    assert_eq!(engine.cache_stats().cache_size, 0);
}

#[test]
fn engine_cache_evicts_oldest_first()
{
    init_tracing();
    let mut engine = ParallelInterpolationEngine::new(EngineConfig::default().with_max_workers(2).with_cache_capacity(2)).unwrap();
    let samples = office();
    let grids = [
        GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 20, 20),
        GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 21, 20),
        GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 22, 20),
    ];
    for g in &grids
    {
        engine.interpolate(&samples, g, Method::Idw, 0.0);
    }
    assert_eq!(engine.cache_stats().cache_size, 2);
    let first_again = engine.interpolate_detailed(&samples, &grids[0], Method::Idw, 0.0, None);
    assert_ne!(first_again.source, Source::Cache);
    let last_again = engine.interpolate_detailed(&samples, &grids[2], Method::Idw, 0.0, None);
    assert_eq!(last_again.source, Source::Cache);

    engine.clear_cache();
    let stats = engine.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.cache_size), (0, 0, 0));
}

#[test]
fn area_heatmap_uses_adaptive_resolution()
{
    let mut engine = engine(25);
    let samples = office();
    let area = Extent { x_min: 0.0, x_max: 30.0, y_min: 0.0, y_max: 10.0 };
    let (grid, values) = engine.interpolate_area(&samples, area, Method::Idw);
    let (x_res, y_res) = calculate_resolution(samples.len(), 30.0, 10.0);
    assert_eq!((x_res, y_res), (30, 20));
    assert_eq!(grid.shape(), (y_res, x_res));
    assert_eq!(values.dim(), (y_res, x_res));
    assert!(all_in_range(&values));
}
