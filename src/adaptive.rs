//!
//! Heuristics for picking a grid resolution and an RBF smoothing factor from the data. Both
//! are pure functions.
//!

/// No grid dimension is ever coarser than this.
pub const MIN_RESOLUTION: usize = 20;
/// Upper bound on the base resolution for large sample counts.
pub const MAX_RESOLUTION: usize = 150;

///
/// Choose `(x_res, y_res)` for `num_points` samples spread over `x_range` by `y_range`.
///
/// The base resolution grows with the number of samples. Elongated areas keep the base along
/// their long side and scale the short side by the aspect ratio. Neither dimension drops below
/// `MIN_RESOLUTION`.
///
pub fn calculate_resolution(num_points: usize, x_range: f64, y_range: f64) -> (usize, usize)
{
    let base = match num_points
    {
        0..=9 => 30,
        10..=49 => 50,
        50..=99 => 80,
        n => MAX_RESOLUTION.min(((n as f64).sqrt() * 10.0).round() as usize),
    };

    let aspect = if y_range > 0.0 { x_range / y_range } else { 1.0 };
    let (x_res, y_res) = if aspect > 1.5
    {
        (base, (base as f64 / aspect) as usize)
    }
    else if aspect < 0.667
    {
        ((base as f64 * aspect) as usize, base)
    }
    else
    {
        (base, base)
    };
    (x_res.max(MIN_RESOLUTION), y_res.max(MIN_RESOLUTION))
}

///
/// Smoothing factor for the RBF fit, stepped on the population standard deviation of the
/// signal values. Empty input or a NaN standard deviation gives `0.0`.
///
pub fn calculate_adaptive_smooth(signals: &[f64]) -> f64
{
    if signals.is_empty()
    {
        tracing::debug!("no signal values, using zero smoothing");
        return 0.0;
    }
    let n = signals.len() as f64;
    let mean = signals.iter().sum::<f64>() / n;
    let std = (signals.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std.is_nan()
    {
        tracing::debug!("signal standard deviation is NaN, using zero smoothing");
        return 0.0;
    }
    if std < 5.0
    {
        0.0
    }
    else if std < 10.0
    {
        0.1
    }
    else if std < 20.0
    {
        0.3
    }
    else
    {
        0.5
    }
}

#[test]
fn resolution_buckets()
{
    assert_eq!(calculate_resolution(5, 10.0, 10.0), (30, 30));
    assert_eq!(calculate_resolution(30, 10.0, 10.0), (50, 50));
    assert_eq!(calculate_resolution(80, 10.0, 10.0), (80, 80));
    assert_eq!(calculate_resolution(100, 10.0, 10.0), (100, 100));
    let (x, y) = calculate_resolution(500, 10.0, 10.0);
    assert!(x <= MAX_RESOLUTION && y <= MAX_RESOLUTION);
    assert_eq!(calculate_resolution(10_000, 10.0, 10.0), (150, 150));
}

#[test]
fn resolution_follows_aspect_ratio()
{
    assert_eq!(calculate_resolution(80, 20.0, 10.0), (80, 40));
    assert_eq!(calculate_resolution(80, 10.0, 20.0), (40, 80));
    assert_eq!(calculate_resolution(80, 12.0, 10.0), (80, 80));
    // extreme aspect ratios bottom out at the minimum
    assert_eq!(calculate_resolution(5, 100.0, 1.0), (30, MIN_RESOLUTION));
    assert_eq!(calculate_resolution(5, 0.0, 10.0), (MIN_RESOLUTION, 30));
    assert_eq!(calculate_resolution(5, 10.0, 0.0), (30, 30));
}

#[test]
fn smoothing_steps()
{
    assert_eq!(calculate_adaptive_smooth(&[50.0, 51.0, 49.0, 50.0, 52.0]), 0.0);
    assert_eq!(calculate_adaptive_smooth(&[40.0, 52.0, 48.0, 60.0, 45.0]), 0.1);
    assert_eq!(calculate_adaptive_smooth(&[30.0, 60.0, 45.0, 70.0, 40.0]), 0.3);
    assert_eq!(calculate_adaptive_smooth(&[0.0, 100.0, 20.0, 80.0, 10.0]), 0.5);
}

#[test]
fn smoothing_degenerate_input()
{
    assert_eq!(calculate_adaptive_smooth(&[]), 0.0);
    assert_eq!(calculate_adaptive_smooth(&[42.0]), 0.0);
    assert_eq!(calculate_adaptive_smooth(&[10.0, f64::NAN, 90.0]), 0.0);
}
