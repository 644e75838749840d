use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2, Zip};

use crate::algorithms::strategy::{ensure_finite, InterpolationStrategy, Method};
use crate::errors::InterpError;
use crate::samples::SampleSet;

/// Multiquadric basis `sqrt((r/epsilon)^2 + 1)`.
#[inline]
pub fn multiquadric(r: f64, epsilon: f64) -> f64
{
    let scaled = r / epsilon;
    (scaled * scaled + 1.0).sqrt()
}

///
/// Shape parameter: the side of the square each sample would occupy if the bounding box were
/// shared out evenly. Collinear or coincident samples fall back to the mean pairwise distance,
/// and to one if that is degenerate too.
///
pub fn default_epsilon(samples: &SampleSet) -> f64
{
    let n = samples.len();
    if let Some(extent) = samples.extent()
    {
        let area = extent.width() * extent.height();
        let epsilon = (area / n as f64).sqrt();
        if epsilon.is_finite() && epsilon > 0.0
        {
            return epsilon;
        }
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..n
    {
        for j in (i + 1)..n
        {
            total += samples.distance_to(i, samples.xs()[j], samples.ys()[j]);
            pairs += 1;
        }
    }
    let mean = if pairs > 0 { total / pairs as f64 } else { 0.0 };
    if mean.is_finite() && mean > 0.0 { mean } else { 1.0 }
}

///
/// Radial basis interpolant. The weights are solved once over the whole sample set, after
/// which evaluation only reads them.
///
pub struct RbfInterpolator<'a>
{
    samples: &'a SampleSet,
    epsilon: f64,
    smooth: f64,
    weights: DVector<f64>,
}

impl<'a> RbfInterpolator<'a>
{
    ///
    /// Fit to `samples` with smoothing `smooth` (zero interpolates exactly). Fails on an empty
    /// sample set or when the basis matrix is singular, e.g. for duplicate sample locations.
    ///
    pub fn fit(samples: &'a SampleSet, smooth: f64) -> Result<Self, InterpError>
    {
        Self::fit_with_epsilon(samples, smooth, default_epsilon(samples))
    }

    pub fn fit_with_epsilon(samples: &'a SampleSet, smooth: f64, epsilon: f64) -> Result<Self, InterpError>
    {
        let n = samples.len();
        if n == 0
        {
            return Err(InterpError::EmptySamples);
        }
        let (xs, ys) = (samples.xs(), samples.ys());
        let a = DMatrix::from_fn(n, n, |i, j|
        {
            let phi = multiquadric(samples.distance_to(i, xs[j], ys[j]), epsilon);
            if i == j { phi - smooth } else { phi }
        });
        let b = DVector::from_column_slice(samples.signals());
        let weights = a.lu().solve(&b).ok_or(InterpError::SingularSystem)?;
        if weights.iter().any(|w| !w.is_finite())
        {
            return Err(InterpError::SingularSystem);
        }
        Ok(Self { samples, epsilon, smooth, weights })
    }

    pub fn epsilon(&self) -> f64
    {
        self.epsilon
    }

    pub fn smooth(&self) -> f64
    {
        self.smooth
    }

    #[inline]
    pub fn value_at(&self, x: f64, y: f64) -> f64
    {
        self.weights.iter().enumerate().map(|(i, w)| w * multiquadric(self.samples.distance_to(i, x, y), self.epsilon)).sum()
    }
}

impl InterpolationStrategy for RbfInterpolator<'_>
{
    fn method(&self) -> Method
    {
        Method::Rbf
    }

    fn evaluate(&self, xi: ArrayView2<f64>, yi: ArrayView2<f64>) -> Result<Array2<f64>, InterpError>
    {
        let mut out = Array2::zeros(xi.dim());
        Zip::from(&mut out).and(&xi).and(&yi).for_each(|o, &x, &y| *o = self.value_at(x, y));
        ensure_finite(&out)?;
        Ok(out)
    }
}

#[cfg(test)]
use approx::assert_abs_diff_eq;

#[cfg(test)]
fn scattered() -> SampleSet
{
    SampleSet::from_columns(
        vec![0.0, 4.0, 1.5, 3.0, 0.5, 2.2],
        vec![0.0, 0.5, 2.0, 3.5, 3.0, 1.1],
        vec![90.0, 35.0, 60.0, 20.0, 75.0, 55.0],
    ).unwrap()
}

#[test]
fn exact_at_samples_without_smoothing()
{
    let samples = scattered();
    let rbf = RbfInterpolator::fit(&samples, 0.0).unwrap();
    for p in samples.iter()
    {
        assert_abs_diff_eq!(rbf.value_at(p.x, p.y), p.signal, epsilon = 1e-6);
    }
}

#[test]
fn smoothing_relaxes_the_fit()
{
    let samples = scattered();
    let exact = RbfInterpolator::fit(&samples, 0.0).unwrap();
    let smooth = RbfInterpolator::fit(&samples, 0.5).unwrap();
    let p = samples.point(2);
    assert!((exact.value_at(p.x, p.y) - smooth.value_at(p.x, p.y)).abs() > 1e-6);
    assert_eq!(smooth.smooth(), 0.5);
}

#[test]
fn epsilon_heuristic()
{
    let samples = SampleSet::from_columns(vec![0.0, 4.0, 0.0, 4.0], vec![0.0, 0.0, 4.0, 4.0], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_abs_diff_eq!(default_epsilon(&samples), 2.0, epsilon = 1e-12);

    let collinear = SampleSet::from_columns(vec![0.0, 3.0], vec![1.0, 1.0], vec![1.0, 2.0]).unwrap();
    assert_abs_diff_eq!(default_epsilon(&collinear), 3.0, epsilon = 1e-12);

    let single = SampleSet::from_columns(vec![1.0], vec![1.0], vec![1.0]).unwrap();
    assert_eq!(default_epsilon(&single), 1.0);
}

#[test]
fn duplicate_locations_are_singular()
{
    let samples = SampleSet::from_columns(vec![1.0, 1.0, 2.0], vec![1.0, 1.0, 0.0], vec![10.0, 20.0, 30.0]).unwrap();
    assert_eq!(RbfInterpolator::fit(&samples, 0.0).err(), Some(InterpError::SingularSystem));
    assert_eq!(RbfInterpolator::fit(&SampleSet::default(), 0.0).err(), Some(InterpError::EmptySamples));
}

#[test]
fn evaluate_keeps_shape()
{
    let samples = scattered();
    let rbf = RbfInterpolator::fit(&samples, 0.1).unwrap();
    let xi = Array2::from_shape_fn((4, 7), |(_, c)| c as f64 * 0.6);
    let yi = Array2::from_shape_fn((4, 7), |(r, _)| r as f64);
    let values = rbf.evaluate(xi.view(), yi.view()).unwrap();
    assert_eq!(values.dim(), (4, 7));
    assert_eq!(rbf.method(), Method::Rbf);
}
