use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::algorithms::strategy::{ensure_finite, InterpolationStrategy, Method};
use crate::errors::InterpError;
use crate::samples::SampleSet;

/// Number of lag bins in the experimental semivariogram.
pub const LAG_BINS: usize = 6;
const RANGE_STEPS: usize = 48;
const MIN_SAMPLES: usize = 3;

///
/// Exponential variogram `gamma(h) = nugget + sill * (1 - exp(-3h / range))`, zero at the
/// origin. `range` is the practical range, where 95% of the sill is reached.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialVariogram
{
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl ExponentialVariogram
{
    pub fn new(nugget: f64, sill: f64, range: f64) -> Self
    {
        Self { nugget, sill, range }
    }

    #[inline]
    fn shape(h: f64, range: f64) -> f64
    {
        1.0 - (-3.0 * h / range).exp()
    }

    #[inline]
    pub fn gamma(&self, h: f64) -> f64
    {
        if h < 1e-10
        {
            0.0
        }
        else
        {
            self.nugget + self.sill * Self::shape(h, self.range)
        }
    }

    ///
    /// Least-squares fit to the binned experimental semivariogram of `samples`. For each
    /// candidate range the nugget and sill follow from a linear fit; the range with the smallest
    /// residual wins.
    ///
    pub fn fit(samples: &SampleSet) -> Result<Self, InterpError>
    {
        let n = samples.len();
        if n < MIN_SAMPLES
        {
            return Err(InterpError::InsufficientSamples { got: n, need: MIN_SAMPLES });
        }
        let (lags, semivariances) = experimental_semivariogram(samples);
        let max_lag = lags.iter().cloned().fold(0.0, f64::max);
        if lags.is_empty() || max_lag <= 0.0
        {
            return Err(InterpError::DegenerateVariogram("all samples share one location".into()));
        }

        let mut best: Option<(f64, Self)> = None;
        for step in 0..RANGE_STEPS
        {
            let range = max_lag * (0.1 + 1.9 * step as f64 / (RANGE_STEPS - 1) as f64);
            let f: Vec<f64> = lags.iter().map(|&h| Self::shape(h, range)).collect();
            let Some((nugget, sill)) = linear_fit(&f, &semivariances) else { continue };
            if sill <= 0.0
            {
                continue;
            }
            let model = Self::new(nugget, sill, range);
            let residual: f64 = lags.iter().zip(&semivariances).map(|(&h, &g)| (model.nugget + model.sill * Self::shape(h, range) - g).powi(2)).sum();
            if best.as_ref().map_or(true, |(r, _)| residual < *r)
            {
                best = Some((residual, model));
            }
        }
        best.map(|(_, model)| model).ok_or_else(|| InterpError::DegenerateVariogram("signal has no spatial variance".into()))
    }
}

///
/// Mean lag and mean semivariance `0.5 * (z_i - z_j)^2` per non-empty bin, with `LAG_BINS`
/// equal-width bins between the smallest and largest pairwise distance.
///
fn experimental_semivariogram(samples: &SampleSet) -> (Vec<f64>, Vec<f64>)
{
    let n = samples.len();
    let (xs, ys, z) = (samples.xs(), samples.ys(), samples.signals());
    let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n
    {
        for j in (i + 1)..n
        {
            pairs.push((samples.distance_to(i, xs[j], ys[j]), 0.5 * (z[i] - z[j]).powi(2)));
        }
    }
    let lo = pairs.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let hi = pairs.iter().map(|p| p.0).fold(0.0, f64::max);
    let width = (hi - lo) / LAG_BINS as f64;

    let mut sums = [(0.0, 0.0, 0usize); LAG_BINS];
    for &(h, g) in &pairs
    {
        let bin = if width > 0.0 { (((h - lo) / width) as usize).min(LAG_BINS - 1) } else { 0 };
        sums[bin].0 += h;
        sums[bin].1 += g;
        sums[bin].2 += 1;
    }
    sums.iter().filter(|s| s.2 > 0).map(|&(h, g, c)| (h / c as f64, g / c as f64)).unzip()
}

/// Fit `g = a + b*f` with `a >= 0`; returns `(a, b)`.
fn linear_fit(f: &[f64], g: &[f64]) -> Option<(f64, f64)>
{
    let m = f.len() as f64;
    let (sf, sg) = (f.iter().sum::<f64>(), g.iter().sum::<f64>());
    let sff: f64 = f.iter().map(|v| v * v).sum();
    let sfg: f64 = f.iter().zip(g).map(|(a, b)| a * b).sum();
    let det = m * sff - sf * sf;
    if det.abs() > 1e-12
    {
        let a = (sg * sff - sf * sfg) / det;
        let b = (m * sfg - sf * sg) / det;
        if a >= 0.0
        {
            return Some((a, b));
        }
    }
    // nugget pinned at zero
    if sff > 0.0 { Some((0.0, sfg / sff)) } else { None }
}

///
/// Ordinary kriging. The kriging system is inverted once at fit time; because the system is
/// symmetric, the estimate at a query reduces to a dot product between the query's variogram
/// vector and precomputed coefficients.
///
pub struct KrigingInterpolator<'a>
{
    samples: &'a SampleSet,
    variogram: ExponentialVariogram,
    coefficients: DVector<f64>,
}

impl<'a> KrigingInterpolator<'a>
{
    pub fn fit(samples: &'a SampleSet) -> Result<Self, InterpError>
    {
        let variogram = ExponentialVariogram::fit(samples)?;
        Self::with_variogram(samples, variogram)
    }

    pub fn with_variogram(samples: &'a SampleSet, variogram: ExponentialVariogram) -> Result<Self, InterpError>
    {
        let n = samples.len();
        if n == 0
        {
            return Err(InterpError::EmptySamples);
        }
        let (xs, ys) = (samples.xs(), samples.ys());
        let mut k = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n
        {
            for j in 0..n
            {
                k[(i, j)] = variogram.gamma(samples.distance_to(i, xs[j], ys[j]));
            }
            k[(i, n)] = 1.0;
            k[(n, i)] = 1.0;
        }
        let k_inv = k.try_inverse().ok_or(InterpError::SingularSystem)?;
        let z = DVector::from_iterator(n + 1, samples.signals().iter().cloned().chain(std::iter::once(0.0)));
        let coefficients = k_inv * z;
        if coefficients.iter().any(|c| !c.is_finite())
        {
            return Err(InterpError::SingularSystem);
        }
        Ok(Self { samples, variogram, coefficients })
    }

    pub fn variogram(&self) -> &ExponentialVariogram
    {
        &self.variogram
    }

    #[inline]
    pub fn value_at(&self, x: f64, y: f64) -> f64
    {
        let n = self.samples.len();
        let mut value = self.coefficients[n];
        for i in 0..n
        {
            value += self.coefficients[i] * self.variogram.gamma(self.samples.distance_to(i, x, y));
        }
        value
    }
}

impl InterpolationStrategy for KrigingInterpolator<'_>
{
    fn method(&self) -> Method
    {
        Method::Kriging
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
fn field() -> SampleSet
{
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut z = Vec::new();
    for i in 0..5
    {
        for j in 0..5
        {
            let (x, y) = (i as f64 * 2.0 + 0.3 * j as f64, j as f64 * 2.0);
            xs.push(x);
            ys.push(y);
            z.push(90.0 - 4.0 * x - 2.5 * y + (x * 0.7).sin() * 3.0);
        }
    }
    SampleSet::from_columns(xs, ys, z).unwrap()
}

#[test]
fn variogram_shape()
{
    let model = ExponentialVariogram::new(0.5, 10.0, 30.0);
    assert_eq!(model.gamma(0.0), 0.0);
    assert_abs_diff_eq!(model.gamma(30.0), 0.5 + 10.0 * (1.0 - (-3.0f64).exp()), epsilon = 1e-12);
    assert!(model.gamma(5.0) < model.gamma(10.0));
    assert!((model.gamma(1e4) - 10.5).abs() < 1e-9);
}

#[test]
fn fitted_variogram_is_sane()
{
    let samples = field();
    let model = ExponentialVariogram::fit(&samples).unwrap();
    assert!(model.sill > 0.0);
    assert!(model.nugget >= 0.0);
    assert!(model.range > 0.0);
}

#[test]
fn exact_at_samples()
{
    let samples = field();
    let kriging = KrigingInterpolator::fit(&samples).unwrap();
    for p in samples.iter()
    {
        assert_abs_diff_eq!(kriging.value_at(p.x, p.y), p.signal, epsilon = 1e-6);
    }
}

#[test]
fn fit_failures()
{
    let two = SampleSet::from_columns(vec![0.0, 1.0], vec![0.0, 1.0], vec![10.0, 20.0]).unwrap();
    assert_eq!(KrigingInterpolator::fit(&two).err(), Some(InterpError::InsufficientSamples { got: 2, need: 3 }));

    let flat = SampleSet::from_columns(vec![0.0, 1.0, 2.0, 5.0], vec![0.0, 1.0, 0.0, 2.0], vec![40.0; 4]).unwrap();
    assert!(matches!(KrigingInterpolator::fit(&flat).err(), Some(InterpError::DegenerateVariogram(_))));

    let stacked = SampleSet::from_columns(vec![1.0; 3], vec![1.0; 3], vec![10.0, 20.0, 30.0]).unwrap();
    assert!(matches!(KrigingInterpolator::fit(&stacked).err(), Some(InterpError::DegenerateVariogram(_))));
}

#[test]
fn evaluate_keeps_shape()
{
    let samples = field();
    let kriging = KrigingInterpolator::with_variogram(&samples, ExponentialVariogram::new(0.0, 200.0, 12.0)).unwrap();
    let xi = Array2::from_shape_fn((5, 3), |(_, c)| c as f64 * 3.0);
    let yi = Array2::from_shape_fn((5, 3), |(r, _)| r as f64 * 2.0);
    let values = kriging.evaluate(xi.view(), yi.view()).unwrap();
    assert_eq!(values.dim(), (5, 3));
    assert_eq!(kriging.method(), Method::Kriging);
}
