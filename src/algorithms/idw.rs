use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::algorithms::strategy::{ensure_finite, InterpolationStrategy, Method};
use crate::errors::InterpError;
use crate::samples::SampleSet;

/// Distances are never taken below this, so a query on top of a sample snaps to its value.
pub const MIN_DISTANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdwConfig
{
    /// Distance exponent.
    pub power: f64,
    /// Only the nearest `k` samples contribute to each query when set.
    pub max_neighbors: Option<usize>,
}

impl Default for IdwConfig
{
    fn default() -> Self
    {
        Self { power: 2.0, max_neighbors: None }
    }
}

impl IdwConfig
{
    pub fn with_power(mut self, power: f64) -> Self
    {
        self.power = power;
        self
    }

    pub fn with_max_neighbors(mut self, k: usize) -> Self
    {
        self.max_neighbors = Some(k);
        self
    }
}

///
/// Inverse distance weighting over a borrowed sample set. With `max_neighbors` set, a k-d tree
/// over the samples bounds the work per query to `k` samples.
///
pub struct IdwInterpolator<'a>
{
    samples: &'a SampleSet,
    config: IdwConfig,
    tree: Option<KdTree<f64, usize, [f64; 2]>>,
}

impl<'a> IdwInterpolator<'a>
{
    pub fn new(samples: &'a SampleSet, config: IdwConfig) -> Result<Self, InterpError>
    {
        let tree = match config.max_neighbors
        {
            Some(k) if k > 0 && k < samples.len() =>
            {
                let mut tree = KdTree::with_capacity(2, samples.len().max(1));
                for (i, (&x, &y)) in samples.xs().iter().zip(samples.ys()).enumerate()
                {
                    tree.add([x, y], i).map_err(|e| InterpError::KdTree(format!("{e:?}")))?;
                }
                Some(tree)
            },
            _ => None,
        };
        Ok(Self { samples, config, tree })
    }

    /// Every sample contributes to every query. Cannot fail.
    pub fn exhaustive(samples: &'a SampleSet, power: f64) -> Self
    {
        Self { samples, config: IdwConfig { power, max_neighbors: None }, tree: None }
    }

    #[inline]
    fn weight(&self, distance: f64) -> f64
    {
        1.0 / distance.max(MIN_DISTANCE).powf(self.config.power)
    }

    ///
    /// Value at a single query point. When the query is so far out that every weight vanishes,
    /// the nearest contributing sample's value is returned.
    ///
    pub fn value_at(&self, x: f64, y: f64) -> Result<f64, InterpError>
    {
        if self.samples.is_empty()
        {
            return Err(InterpError::EmptySamples);
        }
        let signals = self.samples.signals();
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        let mut nearest = (f64::INFINITY, signals[0]);
        let mut accumulate = |distance: f64, signal: f64|
        {
            let w = self.weight(distance);
            numerator += w * signal;
            denominator += w;
            if distance < nearest.0
            {
                nearest = (distance, signal);
            }
        };
        match (&self.tree, self.config.max_neighbors)
        {
            (Some(tree), Some(k)) =>
            {
                let found = tree.nearest(&[x, y], k, &squared_euclidean).map_err(|e| InterpError::KdTree(format!("{e:?}")))?;
                for (squared, &i) in found
                {
                    accumulate(squared.sqrt(), signals[i]);
                }
            },
            _ =>
            {
                for (i, &signal) in signals.iter().enumerate()
                {
                    accumulate(self.samples.distance_to(i, x, y), signal);
                }
            },
        }
        if denominator == 0.0
        {
            return Ok(nearest.1);
        }
        Ok(numerator / denominator)
    }
}

impl InterpolationStrategy for IdwInterpolator<'_>
{
    fn method(&self) -> Method
    {
        Method::Idw
    }

    fn evaluate(&self, xi: ArrayView2<f64>, yi: ArrayView2<f64>) -> Result<Array2<f64>, InterpError>
    {
        let mut out = Array2::zeros(xi.dim());
        let mut failure = None;
        Zip::from(&mut out).and(&xi).and(&yi).for_each(|o, &x, &y|
        {
            if failure.is_some()
            {
                return;
            }
            match self.value_at(x, y)
            {
                Ok(v) => *o = v,
                Err(e) => failure = Some(e),
            }
        });
        if let Some(e) = failure
        {
            return Err(e);
        }
        ensure_finite(&out)?;
        Ok(out)
    }
}

#[cfg(test)]
use approx::assert_abs_diff_eq;

#[test]
fn distant_query_takes_nearest_sample()
{
    // every weight overflows to zero this far out
    let samples = SampleSet::from_columns(vec![-1e160, 1e160], vec![0.0, 0.0], vec![80.0, 20.0]).unwrap();
    let far = 3e160;
    for config in [IdwConfig::default(), IdwConfig::default().with_power(3.0)]
    {
        let idw = IdwInterpolator::new(&samples, config).unwrap();
        assert_eq!(idw.value_at(far, 0.0).unwrap(), 20.0);
        assert_eq!(idw.value_at(-far, 0.0).unwrap(), 80.0);
    }

    let xi = ndarray::array![[far, -far]];
    let yi = ndarray::array![[0.0, 0.0]];
    let idw = IdwInterpolator::new(&samples, IdwConfig::default()).unwrap();
    assert_eq!(idw.evaluate(xi.view(), yi.view()).unwrap(), ndarray::array![[20.0, 80.0]]);
}

#[cfg(test)]
fn two_samples() -> SampleSet
{
    SampleSet::from_columns(vec![0.0, 2.0], vec![0.0, 0.0], vec![100.0, 0.0]).unwrap()
}

#[test]
fn exact_at_samples()
{
    let samples = SampleSet::from_columns(vec![0.0, 3.0, 1.0, 5.0], vec![0.0, 1.0, 4.0, 5.0], vec![12.0, 80.0, 45.5, 63.0]).unwrap();
    let idw = IdwInterpolator::new(&samples, IdwConfig::default()).unwrap();
    for p in samples.iter()
    {
        assert_abs_diff_eq!(idw.value_at(p.x, p.y).unwrap(), p.signal, epsilon = 1e-6);
    }

    let single = SampleSet::from_columns(vec![2.5], vec![-1.0], vec![37.0]).unwrap();
    let idw = IdwInterpolator::new(&single, IdwConfig::default()).unwrap();
    assert_abs_diff_eq!(idw.value_at(2.5, -1.0).unwrap(), 37.0, epsilon = 1e-9);
    assert_abs_diff_eq!(idw.value_at(40.0, 8.0).unwrap(), 37.0, epsilon = 1e-9);
}

#[test]
fn higher_power_favours_nearer_sample()
{
    let samples = two_samples();
    let linear = IdwInterpolator::new(&samples, IdwConfig::default().with_power(1.0)).unwrap();
    let quadratic = IdwInterpolator::new(&samples, IdwConfig::default().with_power(2.0)).unwrap();
    let v1 = linear.value_at(0.5, 0.0).unwrap();
    let v2 = quadratic.value_at(0.5, 0.0).unwrap();
    assert_abs_diff_eq!(v1, 75.0, epsilon = 1e-9);
    assert_abs_diff_eq!(v2, 90.0, epsilon = 1e-9);
    assert!((100.0 - v2) < (100.0 - v1));
}

#[test]
fn neighbour_limit_restricts_contributors()
{
    let samples = SampleSet::from_columns(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 0.0, 1.0], vec![10.0, 20.0, 30.0, 40.0]).unwrap();
    let full = IdwInterpolator::new(&samples, IdwConfig::default()).unwrap();
    let limited = IdwInterpolator::new(&samples, IdwConfig::default().with_max_neighbors(3)).unwrap();
    let nearest = IdwInterpolator::new(&samples, IdwConfig::default().with_max_neighbors(1)).unwrap();
    assert_abs_diff_eq!(nearest.value_at(2.9, 0.9).unwrap(), 40.0, epsilon = 1e-12);
    let a = full.value_at(1.5, 0.5).unwrap();
    let b = limited.value_at(1.5, 0.5).unwrap();
    assert!(a > 10.0 && a < 40.0);
    assert!(b > 10.0 && b < 40.0);
    assert!((a - b).abs() > 0.0);
}

#[test]
fn evaluate_keeps_shape_and_rejects_empty()
{
    let samples = two_samples();
    let idw = IdwInterpolator::new(&samples, IdwConfig::default()).unwrap();
    let xi = Array2::from_shape_fn((3, 4), |(_, c)| c as f64 * 0.5);
    let yi = Array2::zeros((3, 4));
    let values = idw.evaluate(xi.view(), yi.view()).unwrap();
    assert_eq!(values.dim(), (3, 4));
    assert_abs_diff_eq!(values[(2, 0)], 100.0, epsilon = 1e-6);

    let empty = SampleSet::default();
    let idw = IdwInterpolator::new(&empty, IdwConfig::default()).unwrap();
    assert_eq!(idw.evaluate(xi.view(), yi.view()), Err(InterpError::EmptySamples));
}
