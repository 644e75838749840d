use serde::{Deserialize, Serialize};

use crate::errors::InterpError;

///
/// A single signal-strength measurement. `signal` is a percentage, nominally in [0, 100].
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint
{
    pub x: f64,
    pub y: f64,
    pub signal: f64,
}

impl SamplePoint
{
    pub fn new(x: f64, y: f64, signal: f64) -> Self
    {
        Self { x, y, signal }
    }
}

/// Axis-aligned bounds of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent
{
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Extent
{
    #[inline]
    pub fn width(&self) -> f64
    {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f64
    {
        self.y_max - self.y_min
    }
}

///
/// Column-oriented set of samples. The three columns are guaranteed to have the same length,
/// so every algorithm can index them in lockstep.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet
{
    xs: Vec<f64>,
    ys: Vec<f64>,
    signals: Vec<f64>,
}

impl SampleSet
{
    ///
    /// Build from separate coordinate and signal columns. Fails with `LengthMismatch` if the
    /// columns are not all the same length.
    ///
    pub fn from_columns(xs: Vec<f64>, ys: Vec<f64>, signals: Vec<f64>) -> Result<Self, InterpError>
    {
        if xs.len() != ys.len() || xs.len() != signals.len()
        {
            return Err(InterpError::LengthMismatch { xs: xs.len(), ys: ys.len(), signals: signals.len() });
        }
        Ok(Self { xs, ys, signals })
    }

    pub fn from_points(points: &[SamplePoint]) -> Self
    {
        Self
        {
            xs: points.iter().map(|p| p.x).collect(),
            ys: points.iter().map(|p| p.y).collect(),
            signals: points.iter().map(|p| p.signal).collect(),
        }
    }

    pub fn len(&self) -> usize
    {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f64]
    {
        &self.xs
    }

    pub fn ys(&self) -> &[f64]
    {
        &self.ys
    }

    pub fn signals(&self) -> &[f64]
    {
        &self.signals
    }

    pub fn point(&self, i: usize) -> SamplePoint
    {
        SamplePoint::new(self.xs[i], self.ys[i], self.signals[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = SamplePoint> + '_
    {
        (0..self.len()).map(|i| self.point(i))
    }

    /// Euclidean distance between sample `i` and `(x, y)`.
    #[inline]
    pub fn distance_to(&self, i: usize, x: f64, y: f64) -> f64
    {
        let dx = self.xs[i] - x;
        let dy = self.ys[i] - y;
        dx.hypot(dy)
    }

    /// Bounding box of the samples, `None` when the set is empty.
    pub fn extent(&self) -> Option<Extent>
    {
        if self.is_empty()
        {
            return None;
        }
        let fold = |values: &[f64]| values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (x_min, x_max) = fold(&self.xs);
        let (y_min, y_max) = fold(&self.ys);
        Some(Extent { x_min, x_max, y_min, y_max })
    }
}

impl FromIterator<SamplePoint> for SampleSet
{
    fn from_iter<I: IntoIterator<Item = SamplePoint>>(iter: I) -> Self
    {
        let mut set = Self::default();
        for p in iter
        {
            set.xs.push(p.x);
            set.ys.push(p.y);
            set.signals.push(p.signal);
        }
        set
    }
}

#[test]
fn mismatched_columns_are_rejected()
{
    let err = SampleSet::from_columns(vec![0.0, 1.0], vec![0.0, 1.0], vec![50.0]).unwrap_err();
    assert_eq!(err, InterpError::LengthMismatch { xs: 2, ys: 2, signals: 1 });
}

#[test]
fn extent_covers_all_points()
{
    let set: SampleSet = [SamplePoint::new(1.0, -2.0, 10.0), SamplePoint::new(-3.0, 4.0, 20.0), SamplePoint::new(0.5, 0.0, 30.0)]
        .into_iter()
        .collect();
    let extent = set.extent().unwrap();
    assert_eq!(extent, Extent { x_min: -3.0, x_max: 1.0, y_min: -2.0, y_max: 4.0 });
    assert_eq!(extent.width(), 4.0);
    assert_eq!(extent.height(), 6.0);
    assert!(SampleSet::default().extent().is_none());
}

#[test]
fn points_and_columns_agree()
{
    let points = [SamplePoint::new(0.0, 1.0, 2.0), SamplePoint::new(3.0, 4.0, 5.0)];
    let a = SampleSet::from_points(&points);
    let b = SampleSet::from_columns(vec![0.0, 3.0], vec![1.0, 4.0], vec![2.0, 5.0]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.iter().collect::<Vec<_>>(), points.to_vec());
}
