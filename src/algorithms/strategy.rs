use std::{fmt::Display, str::FromStr};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::errors::InterpError;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method
{
    /// Multiquadric radial basis functions, fitted over the whole sample set.
    #[default]
    Rbf,
    /// Inverse distance weighting. Always available.
    Idw,
    /// Ordinary kriging with an exponential variogram. Needs the `kriging` feature.
    Kriging,
}

impl Method
{
    pub fn name(&self) -> &'static str
    {
        match self
        {
            Method::Rbf => "rbf",
            Method::Idw => "idw",
            Method::Kriging => "kriging",
        }
    }
}

impl Display for Method
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.write_str(self.name())
    }
}

impl FromStr for Method
{
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_ascii_lowercase().as_str()
        {
            "rbf" => Ok(Method::Rbf),
            "idw" => Ok(Method::Idw),
            "kriging" => Ok(Method::Kriging),
            other => Err(InterpError::InvalidConfig(format!("unknown interpolation method '{other}'"))),
        }
    }
}

///
/// A fitted interpolant. Implementations are read-only once constructed, so the engine shares
/// one instance across all workers and evaluates disjoint chunks concurrently.
///
pub trait InterpolationStrategy: Send + Sync
{
    /// Which method this instance actually implements.
    fn method(&self) -> Method;

    ///
    /// Evaluate at every `(xi[r, c], yi[r, c])`. The returned array has the same shape as the
    /// inputs.
    ///
    fn evaluate(&self, xi: ArrayView2<f64>, yi: ArrayView2<f64>) -> Result<Array2<f64>, InterpError>;
}

///
/// Fail with `NonFiniteResult` if any value is NaN or infinite. Used by the engine to turn
/// numerical breakdown inside a chunk into a contained failure.
///
pub fn ensure_finite(values: &Array2<f64>) -> Result<(), InterpError>
{
    if values.iter().all(|v| v.is_finite())
    {
        Ok(())
    }
    else
    {
        Err(InterpError::NonFiniteResult)
    }
}

#[test]
fn method_names_round_trip()
{
    for method in [Method::Rbf, Method::Idw, Method::Kriging]
    {
        assert_eq!(method.name().parse::<Method>().unwrap(), method);
    }
    assert_eq!("IDW".parse::<Method>().unwrap(), Method::Idw);
    assert!("nearest".parse::<Method>().is_err());
}

#[test]
fn non_finite_values_are_flagged()
{
    let mut values = Array2::<f64>::zeros((2, 2));
    assert!(ensure_finite(&values).is_ok());
    values[(1, 0)] = f64::NAN;
    assert_eq!(ensure_finite(&values), Err(InterpError::NonFiniteResult));
}
