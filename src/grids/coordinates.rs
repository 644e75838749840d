use ndarray::{s, Array1, Array2, ArrayView2};

use crate::errors::InterpError;
use crate::grids::partition::Chunk;

///
/// Query locations for a dense grid. `xi` and `yi` always share a shape, and that shape is the
/// shape of every grid produced from them.
///
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoordinates
{
    xi: Array2<f64>,
    yi: Array2<f64>,
}

fn linspace(start: f64, end: f64, n: usize) -> Array1<f64>
{
    if n == 1
    {
        return Array1::from_elem(1, start);
    }
    Array1::linspace(start, end, n)
}

impl GridCoordinates
{
    pub fn new(xi: Array2<f64>, yi: Array2<f64>) -> Result<Self, InterpError>
    {
        if xi.dim() != yi.dim()
        {
            return Err(InterpError::GridShapeMismatch { xi: xi.dim(), yi: yi.dim() });
        }
        Ok(Self { xi, yi })
    }

    ///
    /// Regular mesh over `[x.0, x.1] x [y.0, y.1]` with `x_res` columns and `y_res` rows, end
    /// points included. Row `r` holds the `r`-th y value, column `c` the `c`-th x value.
    ///
    pub fn linspace(x: (f64, f64), y: (f64, f64), x_res: usize, y_res: usize) -> Self
    {
        let xs = linspace(x.0, x.1, x_res);
        let ys = linspace(y.0, y.1, y_res);
        let xi = Array2::from_shape_fn((y_res, x_res), |(_, c)| xs[c]);
        let yi = Array2::from_shape_fn((y_res, x_res), |(r, _)| ys[r]);
        Self { xi, yi }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize)
    {
        self.xi.dim()
    }

    pub fn rows(&self) -> usize
    {
        self.xi.nrows()
    }

    pub fn cols(&self) -> usize
    {
        self.xi.ncols()
    }

    pub fn xi(&self) -> &Array2<f64>
    {
        &self.xi
    }

    pub fn yi(&self) -> &Array2<f64>
    {
        &self.yi
    }

    /// Views of the query coordinates covered by `chunk`.
    pub fn chunk_views(&self, chunk: &Chunk) -> (ArrayView2<'_, f64>, ArrayView2<'_, f64>)
    {
        let region = s![chunk.row_start..chunk.row_end, chunk.col_start..chunk.col_end];
        (self.xi.slice(region), self.yi.slice(region))
    }
}

#[test]
fn linspace_orientation()
{
    let grid = GridCoordinates::linspace((0.0, 10.0), (0.0, 4.0), 3, 5);
    assert_eq!(grid.shape(), (5, 3));
    assert_eq!(grid.xi().row(0).to_vec(), vec![0.0, 5.0, 10.0]);
    assert_eq!(grid.yi().column(2).to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn shape_mismatch_is_rejected()
{
    let err = GridCoordinates::new(Array2::zeros((2, 3)), Array2::zeros((3, 2))).unwrap_err();
    assert_eq!(err, InterpError::GridShapeMismatch { xi: (2, 3), yi: (3, 2) });
}

#[test]
fn chunk_views_match_chunk_shape()
{
    let grid = GridCoordinates::linspace((0.0, 1.0), (0.0, 1.0), 6, 4);
    let (xv, yv) = grid.chunk_views(&Chunk::new(1, 3, 2, 6));
    assert_eq!(xv.dim(), (2, 4));
    assert_eq!(yv.dim(), (2, 4));
    assert_eq!(xv[(0, 0)], grid.xi()[(1, 2)]);
    assert_eq!(yv[(1, 3)], grid.yi()[(2, 5)]);
}
