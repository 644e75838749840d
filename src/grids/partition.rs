use std::ops::Range;

use serde::{Deserialize, Serialize};

///
/// Rectangular block of grid indices, half-open in both directions. One chunk is one unit of
/// parallel work.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk
{
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Chunk
{
    pub fn new(row_start: usize, row_end: usize, col_start: usize, col_end: usize) -> Self
    {
        Self { row_start, row_end, col_start, col_end }
    }

    #[inline]
    pub fn rows(&self) -> usize
    {
        self.row_end - self.row_start
    }

    #[inline]
    pub fn cols(&self) -> usize
    {
        self.col_end - self.col_start
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.rows() * self.cols()
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    pub fn row_range(&self) -> Range<usize>
    {
        self.row_start..self.row_end
    }

    pub fn col_range(&self) -> Range<usize>
    {
        self.col_start..self.col_end
    }
}

///
/// Split a `rows` x `cols` grid into chunks of at most `chunk_size` x `chunk_size`, in
/// row-major order. Trailing chunks along each axis take whatever is left over. A zero-sized
/// grid produces no chunks; a `chunk_size` of zero is treated as one.
///
pub fn split(rows: usize, cols: usize, chunk_size: usize) -> Vec<Chunk>
{
    let step = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(rows.div_ceil(step) * cols.div_ceil(step));
    for row_start in (0..rows).step_by(step)
    {
        let row_end = (row_start + step).min(rows);
        for col_start in (0..cols).step_by(step)
        {
            let col_end = (col_start + step).min(cols);
            chunks.push(Chunk::new(row_start, row_end, col_start, col_end));
        }
    }
    chunks
}

#[cfg(test)]
fn coverage(rows: usize, cols: usize, chunks: &[Chunk]) -> Vec<u32>
{
    let mut hits = vec![0u32; rows * cols];
    for chunk in chunks
    {
        for r in chunk.row_range()
        {
            for c in chunk.col_range()
            {
                hits[r * cols + c] += 1;
            }
        }
    }
    hits
}

#[test]
fn small_grid_is_a_single_chunk()
{
    let chunks = split(7, 9, 50);
    assert_eq!(chunks, vec![Chunk::new(0, 7, 0, 9)]);
}

#[test]
fn trailing_chunks_are_smaller()
{
    let chunks = split(5, 7, 3);
    assert_eq!(chunks.len(), 6);
    assert_eq!(chunks[0], Chunk::new(0, 3, 0, 3));
    assert_eq!(chunks[2], Chunk::new(0, 3, 6, 7));
    assert_eq!(chunks[5], Chunk::new(3, 5, 6, 7));
    assert!(chunks.iter().all(|c| c.rows() <= 3 && c.cols() <= 3));
}

#[test]
fn chunks_are_row_major()
{
    let chunks = split(4, 4, 2);
    let starts: Vec<_> = chunks.iter().map(|c| (c.row_start, c.col_start)).collect();
    assert_eq!(starts, vec![(0, 0), (0, 2), (2, 0), (2, 2)]);
}

#[test]
fn degenerate_inputs()
{
    assert!(split(0, 10, 4).is_empty());
    assert!(split(10, 0, 4).is_empty());
    assert_eq!(split(2, 3, 0).len(), 6);
}

#[cfg(test)]
mod properties
{
    use proptest::prelude::*;

    use super::{coverage, split};

    proptest!
    {
        #[test]
        fn chunks_tile_the_grid(rows in 1usize..120, cols in 1usize..120, chunk_size in 1usize..64)
        {
            let chunks = split(rows, cols, chunk_size);
            let hits = coverage(rows, cols, &chunks);
            prop_assert!(hits.iter().all(|&h| h == 1));
            prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.rows() <= chunk_size && c.cols() <= chunk_size));
            prop_assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), rows * cols);
        }
    }
}
