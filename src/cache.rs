use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use ndarray::Array2;
use rustc_hash::{FxBuildHasher, FxHasher};
use serde::{Deserialize, Serialize};

use crate::algorithms::strategy::Method;
use crate::samples::SampleSet;

/// Default number of grids kept by a `ResultCache`.
pub const DEFAULT_CAPACITY: usize = 20;

///
/// Exact identity of an interpolation request: the bit patterns of every sample column, the grid
/// shape, the method and the smoothing factor. Keys are equal only when all of these are
/// bit-identical; sample order matters.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey
{
    xs: Box<[u64]>,
    ys: Box<[u64]>,
    signals: Box<[u64]>,
    shape: (usize, usize),
    method: Method,
    smooth: u64,
}

impl CacheKey
{
    pub fn new(samples: &SampleSet, shape: (usize, usize), method: Method, smooth: f64) -> Self
    {
        let bits = |column: &[f64]| column.iter().map(|v| v.to_bits()).collect::<Box<[u64]>>();
        Self {
            xs: bits(samples.xs()),
            ys: bits(samples.ys()),
            signals: bits(samples.signals()),
            shape,
            method,
            smooth: smooth.to_bits(),
        }
    }

    /// Short fingerprint for log lines. Not unique; equality always compares the full key.
    pub fn digest(&self) -> u64
    {
        let hasher = &mut FxHasher::default();
        self.hash(hasher);
        hasher.finish()
    }

    pub fn shape(&self) -> (usize, usize)
    {
        self.shape
    }

    pub fn method(&self) -> Method
    {
        self.method
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats
{
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first lookup.
    pub hit_rate: f64,
    pub cache_size: usize,
}

///
/// Fixed-capacity store of computed grids. When full, the entry inserted first is evicted,
/// regardless of how recently it was read.
///
#[derive(Debug, Clone)]
pub struct ResultCache
{
    entries: IndexMap<CacheKey, Array2<f64>, FxBuildHasher>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for ResultCache
{
    fn default() -> Self
    {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResultCache
{
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self
    {
        let capacity = capacity.max(1);
        Self { entries: IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher), capacity, hits: 0, misses: 0 }
    }

    /// Look up `key`, counting the lookup as a hit or a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<Array2<f64>>
    {
        match self.entries.get(key)
        {
            Some(grid) =>
            {
                self.hits += 1;
                Some(grid.clone())
            },
            None =>
            {
                self.misses += 1;
                None
            },
        }
    }

    ///
    /// Insert `grid` under `key`. Replacing an existing key keeps its position in the eviction
    /// order; a new key evicts the oldest entry when the cache is full.
    ///
    pub fn add(&mut self, key: CacheKey, grid: Array2<f64>)
    {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity
        {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0)
            {
                tracing::trace!(key = evicted.digest(), "evicted cached grid");
            }
        }
        self.entries.insert(key, grid);
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&mut self)
    {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats
    {
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups > 0 { self.hits as f64 / lookups as f64 } else { 0.0 };
        CacheStats { hits: self.hits, misses: self.misses, hit_rate, cache_size: self.entries.len() }
    }

    /// Membership test that does not touch the counters.
    pub fn contains(&self, key: &CacheKey) -> bool
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize
    {
        self.capacity
    }
}

#[cfg(test)]
fn grid(value: f64) -> Array2<f64>
{
    Array2::from_elem((3, 2), value)
}

#[cfg(test)]
fn key(k: u64) -> CacheKey
{
    let samples = SampleSet::from_columns(vec![k as f64], vec![0.0], vec![50.0]).unwrap();
    CacheKey::new(&samples, (3, 2), Method::Idw, 0.0)
}

#[test]
fn add_then_get()
{
    let mut cache = ResultCache::default();
    cache.add(key(7), grid(42.0));
    assert_eq!(cache.get(&key(7)), Some(grid(42.0)));
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn missing_key_counts_a_miss()
{
    let mut cache = ResultCache::default();
    assert_eq!(cache.get(&key(1)), None);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.cache_size), (0, 1, 0));
    assert_eq!(stats.hit_rate, 0.0);
}

#[test]
fn fifo_eviction()
{
    let mut cache = ResultCache::default();
    for k in 0..25u64
    {
        cache.add(key(k), grid(k as f64));
    }
    assert_eq!(cache.len(), DEFAULT_CAPACITY);
    for k in 0..5u64
    {
        assert!(!cache.contains(&key(k)));
    }
    for k in 5..25u64
    {
        assert!(cache.contains(&key(k)));
    }
}

#[test]
fn reads_do_not_refresh_eviction_order()
{
    let mut cache = ResultCache::new(3);
    for k in 0..3u64
    {
        cache.add(key(k), grid(k as f64));
    }
    assert!(cache.get(&key(0)).is_some());
    cache.add(key(3), grid(3.0));
    assert!(!cache.contains(&key(0)));
    assert!(cache.contains(&key(1)));

    // replacing in place does not evict
    cache.add(key(2), grid(-1.0));
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(&key(2)), Some(grid(-1.0)));
}

#[test]
fn stats_and_clear()
{
    let mut cache = ResultCache::default();
    cache.add(key(1), grid(1.0));
    cache.get(&key(1));
    cache.get(&key(1));
    cache.get(&key(2));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.cache_size), (2, 1, 1));
    assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-12);

    cache.clear();
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.cache_size), (0, 0, 0));
    assert!(cache.is_empty());
}

#[test]
fn key_is_order_sensitive_and_covers_every_input()
{
    let a = SampleSet::from_columns(vec![0.0, 1.0], vec![0.0, 1.0], vec![10.0, 20.0]).unwrap();
    let b = SampleSet::from_columns(vec![1.0, 0.0], vec![1.0, 0.0], vec![20.0, 10.0]).unwrap();
    let base = CacheKey::new(&a, (30, 30), Method::Rbf, 0.0);
    assert_eq!(base, CacheKey::new(&a, (30, 30), Method::Rbf, 0.0));
    assert_ne!(base, CacheKey::new(&b, (30, 30), Method::Rbf, 0.0));
    assert_ne!(base, CacheKey::new(&a, (30, 31), Method::Rbf, 0.0));
    assert_ne!(base, CacheKey::new(&a, (30, 30), Method::Idw, 0.0));
    assert_ne!(base, CacheKey::new(&a, (30, 30), Method::Rbf, 0.3));
}

#[test]
fn stats_serialize()
{
    let mut cache = ResultCache::default();
    cache.get(&key(0));
    let json = serde_json::to_value(cache.stats()).unwrap();
    assert_eq!(json["misses"], 1);
    assert_eq!(json["cache_size"], 0);
}

#[test]
fn mirrored_samples_never_share_an_entry()
{
    let left = SampleSet::from_columns(vec![-3.0, 3.0], vec![1.0, 1.0], vec![90.0, 10.0]).unwrap();
    let right = SampleSet::from_columns(vec![3.0, -3.0], vec![1.0, 1.0], vec![90.0, 10.0]).unwrap();
    let zero_two = SampleSet::from_columns(vec![0.0, 5.0], vec![0.0, 0.0], vec![0.0, 2.0]).unwrap();
    let two_zero = SampleSet::from_columns(vec![0.0, 5.0], vec![0.0, 0.0], vec![2.0, 0.0]).unwrap();

    let mut cache = ResultCache::default();
    cache.add(CacheKey::new(&left, (3, 2), Method::Idw, 0.0), grid(90.0));
    cache.add(CacheKey::new(&zero_two, (3, 2), Method::Idw, 0.0), grid(2.0));
    assert_eq!(cache.get(&CacheKey::new(&right, (3, 2), Method::Idw, 0.0)), None);
    assert_eq!(cache.get(&CacheKey::new(&two_zero, (3, 2), Method::Idw, 0.0)), None);
    assert_eq!(cache.get(&CacheKey::new(&left, (3, 2), Method::Idw, 0.0)), Some(grid(90.0)));
    assert_eq!(cache.len(), 2);
}
