use serde::{Deserialize, Serialize};

use crate::algorithms::idw::IdwConfig;
use crate::cache::DEFAULT_CAPACITY;
use crate::errors::InterpError;

/// Default edge length of a square chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

fn default_workers() -> usize
{
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

///
/// Engine settings. Fixed once the engine is built.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    /// Number of worker threads in the pool.
    pub max_workers: usize,
    /// Chunks are at most `chunk_size` x `chunk_size` grid cells.
    pub chunk_size: usize,
    /// Distance exponent for IDW.
    pub idw_power: f64,
    /// Restrict IDW to the nearest `k` samples.
    pub idw_max_neighbors: Option<usize>,
    /// Number of grids kept in the result cache.
    pub cache_capacity: usize,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self
        {
            max_workers: default_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            idw_power: 2.0,
            idw_max_neighbors: None,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig
{
    pub fn with_max_workers(mut self, max_workers: usize) -> Self
    {
        self.max_workers = max_workers;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self
    {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_idw_power(mut self, power: f64) -> Self
    {
        self.idw_power = power;
        self
    }

    pub fn with_idw_max_neighbors(mut self, k: usize) -> Self
    {
        self.idw_max_neighbors = Some(k);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self
    {
        self.cache_capacity = capacity;
        self
    }

    pub fn idw(&self) -> IdwConfig
    {
        IdwConfig { power: self.idw_power, max_neighbors: self.idw_max_neighbors }
    }

    pub fn validate(&self) -> Result<(), InterpError>
    {
        if self.max_workers == 0
        {
            return Err(InterpError::InvalidConfig("max_workers must be at least 1".into()));
        }
        if self.chunk_size == 0
        {
            return Err(InterpError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.cache_capacity == 0
        {
            return Err(InterpError::InvalidConfig("cache_capacity must be at least 1".into()));
        }
        if !self.idw_power.is_finite() || self.idw_power <= 0.0
        {
            return Err(InterpError::InvalidConfig(format!("idw_power must be finite and positive, got {}", self.idw_power)));
        }
        if self.idw_max_neighbors == Some(0)
        {
            return Err(InterpError::InvalidConfig("idw_max_neighbors must be at least 1".into()));
        }
        Ok(())
    }
}

#[test]
fn defaults_are_valid()
{
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.max_workers >= 1);
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.cache_capacity, 20);
    assert_eq!(config.idw(), IdwConfig::default());
}

#[test]
fn invalid_settings_are_rejected()
{
    for config in [
        EngineConfig::default().with_max_workers(0),
        EngineConfig::default().with_chunk_size(0),
        EngineConfig::default().with_cache_capacity(0),
        EngineConfig::default().with_idw_power(f64::NAN),
        EngineConfig::default().with_idw_power(-1.0),
        EngineConfig::default().with_idw_max_neighbors(0),
    ]
    {
        let err = config.validate().unwrap_err();
        assert!(err.is_validation(), "{err}");
    }
}

#[test]
fn partial_json_uses_defaults()
{
    let config: EngineConfig = serde_json::from_str(r#"{ "max_workers": 3, "idw_max_neighbors": 8 }"#).unwrap();
    assert_eq!(config.max_workers, 3);
    assert_eq!(config.idw_max_neighbors, Some(8));
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.idw_power, 2.0);

    let text = serde_json::to_string(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}
