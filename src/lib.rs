//!
//! Scattered-data interpolation for WiFi signal heatmaps.
//!
//! Signal samples taken at irregular positions are interpolated (RBF, IDW or ordinary kriging)
//! onto a dense rectangular grid. Large grids are split into chunks that are evaluated on a
//! fixed-size worker pool, and results are kept in a small FIFO cache so repeated requests are
//! answered immediately.
//!
//! ```no_run
//! use heatgrid::{EngineConfig, GridCoordinates, Method, ParallelInterpolationEngine, SamplePoint, SampleSet};
//!
//! let samples = SampleSet::from_points(&[
//!     SamplePoint::new(0.0, 0.0, 82.0),
//!     SamplePoint::new(10.0, 0.0, 45.0),
//!     SamplePoint::new(5.0, 8.0, 63.0),
//! ]);
//! let grid = GridCoordinates::linspace((0.0, 10.0), (0.0, 8.0), 40, 32);
//! let mut engine = ParallelInterpolationEngine::new(EngineConfig::default()).unwrap();
//! let heatmap = engine.interpolate(&samples, &grid, Method::Idw, 0.0);
//! assert_eq!(heatmap.dim(), (32, 40));
//! ```
//!

pub mod adaptive;
pub mod algorithms;
pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod grids;
pub mod samples;

pub use algorithms::strategy::{InterpolationStrategy, Method};
pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::EngineConfig;
pub use engine::{Interpolation, ParallelInterpolationEngine, Source};
pub use errors::InterpError;
pub use grids::coordinates::GridCoordinates;
pub use samples::{Extent, SamplePoint, SampleSet};
