use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum InterpError
{
    #[error("sample columns differ in length: xs={xs}, ys={ys}, signals={signals}")]
    LengthMismatch { xs: usize, ys: usize, signals: usize },

    #[error("grid coordinate arrays differ in shape: xi={xi:?}, yi={yi:?}")]
    GridShapeMismatch { xi: (usize, usize), yi: (usize, usize) },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("no samples to interpolate from")]
    EmptySamples,

    #[error("insufficient samples: got {got}, need at least {need}")]
    InsufficientSamples { got: usize, need: usize },

    #[error("variogram could not be fitted: {0}")]
    DegenerateVariogram(String),

    #[error("linear system is singular")]
    SingularSystem,

    #[error("interpolation produced a non-finite value")]
    NonFiniteResult,

    #[error("chunk result has shape {got:?}, expected {expected:?}")]
    ChunkShapeMismatch { expected: (usize, usize), got: (usize, usize) },

    #[error("nearest-neighbour search failed: {0}")]
    KdTree(String),

    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

impl InterpError
{
    ///
    /// True for errors describing a malformed call. These are the only errors that are
    /// returned to callers of the engine; everything else is contained and degraded.
    ///
    pub fn is_validation(&self) -> bool
    {
        matches!(self, Self::LengthMismatch { .. } | Self::GridShapeMismatch { .. } | Self::InvalidConfig(_) | Self::ThreadPool(_))
    }
}

#[test]
fn validation_classification()
{
    assert!(InterpError::LengthMismatch { xs: 1, ys: 2, signals: 2 }.is_validation());
    assert!(InterpError::InvalidConfig("chunk_size".into()).is_validation());
    assert!(!InterpError::SingularSystem.is_validation());
    assert!(!InterpError::WorkerPanic("boom".into()).is_validation());
}

#[test]
fn messages_name_the_offending_lengths()
{
    let message = InterpError::LengthMismatch { xs: 3, ys: 3, signals: 2 }.to_string();
    assert_eq!(message, "sample columns differ in length: xs=3, ys=3, signals=2");
}
