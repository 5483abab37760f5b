use thiserror::Error;

/// Errors raised by graph loading, sampling and training.
///
/// Every error is raised synchronously by the call that detects it. Calls that
/// fail on a bad batch leave the optimizer state untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: negative or non-finite weights, bad edge-list rows,
    /// zero-sum sequences handed to `normalize`, invalid configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A distribution whose total mass is zero for the requested mode.
    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),

    /// Sampling requested on a graph without edges.
    #[error("Empty graph: {0}")]
    EmptyGraph(String),

    /// Embedding rows do not match the node count, or a batch references a
    /// node index outside the embedding matrix.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Dedicated kernel thread pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for smore.
pub type Result<T> = std::result::Result<T, Error>;
