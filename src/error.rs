use thiserror::Error;

/// Error types for the modelfree-rs library.
#[derive(Error, Debug)]
pub enum MfError {
    /// Physically invalid parameter combination (e.g. tm <= 0).
    ///
    /// Callers that can recover locally substitute the `BACK_CALC_FAIL`
    /// sentinel instead of propagating this error.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Malformed or inconsistent input data.  Fatal for the run, raised at
    /// load time before any fitting begins.
    #[error("Input data error: {0}")]
    InputData(String),

    /// A fit unit (one model on one spin) failed: non-convergence or an
    /// unusable solution.  Recovered per unit, never aborts the batch.
    #[error("Fit oracle failure: {0}")]
    OracleFailure(String),

    /// Mismatch in vector/matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A singular or non-positive-definite matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Invalid parameter value passed to a model or strategy.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for modelfree-rs operations.
pub type Result<T> = std::result::Result<T, MfError>;

impl From<String> for MfError {
    fn from(s: String) -> Self {
        MfError::Other(s)
    }
}

impl From<&str> for MfError {
    fn from(s: &str) -> Self {
        MfError::Other(s.to_string())
    }
}
