//! Error types shared by the engine and its venue collaborators

use thiserror::Error;

/// Result of a call into the venue's market, account or order API.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure reported by a venue collaborator.
///
/// `Unavailable`, `Transport` and `Decode` are transient: the engine skips the
/// current cycle and tries again later. `Rejected` carries the venue's own
/// failure code and is never retried automatically.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("data unavailable: {0}")]
    Unavailable(String),

    #[error("venue rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed venue response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the failure may clear up on its own.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiError::Rejected { .. })
    }
}

/// Invalid engine configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least {required} moving-average periods are required, got {got}")]
    TooFewMaPeriods { required: usize, got: usize },

    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("kline limit {limit} is below the {required} candles the indicators need")]
    KlineLimitTooSmall { limit: usize, required: usize },
}

/// Order submission failure. Never retried automatically.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error("order rejected by venue ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("order submission failed: {0}")]
    Transport(String),

    #[error("invalid order size: {0} contracts")]
    InvalidSize(f64),
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { code, message } => SubmitError::Rejected { code, message },
            other => SubmitError::Transport(other.to_string()),
        }
    }
}

/// Failure of one strategy loop iteration. Logged, then the loop backs off.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("venue call failed: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}
