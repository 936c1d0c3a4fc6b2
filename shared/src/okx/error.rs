//! OKX error types

use swap_engine::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OkxError {
    /// Network, timeout or TLS failure before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Non-zero `code` in the response envelope, or a per-order `sCode`
    #[error("OKX error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("signing error: {0}")]
    Signing(String),
}

impl OkxError {
    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for OkxError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<OkxError> for ApiError {
    fn from(e: OkxError) -> Self {
        match e {
            OkxError::Api { code, msg } => ApiError::Rejected { code, message: msg },
            OkxError::Decode(msg) => ApiError::Decode(msg),
            OkxError::Status { status, body } if status < 500 => ApiError::Rejected {
                code: status.to_string(),
                message: body,
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}
