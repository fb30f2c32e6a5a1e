//! Unified error types for anacache.
//!
//! Display strings carry a stable `CODE:` prefix so that callers and tool
//! output can match on the failure class.

use std::sync::Arc;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the interception layer and its control client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty endpoint).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A response or stored body was not the JSON we expected.
    #[error("MALFORMED_PAYLOAD: {0}")]
    MalformedPayload(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network-level failure (connection refused, DNS, reset).
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Install step of the interception layer failed.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// No interception layer is controlling the container.
    #[error("NO_CONTROLLER: no active interception layer")]
    NoController,

    /// The interception layer did not reply within the caller's deadline.
    #[error("LAYER_UNAVAILABLE: no reply within {0}ms")]
    ControlTimeout(u64),

    /// The interception layer replied with an error field.
    #[error("CONTROL_REJECTED: {0}")]
    ControlRejected(String),

    /// The reply channel was dropped before a reply was posted.
    #[error("LAYER_UNAVAILABLE: reply channel closed")]
    ControlClosed,

    /// A refresh shared between coalesced requests failed.
    #[error(transparent)]
    Refresh(Arc<Error>),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedPayload(err.to_string())
    }
}

impl Error {
    /// JSON-RPC error code used when surfacing this error through MCP.
    fn mcp_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => -32602,
            Error::Database(_) | Error::MigrationFailed(_) => -32002,
            Error::MalformedPayload(_) => -32000,
            Error::InvalidUrl(_) => -32003,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::HttpError(_) => -32008,
            Error::InstallFailed(_) => -32013,
            Error::NoController | Error::ControlTimeout(_) | Error::ControlClosed => -32014,
            Error::ControlRejected(_) => -32015,
            Error::Refresh(inner) => inner.mcp_code(),
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        McpError { code: ErrorCode(err.mcp_code()), message: err.to_string().into(), data: None }
    }
}
