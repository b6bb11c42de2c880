//! Error types for the Ascnd client.
//!
//! Construction problems are reported once, as a [`ConfigError`], before any
//! channel is opened. Everything that can go wrong afterwards is carried back
//! to the caller inside an [`ApiResult`].

use thiserror::Error;
use tonic::Code;

use crate::retry::is_retryable;

/// Outcome of a single client operation.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure of an operation that reached the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The channel reported a non-OK status.
    #[error("{message}")]
    Transport {
        /// Status code returned by the channel.
        code: Code,
        /// Status message returned by the channel.
        message: String,
    },

    /// The channel succeeded but the payload did not decode into the expected response.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        /// Name of the remote operation.
        operation: &'static str,
        /// Decoder error text.
        message: String,
    },

    /// The client is draining or closed and refused to schedule the operation.
    #[error("client is shutting down")]
    Shutdown,

    /// The background execution unit dropped the task before it produced a result.
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl ApiError {
    /// Builds a transport error from a status code and message.
    pub fn transport(code: Code, message: impl Into<String>) -> Self {
        ApiError::Transport {
            code,
            message: message.into(),
        }
    }

    /// Numeric error code.
    ///
    /// Transport failures report the gRPC status code. Decode failures report
    /// the transport's success code (`0`), as do errors that never touched
    /// the transport.
    pub fn code(&self) -> i32 {
        match self {
            ApiError::Transport { code, .. } => *code as i32,
            ApiError::Decode { .. } | ApiError::Shutdown | ApiError::TaskFailed(_) => {
                Code::Ok as i32
            }
        }
    }

    /// Human readable error message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the underlying status is in the transient set.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { code, .. } => is_retryable(*code),
            _ => false,
        }
    }
}

/// A configuration that cannot be turned into a client.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `server_address` was empty.
    #[error("server_address cannot be empty")]
    EmptyEndpoint,

    /// A timeout field was zero or negative.
    #[error("{field} must be positive")]
    NonPositiveTimeout {
        /// Name of the offending field.
        field: &'static str,
    },

    /// `max_retries` was negative.
    #[error("max_retries cannot be negative")]
    NegativeRetryCount,

    /// `retry_delay_ms` was negative.
    #[error("retry_delay_ms cannot be negative")]
    NegativeRetryDelay,

    /// The endpoint could not be turned into a channel.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The endpoint URI that was rejected.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The background runtime could not be started.
    #[error("failed to start background runtime")]
    Runtime(#[from] std::io::Error),
}
