//! Errors from the verification API client.

use mailcheck_stream::StreamError;
use thiserror::Error;

/// Errors returned by [`VerifyClient`](crate::VerifyClient).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClientError {
    /// An argument was rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The configured base URL cannot have endpoint paths appended to it.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The streamed batch endpoint failed.
    #[error("batch stream failed: {0}")]
    Stream(#[from] StreamError),
}

impl ClientError {
    /// Whether retrying the call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            ClientError::Request(_) => true,
            ClientError::Stream(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status, when the server answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Stream(e) => e.status(),
            _ => None,
        }
    }
}

/// Map a [`reqwest::Error`] from a plain JSON call.
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_decode() {
        ClientError::InvalidResponse(err.to_string())
    } else {
        ClientError::Request(err.to_string())
    }
}
