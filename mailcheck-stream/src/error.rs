//! Error taxonomy for streaming calls, and helpers for mapping reqwest failures.

use std::time::Duration;

use thiserror::Error;

/// Why a streaming call stopped before the body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller triggered the cancellation token.
    Caller,
    /// A configured read or total timeout expired.
    Timeout(Duration),
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Caller => f.write_str("cancelled by caller"),
            CancelReason::Timeout(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Terminal errors of a streaming call.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StreamError {
    /// The request could not be sent, the response had a non-success status,
    /// or the body could not be read.
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Human-readable description, including the response body if any.
        message: String,
        /// Records delivered before the failure.
        records_delivered: u64,
    },

    /// A line was not valid JSON and the fail-fast policy is active.
    #[error("malformed record on line {line_number}: {source}")]
    Malformed {
        /// 1-based line number within the response body.
        line_number: u64,
        /// The offending line, lossily decoded.
        raw_line: String,
        /// The parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A single line grew past the configured byte limit.
    #[error("line {line_number} exceeds {limit} bytes")]
    LineTooLong {
        /// 1-based line number of the oversized line.
        line_number: u64,
        /// The configured limit.
        limit: usize,
    },

    /// The call was cancelled or timed out.
    #[error("stream {reason} after {records_delivered} records")]
    Cancelled {
        /// What stopped the stream.
        reason: CancelReason,
        /// Records delivered before cancellation was observed.
        records_delivered: u64,
    },

    /// The request could not be built (bad header name, unencodable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StreamError {
    /// Whether issuing the same request again might succeed.
    ///
    /// This component never retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { status: None, .. } => true,
            StreamError::Transport {
                status: Some(status),
                ..
            } => *status == 429 || (500..=599).contains(status),
            StreamError::Cancelled {
                reason: CancelReason::Timeout(_),
                ..
            } => true,
            _ => false,
        }
    }

    /// Whether this error came from cancellation or a timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled { .. })
    }

    /// The HTTP status carried by a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Map a non-success HTTP status and its body to a [`StreamError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> StreamError {
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.to_string()
    };
    StreamError::Transport {
        status: Some(status.as_u16()),
        message,
        records_delivered: 0,
    }
}

/// Map a [`reqwest::Error`] raised while sending the request.
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> StreamError {
    StreamError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
        records_delivered: 0,
    }
}
