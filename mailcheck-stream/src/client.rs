//! HTTP client that streams NDJSON response bodies into a [`RecordHandler`].

use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::StreamConfig;
use crate::error::{CancelReason, StreamError, map_http_status, map_reqwest_error};
use crate::handler::RecordHandler;
use crate::outcome::StreamSummary;
use crate::request::Request;
use crate::streaming::{Deadline, pump};

/// Most bytes of a rejected response body kept for the error message.
const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// Per-chunk wait for a rejected response body when no read timeout is set.
const ERROR_BODY_WAIT: Duration = Duration::from_secs(1);

/// Issues requests and streams their NDJSON bodies.
///
/// Holds no per-call state, so one client can serve any number of concurrent
/// [`stream`](Self::stream) calls; each call owns its own line buffer.
///
/// # Example
///
/// ```no_run
/// use mailcheck_stream::{FnHandler, NdjsonClient, Request};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), mailcheck_stream::StreamError> {
/// let client = NdjsonClient::new();
/// let request = Request::post("http://localhost:5000/api/verify/batch")
///     .header("accept", "application/json")
///     .json(&serde_json::json!({ "emails": ["test1@example.com"] }))?;
///
/// let mut handler = FnHandler::new(|record| println!("{}", record.value));
/// let summary = client
///     .stream(&request, &mut handler, &CancellationToken::new())
///     .await?;
/// println!("{} records", summary.records);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct NdjsonClient {
    /// Shared HTTP client.
    pub(crate) http: reqwest::Client,
    /// Policy and limits applied to every call.
    pub(crate) config: StreamConfig,
}

impl NdjsonClient {
    /// Create a client with a fresh connection pool and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing reqwest client (and its connection pool).
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replace the streaming configuration.
    #[must_use]
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// The active streaming configuration.
    pub fn stream_config(&self) -> &StreamConfig {
        &self.config
    }

    /// Send `request` and deliver each NDJSON record of the response body to
    /// `handler` as it arrives.
    ///
    /// Fails with [`StreamError::Transport`] without touching the handler when
    /// the request cannot be sent or the status is not a success. Cancelling
    /// `cancel`, or exceeding a configured timeout, stops the call with
    /// [`StreamError::Cancelled`] and no further records are delivered.
    pub async fn stream<H: RecordHandler>(
        &self,
        request: &Request,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, StreamError> {
        let deadline = Deadline::start(&self.config);
        let builder = request.to_reqwest(&self.http)?;

        tracing::debug!(method = %request.method(), url = %request.url(), "sending NDJSON streaming request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(not_started(CancelReason::Caller)),
            limit = deadline.elapsed() => return Err(not_started(CancelReason::Timeout(limit))),
            sent = builder.send() => sent.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            let wait = self.config.read_timeout.unwrap_or(ERROR_BODY_WAIT);
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(not_started(CancelReason::Caller)),
                limit = deadline.elapsed() => return Err(not_started(CancelReason::Timeout(limit))),
                body = error_body(response, wait) => body,
            };
            tracing::warn!(%status, url = %request.url(), "NDJSON request rejected");
            return Err(map_http_status(status, &body));
        }

        pump(response.bytes_stream(), handler, &self.config, cancel, &deadline).await
    }
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of a rejected response, giving up on
/// a chunk that takes longer than `wait`.
async fn error_body(response: reqwest::Response, wait: Duration) -> String {
    let mut body = BytesMut::new();
    let mut chunks = std::pin::pin!(response.bytes_stream());
    while body.len() < ERROR_BODY_LIMIT {
        match tokio::time::timeout(wait, chunks.next()).await {
            Ok(Some(Ok(chunk))) => body.extend_from_slice(&chunk),
            _ => break,
        }
    }
    body.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}

fn not_started(reason: CancelReason) -> StreamError {
    StreamError::Cancelled {
        reason,
        records_delivered: 0,
    }
}
