//! The read loop: chunks in, records out.
//!
//! Bodies are newline-delimited JSON, one value per line:
//! ```text
//! {"job_id":"batch_1744840260_125df2cf","status":"started","total_emails":3}
//! {"email":"test1@example.com","category":"invalid","provider":"example.com"}
//! {"job_id":"batch_1744840260_125df2cf","status":"completed","verified_emails":3}
//! ```
//!
//! The loop has exactly two kinds of suspension point: waiting for the next
//! chunk, and waiting for a handler future. Cancellation and the total
//! deadline are observed at both.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::buffer::LineBuffer;
use crate::config::{MalformedPolicy, StreamConfig};
use crate::error::{CancelReason, StreamError};
use crate::handler::RecordHandler;
use crate::outcome::{StreamSummary, TrailingFragment};
use crate::record::{MalformedRecord, ParsedLine, StreamRecord, parse_line};

/// Drive `handler` from any chunked byte stream.
///
/// This is the transport-independent core of
/// [`NdjsonClient::stream`](crate::NdjsonClient::stream), public so callers
/// holding a body from elsewhere (a file, a socket, a test fixture) can reuse
/// it. The total timeout, if configured, starts now.
pub async fn consume_body<S, E, H>(
    body: S,
    handler: &mut H,
    config: &StreamConfig,
    cancel: &CancellationToken,
) -> Result<StreamSummary, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    H: RecordHandler,
{
    let deadline = Deadline::start(config);
    pump(body, handler, config, cancel, &deadline).await
}

/// Overall deadline for one call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<(Instant, std::time::Duration)>,
}

impl Deadline {
    pub(crate) fn start(config: &StreamConfig) -> Self {
        Self {
            // A limit too large to represent is no limit.
            at: config
                .total_timeout
                .and_then(|limit| Instant::now().checked_add(limit).map(|at| (at, limit))),
        }
    }

    /// Resolves when the deadline passes; never resolves without one.
    pub(crate) async fn elapsed(&self) -> std::time::Duration {
        match self.at {
            Some((at, limit)) => {
                sleep_until(at).await;
                limit
            }
            None => std::future::pending().await,
        }
    }

    fn expired(&self) -> Option<std::time::Duration> {
        self.at
            .filter(|(at, _)| Instant::now() >= *at)
            .map(|(_, limit)| limit)
    }
}

enum Read {
    Chunk(Bytes),
    End,
    Failed(String),
    TimedOut(std::time::Duration),
}

pub(crate) async fn pump<S, E, H>(
    body: S,
    handler: &mut H,
    config: &StreamConfig,
    cancel: &CancellationToken,
    deadline: &Deadline,
) -> Result<StreamSummary, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    H: RecordHandler,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LinePump::new(config, cancel, deadline);

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(lines.cancelled(CancelReason::Caller));
            }
            limit = deadline.elapsed() => {
                return Err(lines.cancelled(CancelReason::Timeout(limit)));
            }
            read = next_chunk(body.as_mut(), config.read_timeout) => read,
        };

        match read {
            Read::Chunk(chunk) => lines.push(chunk, handler).await?,
            Read::End => break,
            Read::Failed(message) => {
                tracing::warn!(error = %message, records = lines.summary.records, "NDJSON body read failed");
                return Err(StreamError::Transport {
                    status: None,
                    message: format!("body read failed: {message}"),
                    records_delivered: lines.summary.records,
                });
            }
            Read::TimedOut(limit) => {
                return Err(lines.cancelled(CancelReason::Timeout(limit)));
            }
        }
    }

    lines.finish(handler).await
}

async fn next_chunk<S, E>(
    mut body: std::pin::Pin<&mut S>,
    read_timeout: Option<std::time::Duration>,
) -> Read
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let next = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, body.next()).await {
            Ok(next) => next,
            Err(_) => return Read::TimedOut(limit),
        },
        None => body.next().await,
    };
    match next {
        Some(Ok(chunk)) => Read::Chunk(chunk),
        Some(Err(e)) => Read::Failed(e.to_string()),
        None => Read::End,
    }
}

/// Per-call parse state. Owns the [`LineBuffer`] for the lifetime of the call.
struct LinePump<'a> {
    buffer: LineBuffer,
    summary: StreamSummary,
    config: &'a StreamConfig,
    cancel: &'a CancellationToken,
    deadline: &'a Deadline,
}

impl<'a> LinePump<'a> {
    fn new(config: &'a StreamConfig, cancel: &'a CancellationToken, deadline: &'a Deadline) -> Self {
        Self {
            buffer: LineBuffer::new(),
            summary: StreamSummary::default(),
            config,
            cancel,
            deadline,
        }
    }

    fn cancelled(&self, reason: CancelReason) -> StreamError {
        tracing::debug!(%reason, records = self.summary.records, "NDJSON stream stopped early");
        StreamError::Cancelled {
            reason,
            records_delivered: self.summary.records,
        }
    }

    /// Cancellation or deadline observed between handler calls.
    fn interrupted(&self) -> Option<StreamError> {
        if self.cancel.is_cancelled() {
            return Some(self.cancelled(CancelReason::Caller));
        }
        self.deadline
            .expired()
            .map(|limit| self.cancelled(CancelReason::Timeout(limit)))
    }

    async fn push<H: RecordHandler>(&mut self, chunk: Bytes, handler: &mut H) -> Result<(), StreamError> {
        self.summary.bytes += chunk.len() as u64;
        self.buffer.push(&chunk);

        while let Some(line) = self.buffer.next_line() {
            if let Some(err) = self.interrupted() {
                return Err(err);
            }
            self.line(&line, handler).await?;
        }

        match self.config.max_line_bytes {
            Some(limit) if self.buffer.pending_line_len() > limit => Err(StreamError::LineTooLong {
                line_number: self.summary.lines + 1,
                limit,
            }),
            _ => Ok(()),
        }
    }

    async fn finish<H: RecordHandler>(mut self, handler: &mut H) -> Result<StreamSummary, StreamError> {
        if let Some(rest) = self.buffer.finish() {
            if let Some(err) = self.interrupted() {
                return Err(err);
            }
            self.summary.trailing = match self.line(&rest, handler).await? {
                Fate::Record => TrailingFragment::Parsed,
                Fate::Blank => TrailingFragment::Dropped,
                Fate::Malformed => TrailingFragment::Malformed,
            };
        }

        tracing::debug!(
            records = self.summary.records,
            malformed = self.summary.malformed,
            lines = self.summary.lines,
            bytes = self.summary.bytes,
            trailing = ?self.summary.trailing,
            "NDJSON stream complete"
        );
        Ok(self.summary)
    }

    async fn line<H: RecordHandler>(&mut self, line: &[u8], handler: &mut H) -> Result<Fate, StreamError> {
        self.summary.lines += 1;
        let line_number = self.summary.lines;

        if let Some(limit) = self.config.max_line_bytes {
            if line.len() > limit {
                return Err(StreamError::LineTooLong { line_number, limit });
            }
        }

        match parse_line(line) {
            ParsedLine::Blank => Ok(Fate::Blank),
            ParsedLine::Record(value) => {
                tracing::trace!(line = line_number, "NDJSON record");
                handler.on_record(StreamRecord { line_number, value }).await;
                self.summary.records += 1;
                Ok(Fate::Record)
            }
            ParsedLine::Malformed(error) => {
                let raw_line = String::from_utf8_lossy(line).into_owned();
                match self.config.malformed {
                    MalformedPolicy::Continue => {
                        handler
                            .on_malformed(MalformedRecord {
                                line_number,
                                raw_line,
                                error,
                            })
                            .await;
                        self.summary.malformed += 1;
                        Ok(Fate::Malformed)
                    }
                    MalformedPolicy::FailFast => Err(StreamError::Malformed {
                        line_number,
                        raw_line,
                        source: error,
                    }),
                }
            }
        }
    }
}

enum Fate {
    Record,
    Blank,
    Malformed,
}
