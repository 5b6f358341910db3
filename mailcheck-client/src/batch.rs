//! Typed events of the streamed `POST /api/verify/batch` response.
//!
//! The server writes one JSON object per line: a `started` status, one line
//! per verified address, then a `completed` or `failed` status.

use std::future::{Future, ready};

use mailcheck_stream::{MalformedRecord, RecordHandler, StreamRecord, StreamSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EmailResult, JobState, ResultCounts};

/// First line of a batch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStarted {
    /// Job identifier, usable with `verification_status`.
    pub job_id: String,
    /// Addresses submitted.
    #[serde(default)]
    pub total_emails: u64,
    /// Server message.
    #[serde(default)]
    pub message: Option<String>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Successful final line of a batch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompleted {
    /// Job identifier.
    pub job_id: String,
    /// Addresses submitted.
    #[serde(default)]
    pub total_emails: u64,
    /// Addresses that produced a result line.
    #[serde(default)]
    pub verified_emails: u64,
    /// Counts per category, when the server includes them.
    #[serde(default)]
    pub results: Option<ResultCounts>,
    /// Server message.
    #[serde(default)]
    pub message: Option<String>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Failed final line of a batch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailed {
    /// Job identifier.
    pub job_id: String,
    /// Failure description.
    #[serde(default)]
    pub error: Option<String>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One line of a batch stream, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The job was accepted.
    Started(JobStarted),
    /// One address was verified.
    Result(EmailResult),
    /// The job finished.
    Completed(JobCompleted),
    /// The job failed.
    Failed(JobFailed),
    /// Valid JSON that matches none of the known shapes.
    Other(Value),
}

impl BatchEvent {
    /// Classify a record. Never fails: unrecognized shapes become [`BatchEvent::Other`].
    pub fn from_value(value: Value) -> Self {
        if value.get("email").is_some() {
            return match EmailResult::deserialize(&value) {
                Ok(result) => BatchEvent::Result(result),
                Err(e) => {
                    tracing::debug!(error = %e, "result line did not match expected shape");
                    BatchEvent::Other(value)
                }
            };
        }

        let parsed = match value.get("status").and_then(Value::as_str) {
            Some("started") => JobStarted::deserialize(&value).map(BatchEvent::Started).ok(),
            Some("completed") => JobCompleted::deserialize(&value)
                .map(BatchEvent::Completed)
                .ok(),
            Some("failed") => JobFailed::deserialize(&value).map(BatchEvent::Failed).ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| BatchEvent::Other(value))
    }

    /// The job state this event moves the job into, if any.
    pub fn job_state(&self) -> Option<JobState> {
        match self {
            BatchEvent::Started(_) => Some(JobState::Started),
            BatchEvent::Completed(_) => Some(JobState::Completed),
            BatchEvent::Failed(_) => Some(JobState::Failed),
            BatchEvent::Result(_) | BatchEvent::Other(_) => None,
        }
    }

    fn job_id(&self) -> Option<&str> {
        match self {
            BatchEvent::Started(e) => Some(&e.job_id),
            BatchEvent::Completed(e) => Some(&e.job_id),
            BatchEvent::Failed(e) => Some(&e.job_id),
            BatchEvent::Result(_) | BatchEvent::Other(_) => None,
        }
    }
}

/// Receives batch events in arrival order.
///
/// Implemented for any `FnMut(BatchEvent) + Send` closure.
pub trait BatchHandler: Send {
    /// Called once per record.
    fn on_event(&mut self, event: BatchEvent) -> impl Future<Output = ()> + Send;

    /// Called for lines that are not valid JSON. The default logs and moves on.
    fn on_malformed(&mut self, malformed: MalformedRecord) -> impl Future<Output = ()> + Send {
        tracing::warn!(
            line = malformed.line_number,
            raw = %malformed.raw_line,
            error = %malformed.error,
            "skipping malformed batch line"
        );
        ready(())
    }
}

impl<F> BatchHandler for F
where
    F: FnMut(BatchEvent) + Send,
{
    fn on_event(&mut self, event: BatchEvent) -> impl Future<Output = ()> + Send {
        self(event);
        ready(())
    }
}

/// What a finished batch stream reported.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Stream-level counters.
    pub summary: StreamSummary,
    /// Job id announced by the server, if any line carried one.
    pub job_id: Option<String>,
    /// Last job state announced. `None` if no status line arrived.
    pub state: Option<JobState>,
    /// Per-address result lines received.
    pub results: u64,
}

impl BatchOutcome {
    /// Whether the server announced successful completion.
    pub fn is_completed(&self) -> bool {
        self.state == Some(JobState::Completed)
    }
}

/// Every event of a batch, collected after the stream closed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Job-level outcome.
    pub outcome: BatchOutcome,
    /// Events in arrival order.
    pub events: Vec<BatchEvent>,
}

impl BatchReport {
    /// Per-address results, in arrival order.
    pub fn results(&self) -> impl Iterator<Item = &EmailResult> {
        self.events.iter().filter_map(|event| match event {
            BatchEvent::Result(result) => Some(result),
            _ => None,
        })
    }
}

/// Bridges raw stream records to a [`BatchHandler`], tracking job progress.
pub(crate) struct BatchEvents<'a, H> {
    handler: &'a mut H,
    pub(crate) job_id: Option<String>,
    pub(crate) state: Option<JobState>,
    pub(crate) results: u64,
}

impl<'a, H: BatchHandler> BatchEvents<'a, H> {
    pub(crate) fn new(handler: &'a mut H) -> Self {
        Self {
            handler,
            job_id: None,
            state: None,
            results: 0,
        }
    }

    pub(crate) fn into_outcome(self, summary: StreamSummary) -> BatchOutcome {
        BatchOutcome {
            summary,
            job_id: self.job_id,
            state: self.state,
            results: self.results,
        }
    }
}

impl<H: BatchHandler> RecordHandler for BatchEvents<'_, H> {
    async fn on_record(&mut self, record: StreamRecord) {
        let event = BatchEvent::from_value(record.value);
        if let Some(job_id) = event.job_id() {
            self.job_id = Some(job_id.to_string());
        }
        if let Some(state) = event.job_state() {
            tracing::debug!(job_id = ?self.job_id, ?state, "batch job state");
            self.state = Some(state);
        }
        if matches!(event, BatchEvent::Result(_)) {
            self.results += 1;
        }
        self.handler.on_event(event).await;
    }

    async fn on_malformed(&mut self, malformed: MalformedRecord) {
        self.handler.on_malformed(malformed).await;
    }
}
