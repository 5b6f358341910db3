#![deny(missing_docs)]
//! Typed client for the mailcheck email-verification HTTP API.
//!
//! Covers single and batch verification, job status and results, statistics
//! and history, batch naming and application settings. The batch endpoint
//! answers with newline-delimited JSON, consumed through [`mailcheck_stream`]
//! so results reach the caller while the job is still running.

mod batch;
mod client;
mod error;
mod types;

pub use batch::{
    BatchEvent, BatchHandler, BatchOutcome, BatchReport, JobCompleted, JobFailed, JobStarted,
};
pub use client::{BASE_URL_ENV, VerifyClient};
pub use error::ClientError;
pub use types::{
    AllResults, BatchNames, BatchRequest, Category, CategoryCounts, CategoryStatistics,
    EmailResult, GlobalStatistics, JobResults, JobState, ResultCounts, Setting, Settings,
    SimplifiedResult, UpdateBatchNameResponse, UpdateSettingsResponse, VerificationStatus,
};

pub use mailcheck_stream::{
    CancelReason, MalformedPolicy, MalformedRecord, StreamConfig, StreamError, StreamSummary,
};
