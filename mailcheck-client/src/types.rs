//! Request and response bodies of the verification API.
//!
//! Timestamps are kept as the server's `"%Y-%m-%d %H:%M:%S"` strings; the
//! client does not interpret them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Verdict for one email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Deliverable.
    Valid,
    /// Not deliverable.
    Invalid,
    /// Accept-all, disposable or otherwise uncertain.
    Risky,
    /// Classified by a user-defined rule.
    Custom,
    /// A category this client does not know yet.
    #[serde(other)]
    Unknown,
}

/// Lifecycle state of a verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, workers not yet running.
    Started,
    /// Workers are verifying addresses.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// A state this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl Category {
    /// The lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Valid => "valid",
            Category::Invalid => "invalid",
            Category::Risky => "risky",
            Category::Custom => "custom",
            Category::Unknown => "unknown",
        }
    }
}

impl JobState {
    /// Whether the job will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// `GET /api/statistics/category` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStatistics {
    /// Totals across every verified address.
    pub categories: CategoryCounts,
    /// When the statistics were computed.
    pub timestamp: String,
}

/// Per-category totals, including the grand total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Valid addresses.
    #[serde(default)]
    pub valid: u64,
    /// Invalid addresses.
    #[serde(default)]
    pub invalid: u64,
    /// Risky addresses.
    #[serde(default)]
    pub risky: u64,
    /// All addresses.
    #[serde(default)]
    pub total: u64,
}

/// Per-category counts for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    /// Valid addresses.
    #[serde(default)]
    pub valid: u64,
    /// Invalid addresses.
    #[serde(default)]
    pub invalid: u64,
    /// Risky addresses.
    #[serde(default)]
    pub risky: u64,
    /// Addresses matched by custom rules.
    #[serde(default)]
    pub custom: u64,
}

impl ResultCounts {
    /// Sum of all categories.
    pub fn total(&self) -> u64 {
        self.valid + self.invalid + self.risky + self.custom
    }
}

/// Verdict for one address, as reported in job status and batch streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailResult {
    /// The address that was checked.
    pub email: String,
    /// The verdict.
    pub category: Category,
    /// Mail provider detected for the domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// When the verdict was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Why the verdict was reached. Single-address checks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Raw check details. Single-address checks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Set when the check itself failed and the verdict is a fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/verify/email` request body.
#[derive(Debug, Serialize)]
pub(crate) struct VerifyEmail<'a> {
    pub email: &'a str,
}

/// `GET /api/verify/status/{job_id}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    /// Job identifier.
    pub job_id: String,
    /// Current state.
    pub status: JobState,
    /// When the job started.
    #[serde(default)]
    pub start_time: Option<String>,
    /// When the job ended, once terminal.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Addresses submitted.
    #[serde(default)]
    pub total_emails: u64,
    /// Addresses verified so far.
    #[serde(default)]
    pub verified_emails: u64,
    /// Counts per category.
    #[serde(default)]
    pub results: ResultCounts,
    /// Verdicts keyed by address.
    #[serde(default)]
    pub email_results: BTreeMap<String, EmailResult>,
}

/// `GET /api/results` response. Both maps are keyed by source (data file or
/// job id) and keep the server's shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllResults {
    /// Results read from the data directory.
    #[serde(default)]
    pub data_results: BTreeMap<String, Value>,
    /// Results read from job directories.
    #[serde(default)]
    pub job_results: BTreeMap<String, Value>,
}

/// Per-address row of a job's simplified results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedResult {
    /// Verdict as written in the results file.
    pub status: String,
    /// Mail provider, `"unknown"` when not recorded.
    #[serde(default)]
    pub provider: String,
}

/// `GET /api/results/{job_id}` response: the job status plus its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResults {
    /// Job status fields.
    #[serde(flatten)]
    pub status: VerificationStatus,
    /// Verdicts keyed by address, when the job wrote a simplified results file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified_results: Option<BTreeMap<String, SimplifiedResult>>,
    /// Detailed results otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_results: Option<Value>,
}

/// `GET /api/statistics` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    /// When the statistics were computed.
    #[serde(default)]
    pub timestamp: String,
    /// Totals per category.
    #[serde(default)]
    pub categories: ResultCounts,
    /// Sum over all categories.
    #[serde(default)]
    pub total_emails: u64,
    /// Per-domain statistics.
    #[serde(default)]
    pub domains: BTreeMap<String, Value>,
    /// Reason counts per category.
    #[serde(default)]
    pub reasons: BTreeMap<String, Value>,
    /// Set when the server could not load its statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One application setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Value, always sent and stored as a string.
    pub value: String,
    /// Whether the feature is on.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Setting {
    /// An enabled setting.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            enabled: true,
        }
    }

    /// Set whether the feature is on.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Settings keyed by feature name, as served by `GET /api/settings`.
pub type Settings = BTreeMap<String, Setting>;

/// `PUT /api/settings` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettingsResponse {
    /// Whether the settings were saved.
    pub success: bool,
    /// Server message.
    #[serde(default)]
    pub message: String,
    /// The settings after the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// `GET /api/batches` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNames {
    /// Display names keyed by batch id.
    #[serde(default)]
    pub batches: BTreeMap<String, String>,
}

impl BatchNames {
    /// Batch ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.batches.keys().map(String::as_str)
    }
}

/// `PUT /api/batches/{batch_id}/name` request body.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateBatchName<'a> {
    pub name: &'a str,
}

/// `PUT /api/batches/{batch_id}/name` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatchNameResponse {
    /// Whether the rename was applied.
    pub success: bool,
    /// Server message, e.g. `Batch name updated to "..."`.
    #[serde(default)]
    pub message: String,
}

/// `POST /api/verify/batch` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Addresses to verify.
    pub emails: Vec<String>,
    /// Job id to use instead of a server-generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl BatchRequest {
    /// Verify `emails` under a server-generated job id.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
            job_id: None,
        }
    }

    /// Pin the job id.
    #[must_use]
    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}
