//! Configuration for streaming calls.

use std::time::Duration;

/// What to do with a non-blank line that is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Report the line to [`RecordHandler::on_malformed`](crate::RecordHandler::on_malformed)
    /// and keep reading.
    #[default]
    Continue,
    /// Abort the call with [`StreamError::Malformed`](crate::StreamError::Malformed).
    FailFast,
}

/// Static configuration for an [`NdjsonClient`](crate::NdjsonClient).
///
/// All limits are optional; unset limits are not enforced.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Malformed-line policy. Defaults to [`MalformedPolicy::Continue`].
    pub malformed: MalformedPolicy,

    /// Maximum wait for any single chunk of the body.
    pub read_timeout: Option<Duration>,

    /// Deadline for the whole call, from sending the request to end of body.
    pub total_timeout: Option<Duration>,

    /// Maximum bytes in one line, terminator excluded.
    pub max_line_bytes: Option<usize>,
}

impl StreamConfig {
    /// Abort on the first malformed line instead of reporting it.
    #[must_use]
    pub fn fail_fast(mut self) -> Self {
        self.malformed = MalformedPolicy::FailFast;
        self
    }

    /// Set the malformed-line policy.
    #[must_use]
    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    /// Set the per-chunk read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the whole-call deadline.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Cap the size of a single line.
    #[must_use]
    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = Some(limit);
        self
    }
}
