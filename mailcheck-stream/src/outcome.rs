//! Terminal summary of a successful streaming call.

/// What happened to bytes left in the buffer when the body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingFragment {
    /// The body ended on a newline; nothing was left over.
    #[default]
    None,
    /// The unterminated final line parsed and was delivered as a record.
    Parsed,
    /// The leftover bytes were whitespace and were discarded.
    Dropped,
    /// The leftover bytes were not valid JSON and were reported as malformed.
    Malformed,
}

/// Counters for a stream that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Records delivered to the handler.
    pub records: u64,
    /// Lines reported to the handler as malformed.
    pub malformed: u64,
    /// Lines seen, blank lines included.
    pub lines: u64,
    /// Body bytes received.
    pub bytes: u64,
    /// Fate of the unterminated tail.
    pub trailing: TrailingFragment,
}

impl StreamSummary {
    /// Whether every non-blank line parsed.
    pub fn is_clean(&self) -> bool {
        self.malformed == 0
    }
}
