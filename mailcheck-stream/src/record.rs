//! Parsed records and rejected lines.

use serde_json::Value;

/// One JSON value recovered from one line of the body.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// 1-based line number within the response body.
    pub line_number: u64,
    /// The parsed value. No schema is assumed at this layer.
    pub value: Value,
}

/// A non-blank line that failed to parse as JSON.
#[derive(Debug)]
pub struct MalformedRecord {
    /// 1-based line number within the response body.
    pub line_number: u64,
    /// The line as received, lossily decoded as UTF-8.
    pub raw_line: String,
    /// The parser error.
    pub error: serde_json::Error,
}

/// Result of classifying a single candidate line.
#[derive(Debug)]
pub(crate) enum ParsedLine {
    /// Empty or whitespace-only; neither a record nor an error.
    Blank,
    Record(Value),
    Malformed(serde_json::Error),
}

/// Classify one line. Invalid UTF-8 is reported as malformed JSON.
pub(crate) fn parse_line(line: &[u8]) -> ParsedLine {
    if line.iter().all(u8::is_ascii_whitespace) {
        return ParsedLine::Blank;
    }
    match serde_json::from_slice::<Value>(line) {
        Ok(value) => ParsedLine::Record(value),
        Err(e) => ParsedLine::Malformed(e),
    }
}
