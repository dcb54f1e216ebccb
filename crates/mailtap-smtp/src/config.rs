//! Parser configuration.

use serde::{Deserialize, Serialize};

/// Default bound on a command line or reply text line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Default bound on a DATA payload (32 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Default bound on the number of `RCPT TO` recipients per transaction.
pub const DEFAULT_MAX_RECIPIENTS: usize = 1000;

/// Default bound on the number of lines in one reply.
pub const DEFAULT_MAX_REPLY_LINES: usize = 512;

/// Limits applied by the client and server parsers.
///
/// Every buffer a parser accumulates is bounded by one of these values;
/// exceeding a bound is reported as a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum length of a command line or a reply text line, excluding CRLF.
    pub max_line_length: usize,
    /// Maximum size of a DATA payload, including the end-of-data marker.
    pub max_body_size: usize,
    /// Maximum number of recipients collected for one transaction.
    pub max_recipients: usize,
    /// Maximum number of lines in one (multi-line) reply.
    pub max_reply_lines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            max_reply_lines: DEFAULT_MAX_REPLY_LINES,
        }
    }
}

impl ParserConfig {
    /// Creates a configuration with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn with_max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Sets the maximum DATA payload size.
    #[must_use]
    pub const fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Sets the maximum number of recipients per transaction.
    #[must_use]
    pub const fn with_max_recipients(mut self, count: usize) -> Self {
        self.max_recipients = count;
        self
    }

    /// Sets the maximum number of lines per reply.
    #[must_use]
    pub const fn with_max_reply_lines(mut self, count: usize) -> Self {
        self.max_reply_lines = count;
        self
    }
}
