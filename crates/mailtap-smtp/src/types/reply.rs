//! SMTP reply types.

use std::fmt;

/// A complete (possibly multi-line) SMTP reply observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code shared by every line of the reply.
    pub code: ReplyCode,
    /// Text of each line, without code, separator or CRLF, in wire order.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if the server refused the command (4xx or 5xx).
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self.code.class(),
            ReplyClass::TransientError | ReplyClass::PermanentError
        )
    }
}

/// The outcome a reply code's first digit announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyClass {
    /// 2xx: the command completed.
    Success,
    /// 3xx: more input is expected, as after `DATA`.
    Intermediate,
    /// 4xx: the command failed but may succeed if retried.
    TransientError,
    /// 5xx: the command failed for good.
    PermanentError,
    /// Any other first digit.
    Unknown,
}

impl ReplyClass {
    /// Returns the snake_case name of the class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Intermediate => "intermediate",
            Self::TransientError => "transient_error",
            Self::PermanentError => "permanent_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReplyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Builds a code from exactly three ASCII digits.
    ///
    /// Returns `None` if any byte is not a digit.
    #[must_use]
    pub const fn from_digits(digits: [u8; 3]) -> Option<Self> {
        let mut value = 0u16;
        let mut i = 0;
        while i < digits.len() {
            let digit = digits[i];
            if !digit.is_ascii_digit() {
                return None;
            }
            value = value * 10 + (digit - b'0') as u16;
            i += 1;
        }
        Some(Self(value))
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the class given by the first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Success,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::TransientError,
            5 => ReplyClass::PermanentError,
            _ => ReplyClass::Unknown,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}
