//! Error types for SMTP stream parsing.

use std::fmt;

/// Result type alias for SMTP parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of an SMTP conversation a parser decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes sent by the SMTP client (commands and message data).
    Client,
    /// Bytes sent by the SMTP server (status replies).
    Server,
}

impl Direction {
    /// Returns the lowercase name of the direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The grammar rule a byte stream broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// A CR was not followed by LF.
    #[error("expecting LF")]
    ExpectingLf,

    /// A status code ended before three digits were read.
    #[error("expected 3-char status")]
    StatusTooShort,

    /// A fourth digit followed a complete status code.
    #[error("status code too long")]
    StatusTooLong,

    /// A status code contained a byte that is not a digit.
    #[error("status code not numeric")]
    StatusNotNumeric,

    /// A continuation line carried a different code than the first line.
    #[error("inconsistent status across continuation")]
    InconsistentStatus,

    /// A command line or reply line grew past the configured limit.
    #[error("line too long")]
    LineTooLong,

    /// A DATA payload grew past the configured limit.
    #[error("message body too large")]
    BodyTooLarge,

    /// More `RCPT TO` recipients than the configured limit.
    #[error("too many recipients")]
    TooManyRecipients,

    /// A continuation group had more lines than the configured limit.
    #[error("too many reply lines")]
    TooManyReplyLines,

    /// Bytes arrived after the stream already broke the grammar. The offset
    /// is that of the earlier violation.
    #[error("parser stopped at an earlier violation")]
    ParserFailed,
}

/// SMTP stream parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The byte stream does not conform to the SMTP grammar.
    #[error("SMTP {direction} protocol violation at byte {offset}: {violation}")]
    ProtocolViolation {
        /// Direction of the offending stream.
        direction: Direction,
        /// Offset of the offending byte from the start of the stream.
        offset: u64,
        /// The rule that was broken.
        violation: Violation,
    },

    /// The parser reached a state its own transitions should rule out.
    ///
    /// This is a bug in the parser, never a consequence of the input.
    #[error("SMTP {direction} parser has no transition from state {state}")]
    UnimplementedState {
        /// Direction of the parser.
        direction: Direction,
        /// Name of the state.
        state: &'static str,
    },
}

impl Error {
    /// Creates a protocol violation error.
    #[must_use]
    pub const fn violation(direction: Direction, offset: u64, violation: Violation) -> Self {
        Self::ProtocolViolation {
            direction,
            offset,
            violation,
        }
    }

    /// Returns true if the input stream was malformed.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }

    /// Returns true if this error indicates a parser bug rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::UnimplementedState { .. })
    }

    /// Returns the broken grammar rule, if this is a protocol violation.
    #[must_use]
    pub const fn kind(&self) -> Option<Violation> {
        match self {
            Self::ProtocolViolation { violation, .. } => Some(*violation),
            Self::UnimplementedState { .. } => None,
        }
    }

    /// Returns the direction of the parser that raised this error.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::ProtocolViolation { direction, .. } | Self::UnimplementedState { direction, .. } => {
                *direction
            }
        }
    }
}
