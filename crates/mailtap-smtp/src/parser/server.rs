//! Server-direction parser: status lines and continuation groups.

use super::{FlowParser, no_transition};
use crate::config::ParserConfig;
use crate::error::{Direction, Error, Result, Violation};
use crate::event::Event;
use crate::types::{Reply, ReplyCode};

/// Position of the server parser in a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Accumulating the three status digits.
    #[default]
    InStatusCode,
    /// Accumulating the free text after the separator.
    InText,
    /// Saw CR at the end of a line, expecting LF.
    ExpectLf,
    /// Stopped at a protocol violation.
    Failed,
}

impl ServerState {
    /// Returns the state name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InStatusCode => "InStatusCode",
            Self::InText => "InText",
            Self::ExpectLf => "ExpectLf",
            Self::Failed => "Failed",
        }
    }
}

/// Incremental parser for bytes sent by an SMTP server.
///
/// Lines of the form `250-text` continue a reply and `250 text` ends it. All
/// lines of one reply must carry the same code; the reply is emitted as a
/// single [`Event::Response`] when its last line completes.
#[derive(Debug)]
pub struct ServerParser {
    state: ServerState,
    status: [u8; 3],
    status_len: usize,
    text: Vec<u8>,
    /// Another line of the same reply follows.
    cont: bool,
    /// Code of the first line of the current reply, `None` before it.
    last_status: Option<ReplyCode>,
    texts: Vec<String>,
    consumed: u64,
    config: ParserConfig,
}

impl Default for ServerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerParser {
    /// Creates a parser with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the lines collected so far for an unfinished reply.
    #[must_use]
    pub fn pending_lines(&self) -> &[String] {
        &self.texts
    }

    const fn violation(&self, violation: Violation) -> Error {
        Error::violation(Direction::Server, self.consumed, violation)
    }

    fn step(&mut self, byte: u8) -> Result<Option<Event>> {
        match self.state {
            ServerState::InStatusCode => {
                if byte == b' ' || byte == b'-' {
                    if self.status_len != self.status.len() {
                        return Err(self.violation(Violation::StatusTooShort));
                    }
                    self.cont = byte == b'-';
                    self.state = ServerState::InText;
                } else if self.status_len == self.status.len() {
                    return Err(self.violation(Violation::StatusTooLong));
                } else if !byte.is_ascii_digit() {
                    return Err(self.violation(Violation::StatusNotNumeric));
                } else {
                    self.status[self.status_len] = byte;
                    self.status_len += 1;
                }
                Ok(None)
            }

            ServerState::InText => {
                if byte == b'\r' {
                    self.state = ServerState::ExpectLf;
                } else if self.text.len() >= self.config.max_line_length {
                    return Err(self.violation(Violation::LineTooLong));
                } else {
                    self.text.push(byte);
                }
                Ok(None)
            }

            ServerState::ExpectLf => {
                if byte != b'\n' {
                    return Err(self.violation(Violation::ExpectingLf));
                }
                self.complete_line()
            }

            ServerState::Failed => Err(self.violation(Violation::ParserFailed)),
        }
    }

    /// Handles a CRLF-terminated reply line.
    fn complete_line(&mut self) -> Result<Option<Event>> {
        // InStatusCode only hands over three verified digits.
        let code = ReplyCode::from_digits(self.status)
            .ok_or_else(|| no_transition(Direction::Server, self.state.name()))?;

        match self.last_status {
            Some(last) if last != code => {
                return Err(self.violation(Violation::InconsistentStatus));
            }
            Some(_) => {}
            None => self.last_status = Some(code),
        }

        if self.texts.len() >= self.config.max_reply_lines {
            return Err(self.violation(Violation::TooManyReplyLines));
        }
        self.texts
            .push(String::from_utf8_lossy(&self.text).into_owned());

        self.text.clear();
        self.status_len = 0;
        self.state = ServerState::InStatusCode;

        if self.cont {
            return Ok(None);
        }

        self.last_status = None;
        let lines = std::mem::take(&mut self.texts);
        Ok(Some(Event::Response(Reply::new(code, lines))))
    }
}

impl FlowParser for ServerParser {
    const DIRECTION: Direction = Direction::Server;

    fn with_config(config: ParserConfig) -> Self {
        Self {
            state: ServerState::InStatusCode,
            status: [0; 3],
            status_len: 0,
            text: Vec::new(),
            cont: false,
            last_status: None,
            texts: Vec::new(),
            consumed: 0,
            config,
        }
    }

    fn advance(&mut self, byte: u8) -> Result<Option<Event>> {
        match self.step(byte) {
            Ok(event) => {
                self.consumed += 1;
                Ok(event)
            }
            Err(e) => {
                if e.is_protocol_violation() {
                    self.state = ServerState::Failed;
                }
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::with_config(self.config);
    }

    fn is_failed(&self) -> bool {
        self.state == ServerState::Failed
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }
}
