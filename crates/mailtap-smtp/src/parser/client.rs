//! Client-direction parser: command lines and DATA payloads.

use bytes::BytesMut;

use super::FlowParser;
use crate::command::Command;
use crate::config::ParserConfig;
use crate::error::{Direction, Error, Result, Violation};
use crate::event::Event;

/// End-of-data marker. The leading CRLF ends the last content line and stays
/// in the body.
const END_OF_DATA: &[u8] = b"\r\n.\r\n";

/// The part of [`END_OF_DATA`] stripped from the body.
const DOT_LINE: &[u8] = b".\r\n";

/// Position of the client parser in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Accumulating a command line.
    #[default]
    InCommand,
    /// Saw CR at the end of a command line, expecting LF.
    ExpectLf,
    /// Accumulating a message body until the end-of-data marker.
    InData,
    /// Stopped at a protocol violation.
    Failed,
}

impl ClientState {
    /// Returns the state name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InCommand => "InCommand",
            Self::ExpectLf => "ExpectLf",
            Self::InData => "InData",
            Self::Failed => "Failed",
        }
    }
}

/// Incremental parser for bytes sent by an SMTP client.
///
/// Emits [`Event::Command`] for every command line and
/// [`Event::MessageBody`] when a DATA payload completes. The envelope
/// (`MAIL FROM` sender and `RCPT TO` recipients) is tracked across lines and
/// attached to the body.
#[derive(Debug)]
pub struct ClientParser {
    state: ClientState,
    command: Vec<u8>,
    data: BytesMut,
    from: String,
    to: Vec<String>,
    consumed: u64,
    config: ParserConfig,
}

impl Default for ClientParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientParser {
    /// Creates a parser with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// Returns the sender of the transaction in progress.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Returns the recipients of the transaction in progress.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    /// Returns the number of body bytes buffered so far.
    #[must_use]
    pub fn pending_body_len(&self) -> usize {
        self.data.len()
    }

    const fn violation(&self, violation: Violation) -> Error {
        Error::violation(Direction::Client, self.consumed, violation)
    }

    fn step(&mut self, byte: u8) -> Result<Option<Event>> {
        match self.state {
            ClientState::InCommand => {
                if byte == b'\r' {
                    self.state = ClientState::ExpectLf;
                } else if self.command.len() >= self.config.max_line_length {
                    return Err(self.violation(Violation::LineTooLong));
                } else {
                    self.command.push(byte);
                }
                Ok(None)
            }

            ClientState::ExpectLf => {
                if byte != b'\n' {
                    return Err(self.violation(Violation::ExpectingLf));
                }
                self.complete_command().map(Some)
            }

            ClientState::InData => {
                if self.data.len() >= self.config.max_body_size {
                    return Err(self.violation(Violation::BodyTooLarge));
                }
                self.data.extend_from_slice(&[byte]);
                Ok(self.complete_body())
            }

            ClientState::Failed => Err(self.violation(Violation::ParserFailed)),
        }
    }

    /// Handles a CRLF-terminated command line.
    fn complete_command(&mut self) -> Result<Event> {
        let command = Command::parse(&self.command);

        if matches!(command, Ok(Command::RcptTo { .. }))
            && self.to.len() >= self.config.max_recipients
        {
            return Err(self.violation(Violation::TooManyRecipients));
        }

        let line = String::from_utf8_lossy(&self.command).into_owned();
        self.command.clear();
        self.state = ClientState::InCommand;

        match command {
            Ok(Command::MailFrom { from }) => self.from = from,
            Ok(Command::RcptTo { to }) => self.to.push(to),
            Ok(Command::Data) => {
                self.data.clear();
                self.state = ClientState::InData;
            }
            Ok(Command::Rset) => {
                self.data.clear();
                self.from.clear();
                self.to.clear();
            }
            Ok(Command::Other) => {}
            Err(e) => tracing::debug!(command = %line, error = %e, "Unrecognised envelope command"),
        }

        Ok(Event::Command(line))
    }

    /// Checks the body buffer for the end-of-data marker.
    fn complete_body(&mut self) -> Option<Event> {
        // The body starts at the beginning of a line, so a lone dot line
        // right after DATA ends an empty message.
        if !(self.data.ends_with(END_OF_DATA) || self.data[..] == *DOT_LINE) {
            return None;
        }

        self.data.truncate(self.data.len() - DOT_LINE.len());
        self.state = ClientState::InCommand;

        Some(Event::MessageBody {
            sender: std::mem::take(&mut self.from),
            recipients: std::mem::take(&mut self.to),
            body: self.data.split().freeze(),
        })
    }
}

impl FlowParser for ClientParser {
    const DIRECTION: Direction = Direction::Client;

    fn with_config(config: ParserConfig) -> Self {
        Self {
            state: ClientState::InCommand,
            command: Vec::new(),
            data: BytesMut::new(),
            from: String::new(),
            to: Vec::new(),
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
                    self.state = ClientState::Failed;
                }
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::with_config(self.config);
    }

    fn is_failed(&self) -> bool {
        self.state == ClientState::Failed
    }

    fn consumed(&self) -> u64 {
        self.consumed
    }
}
