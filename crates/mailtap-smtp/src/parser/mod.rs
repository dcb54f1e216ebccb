//! Incremental SMTP stream parsers.
//!
//! Both parsers consume one byte at a time through [`FlowParser::advance`],
//! so a protocol unit may be split across any number of [`FlowParser::parse`]
//! calls. Feeding a stream in one call or in many chunks yields the same
//! events.
//!
//! After a protocol violation a parser enters its `Failed` state. It keeps
//! its partial buffers for inspection but rejects further bytes with
//! [`Violation::ParserFailed`](crate::Violation::ParserFailed) until
//! [`FlowParser::reset`] is called.

mod client;
mod server;

pub use client::{ClientParser, ClientState};
pub use server::{ServerParser, ServerState};

use crate::config::ParserConfig;
use crate::error::{Direction, Error, Result};
use crate::event::{Event, EventSink};

/// A per-flow, per-direction incremental parser.
pub trait FlowParser {
    /// Side of the conversation this parser decodes.
    const DIRECTION: Direction;

    /// Creates a parser in its initial state.
    fn with_config(config: ParserConfig) -> Self;

    /// Consumes a single byte, returning the event it completes, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the byte breaks the grammar or
    /// the parser has already failed.
    fn advance(&mut self, byte: u8) -> Result<Option<Event>>;

    /// Returns the parser to its initial state, discarding all buffers.
    fn reset(&mut self);

    /// Returns true if the parser stopped at a protocol violation.
    fn is_failed(&self) -> bool;

    /// Returns the number of bytes consumed since creation or the last reset.
    fn consumed(&self) -> u64;

    /// Consumes `bytes` in order, handing each completed event to `sink`.
    ///
    /// # Errors
    ///
    /// Stops at the first byte that fails [`advance`](Self::advance). Events
    /// completed before that byte have already been delivered.
    fn parse<K, S>(&mut self, flow: &K, bytes: &[u8], sink: &mut S) -> Result<()>
    where
        K: ?Sized,
        S: EventSink<K> + ?Sized,
    {
        for &byte in bytes {
            if let Some(event) = self.advance(byte)? {
                tracing::trace!(direction = %Self::DIRECTION, ?event, "event");
                event.deliver(flow, sink);
            }
        }
        Ok(())
    }
}

/// Builds the error for a state the parser's own transitions rule out.
const fn no_transition(direction: Direction, state: &'static str) -> Error {
    Error::UnimplementedState { direction, state }
}
