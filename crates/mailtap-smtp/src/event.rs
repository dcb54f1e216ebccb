//! Decoded protocol events and the sinks that receive them.
//!
//! Parsers never keep decoded events. Each completed protocol unit is handed
//! to an [`EventSink`] together with the flow key it was observed on.
//!
//! # Example
//!
//! ```
//! use mailtap_smtp::event::EventSink;
//!
//! #[derive(Default)]
//! struct Counter {
//!     bodies: usize,
//! }
//!
//! impl EventSink<u32> for Counter {
//!     fn on_message_body(&mut self, _flow: &u32, _from: &str, _to: &[String], _body: &[u8]) {
//!         self.bodies += 1;
//!     }
//! }
//! ```

use bytes::Bytes;

use crate::types::Reply;

/// A decoded SMTP protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A completed client command line, verbatim and without CRLF.
    Command(String),

    /// A completed DATA payload with the envelope collected before it.
    MessageBody {
        /// Sender from the last `MAIL FROM`, empty if none.
        sender: String,
        /// Recipients from `RCPT TO`, in the order seen.
        recipients: Vec<String>,
        /// Payload with the end-of-data marker removed.
        body: Bytes,
    },

    /// A completed (possibly multi-line) server reply.
    Response(Reply),
}

impl Event {
    /// Hands this event to the matching sink callback.
    pub fn deliver<K, S>(&self, flow: &K, sink: &mut S)
    where
        K: ?Sized,
        S: EventSink<K> + ?Sized,
    {
        match self {
            Self::Command(command) => sink.on_command(flow, command),
            Self::MessageBody {
                sender,
                recipients,
                body,
            } => sink.on_message_body(flow, sender, recipients, body),
            Self::Response(reply) => sink.on_response(flow, reply),
        }
    }
}

/// Receiver of decoded protocol events.
///
/// Every method has an empty default so implementors only override the
/// events they care about. The flow key is whatever the host used to address
/// the parser.
pub trait EventSink<K: ?Sized> {
    /// Called for every completed client command line.
    fn on_command(&mut self, flow: &K, command: &str) {
        let _ = (flow, command);
    }

    /// Called when a DATA payload completes.
    fn on_message_body(&mut self, flow: &K, sender: &str, recipients: &[String], body: &[u8]) {
        let _ = (flow, sender, recipients, body);
    }

    /// Called when a server reply (all of its continuation lines) completes.
    fn on_response(&mut self, flow: &K, reply: &Reply) {
        let _ = (flow, reply);
    }
}

/// A sink that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl<K: ?Sized> EventSink<K> for NoopSink {}

/// A sink that logs events using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl<K: std::fmt::Debug + ?Sized> EventSink<K> for LoggingSink {
    fn on_command(&mut self, flow: &K, command: &str) {
        tracing::debug!(?flow, command, "SMTP command");
    }

    fn on_message_body(&mut self, flow: &K, sender: &str, recipients: &[String], body: &[u8]) {
        tracing::info!(
            ?flow,
            sender,
            ?recipients,
            size = body.len(),
            "SMTP message body"
        );
    }

    fn on_response(&mut self, flow: &K, reply: &Reply) {
        let code = reply.code.as_u16();
        let class = reply.code.class().as_str();
        if reply.is_error() {
            tracing::warn!(?flow, code, class, lines = ?reply.lines, "SMTP error response");
        } else {
            tracing::debug!(?flow, code, class, lines = ?reply.lines, "SMTP response");
        }
    }
}

/// A sink that collects events for later processing.
///
/// Useful for testing or batch processing of events.
#[derive(Debug, Clone)]
pub struct CollectingSink<K> {
    /// Collected events with the flow they were observed on.
    pub events: Vec<(K, Event)>,
}

impl<K> Default for CollectingSink<K> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<K> CollectingSink<K> {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all collected events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Takes all collected events, leaving the sink empty.
    pub fn take(&mut self) -> Vec<(K, Event)> {
        std::mem::take(&mut self.events)
    }

    /// Returns the collected events without their flow keys.
    #[must_use]
    pub fn events(&self) -> Vec<&Event> {
        self.events.iter().map(|(_, event)| event).collect()
    }
}

impl<K: Clone> EventSink<K> for CollectingSink<K> {
    fn on_command(&mut self, flow: &K, command: &str) {
        self.events
            .push((flow.clone(), Event::Command(command.to_string())));
    }

    fn on_message_body(&mut self, flow: &K, sender: &str, recipients: &[String], body: &[u8]) {
        self.events.push((
            flow.clone(),
            Event::MessageBody {
                sender: sender.to_string(),
                recipients: recipients.to_vec(),
                body: Bytes::copy_from_slice(body),
            },
        ));
    }

    fn on_response(&mut self, flow: &K, reply: &Reply) {
        self.events
            .push((flow.clone(), Event::Response(reply.clone())));
    }
}
