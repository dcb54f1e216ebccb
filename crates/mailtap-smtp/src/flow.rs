//! Per-flow parser dispatch.
//!
//! A [`FlowTable`] maps an opaque flow key to one parser instance, creating
//! it on first data. Each instance sits behind its own mutex, held for
//! exactly one `parse` call, so two calls for the same flow never overlap
//! while different flows proceed in parallel.
//!
//! [`Dispatcher`] pairs a client table with a server table, giving one entry
//! point per direction.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::config::ParserConfig;
use crate::error::{Direction, Error, Result};
use crate::event::EventSink;
use crate::parser::{ClientParser, FlowParser, ServerParser};

/// Parsers of one direction, keyed by flow.
#[derive(Debug)]
pub struct FlowTable<K, P> {
    flows: RwLock<HashMap<K, Arc<Mutex<P>>>>,
    config: ParserConfig,
}

impl<K, P> Default for FlowTable<K, P>
where
    K: Eq + Hash + Clone,
    P: FlowParser,
{
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl<K, P> FlowTable<K, P>
where
    K: Eq + Hash + Clone,
    P: FlowParser,
{
    /// Creates an empty table whose parsers use `config`.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the configuration new parsers are created with.
    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Feeds `bytes` to the parser for `flow`, creating it on first data.
    ///
    /// Empty input is a no-op and does not create a parser.
    ///
    /// The parser's lock is released before this returns, whether or not
    /// parsing succeeded.
    ///
    /// # Errors
    ///
    /// Returns the parser's error; see [`FlowParser::parse`].
    pub fn process<S>(&self, flow: &K, bytes: &[u8], sink: &mut S) -> Result<()>
    where
        S: EventSink<K> + ?Sized,
    {
        if bytes.is_empty() {
            return Ok(());
        }
        let parser = self.get_or_create(flow);
        // A panicking sink cannot leave a parser mid-byte: state is updated
        // before an event is delivered.
        let mut guard = parser.lock().unwrap_or_else(PoisonError::into_inner);
        let result = guard.parse(flow, bytes, sink);
        drop(guard);

        if let Err(e) = &result {
            log_failure(e);
        }
        result
    }

    /// Returns true if a parser exists for `flow`.
    #[must_use]
    pub fn contains(&self, flow: &K) -> bool {
        self.read().contains_key(flow)
    }

    /// Returns the number of flows with a parser.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no flow has a parser.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the parser for `flow` to its initial state.
    ///
    /// Returns false if the flow has no parser.
    pub fn reset(&self, flow: &K) -> bool {
        let Some(parser) = self.read().get(flow).cloned() else {
            return false;
        };
        parser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        true
    }

    /// Drops the parser for `flow`, discarding any partial state.
    ///
    /// Returns false if the flow had no parser.
    pub fn remove(&self, flow: &K) -> bool {
        self.flows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(flow)
            .is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<K, Arc<Mutex<P>>>> {
        self.flows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_or_create(&self, flow: &K) -> Arc<Mutex<P>> {
        if let Some(parser) = self.read().get(flow) {
            return Arc::clone(parser);
        }

        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        let parser = flows.entry(flow.clone()).or_insert_with(|| {
            tracing::debug!(direction = %P::DIRECTION, "Creating parser");
            Arc::new(Mutex::new(P::with_config(self.config)))
        });
        Arc::clone(parser)
    }
}

fn log_failure(error: &Error) {
    match error {
        Error::UnimplementedState { direction, state } => {
            tracing::error!(%direction, state, "SMTP parser reached an impossible state");
        }
        Error::ProtocolViolation {
            direction: Direction::Server,
            offset,
            violation,
        } => {
            tracing::warn!(offset, %violation, "SMTP server protocol violation");
        }
        Error::ProtocolViolation {
            direction: Direction::Client,
            offset,
            violation,
        } => {
            tracing::debug!(offset, %violation, "SMTP client protocol violation");
        }
    }
}

/// Client and server parser tables for a set of flows.
///
/// # Example
///
/// ```
/// use mailtap_smtp::event::CollectingSink;
/// use mailtap_smtp::flow::Dispatcher;
///
/// let dispatcher = Dispatcher::<u32>::default();
/// let mut sink = CollectingSink::new();
///
/// dispatcher.process_server(&1, b"250-mx.example.com\r\n25", &mut sink)?;
/// dispatcher.process_server(&1, b"0 OK\r\n", &mut sink)?;
/// assert_eq!(sink.events.len(), 1);
/// # Ok::<(), mailtap_smtp::Error>(())
/// ```
#[derive(Debug)]
pub struct Dispatcher<K> {
    client: FlowTable<K, ClientParser>,
    server: FlowTable<K, ServerParser>,
}

impl<K> Default for Dispatcher<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl<K> Dispatcher<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates a dispatcher whose parsers use `config`.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            client: FlowTable::new(config),
            server: FlowTable::new(config),
        }
    }

    /// Feeds bytes sent by the client of `flow`.
    ///
    /// # Errors
    ///
    /// Returns the client parser's error.
    pub fn process_client<S>(&self, flow: &K, bytes: &[u8], sink: &mut S) -> Result<()>
    where
        S: EventSink<K> + ?Sized,
    {
        self.client.process(flow, bytes, sink)
    }

    /// Feeds bytes sent by the server of `flow`.
    ///
    /// # Errors
    ///
    /// Returns the server parser's error.
    pub fn process_server<S>(&self, flow: &K, bytes: &[u8], sink: &mut S) -> Result<()>
    where
        S: EventSink<K> + ?Sized,
    {
        self.server.process(flow, bytes, sink)
    }

    /// Feeds bytes for one direction of `flow`.
    ///
    /// # Errors
    ///
    /// Returns the parser's error.
    pub fn process<S>(
        &self,
        direction: Direction,
        flow: &K,
        bytes: &[u8],
        sink: &mut S,
    ) -> Result<()>
    where
        S: EventSink<K> + ?Sized,
    {
        match direction {
            Direction::Client => self.process_client(flow, bytes, sink),
            Direction::Server => self.process_server(flow, bytes, sink),
        }
    }

    /// Returns the client parser table.
    #[must_use]
    pub const fn client(&self) -> &FlowTable<K, ClientParser> {
        &self.client
    }

    /// Returns the server parser table.
    #[must_use]
    pub const fn server(&self) -> &FlowTable<K, ServerParser> {
        &self.server
    }

    /// Returns both parsers of `flow` to their initial state.
    pub fn reset(&self, flow: &K) {
        self.client.reset(flow);
        self.server.reset(flow);
    }

    /// Tears down both parsers of `flow`.
    ///
    /// Returns false if neither direction had a parser.
    pub fn remove(&self, flow: &K) -> bool {
        let client = self.client.remove(flow);
        let server = self.server.remove(flow);
        client || server
    }
}
