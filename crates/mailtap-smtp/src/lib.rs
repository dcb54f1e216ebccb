//! # mailtap-smtp
//!
//! Incremental SMTP stream parsing for passive observers.
//!
//! ## Features
//!
//! - **Byte-at-a-time state machines**: input may arrive in chunks of any
//!   size, and a command, reply or message body may span any number of calls
//! - **Both directions**: client commands with DATA payloads, server replies
//!   with continuation lines
//! - **Envelope tracking**: `MAIL FROM` and `RCPT TO` are attached to the
//!   message body they precede
//! - **Per-flow dispatch**: lazily created parsers keyed by flow, each behind
//!   its own lock
//! - **Bounded buffers**: every accumulated buffer has a configurable limit
//!
//! ## Quick Start
//!
//! ```
//! use mailtap_smtp::{CollectingSink, Dispatcher, Event};
//!
//! let dispatcher = Dispatcher::<u64>::default();
//! let mut sink = CollectingSink::new();
//!
//! dispatcher.process_client(&1, b"MAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDA", &mut sink)?;
//! dispatcher.process_client(&1, b"TA\r\nhello\r\n.\r\n", &mut sink)?;
//!
//! let (_, last) = sink.events.last().unwrap();
//! assert!(matches!(last, Event::MessageBody { sender, .. } if sender == "a@b"));
//! # Ok::<(), mailtap_smtp::Error>(())
//! ```
//!
//! ## Client States
//!
//! ```text
//!              CR                  LF + DATA
//! InCommand ───────→ ExpectLf ─────────────────→ InData
//!     ↑                 │                          │
//!     └──── LF ─────────┘                          │
//!     └─────────────── CRLF "." CRLF ──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command recognition
//! - [`config`]: Parser limits
//! - [`event`]: Decoded events and sinks
//! - [`flow`]: Per-flow dispatch
//! - [`parser`]: Client and server state machines
//! - [`types`]: Core SMTP types (replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
mod error;
pub mod event;
pub mod flow;
pub mod parser;
pub mod types;

pub use config::ParserConfig;
pub use error::{Direction, Error, Result, Violation};
pub use event::{CollectingSink, Event, EventSink, LoggingSink, NoopSink};
pub use flow::{Dispatcher, FlowTable};
pub use parser::{ClientParser, ClientState, FlowParser, ServerParser, ServerState};
pub use types::{Reply, ReplyClass, ReplyCode};
