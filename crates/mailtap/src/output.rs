//! JSON-lines event output.

use std::io::{self, Write};

use mailtap_smtp::{Direction, EventSink, Reply};
use serde::Serialize;

/// One output line.
#[derive(Debug, Serialize)]
struct Record<'a> {
    flow: &'a str,
    direction: &'static str,
    #[serde(flatten)]
    event: RecordEvent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum RecordEvent<'a> {
    Command {
        command: &'a str,
    },
    MessageBody {
        sender: &'a str,
        recipients: &'a [String],
        size: usize,
        body: String,
    },
    Response {
        code: u16,
        class: &'static str,
        lines: &'a [String],
    },
}

/// Sink that writes each event as one JSON object per line.
///
/// Write failures cannot be returned through [`EventSink`], so the first one
/// is kept and later events are dropped.
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: W,
    direction: Direction,
    written: usize,
    error: Option<io::Error>,
}

impl<W: Write> JsonSink<W> {
    /// Creates a sink for events of one direction.
    pub const fn new(writer: W, direction: Direction) -> Self {
        Self {
            writer,
            direction,
            written: 0,
            error: None,
        }
    }

    /// Returns the number of events written.
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Returns the writer, or the first write error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write(&mut self, flow: &str, event: RecordEvent<'_>) {
        if self.error.is_some() {
            return;
        }
        let record = Record {
            flow,
            direction: self.direction.as_str(),
            event,
        };
        // One write per line keeps lines whole on a shared stdout.
        let result = serde_json::to_vec(&record)
            .map_err(io::Error::from)
            .and_then(|mut line| {
                line.push(b'\n');
                self.writer.write_all(&line)
            });
        match result {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

impl<W: Write> EventSink<String> for JsonSink<W> {
    fn on_command(&mut self, flow: &String, command: &str) {
        self.write(flow, RecordEvent::Command { command });
    }

    fn on_message_body(&mut self, flow: &String, sender: &str, recipients: &[String], body: &[u8]) {
        self.write(
            flow,
            RecordEvent::MessageBody {
                sender,
                recipients,
                size: body.len(),
                body: String::from_utf8_lossy(body).into_owned(),
            },
        );
    }

    fn on_response(&mut self, flow: &String, reply: &Reply) {
        self.write(
            flow,
            RecordEvent::Response {
                code: reply.code.as_u16(),
                class: reply.code.class().as_str(),
                lines: &reply.lines,
            },
        );
    }
}
