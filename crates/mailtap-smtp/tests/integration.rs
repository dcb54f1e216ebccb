//! Integration tests for the SMTP stream parsers.
//!
//! These tests drive a full conversation through the public dispatcher the
//! way a capture pipeline would, one direction at a time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Barrier, Once};

use bytes::Bytes;
use mailtap_smtp::{
    ClientParser, CollectingSink, Direction, Dispatcher, Event, EventSink, FlowParser,
    ParserConfig, Reply, ReplyCode, ServerParser, Violation,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("mailtap_smtp=trace")
            .with_test_writer()
            .try_init();
    });
}

fn events<K>(sink: &CollectingSink<K>) -> Vec<Event>
where
    K: Clone,
{
    sink.events.iter().map(|(_, event)| event.clone()).collect()
}

#[test]
fn test_conversation_both_directions() {
    init_tracing();
    let dispatcher = Dispatcher::<u32>::default();
    let mut client = CollectingSink::new();
    let mut server = CollectingSink::new();

    dispatcher
        .process_server(&1, b"220 mx.example.com ESMTP\r\n", &mut server)
        .unwrap();
    dispatcher
        .process_client(&1, b"EHLO client.example.com\r\n", &mut client)
        .unwrap();
    dispatcher
        .process_server(
            &1,
            b"250-mx.example.com\r\n250-SIZE 35882577\r\n250 8BITMIME\r\n",
            &mut server,
        )
        .unwrap();
    dispatcher
        .process_client(
            &1,
            b"MAIL FROM:<alice@example.com> SIZE=42\r\nRCPT TO:<bob@example.org>\r\nRCPT TO:<carol@example.net>\r\nDATA\r\n",
            &mut client,
        )
        .unwrap();
    dispatcher
        .process_server(&1, b"250 OK\r\n250 OK\r\n250 OK\r\n354 End data with <CR><LF>.<CR><LF>\r\n", &mut server)
        .unwrap();
    dispatcher
        .process_client(
            &1,
            b"Subject: hi\r\n\r\nHello Bob.\r\n.\r\nQUIT\r\n",
            &mut client,
        )
        .unwrap();
    dispatcher
        .process_server(&1, b"250 Queued\r\n221 Bye\r\n", &mut server)
        .unwrap();

    assert_eq!(
        events(&client),
        vec![
            Event::Command("EHLO client.example.com".into()),
            Event::Command("MAIL FROM:<alice@example.com> SIZE=42".into()),
            Event::Command("RCPT TO:<bob@example.org>".into()),
            Event::Command("RCPT TO:<carol@example.net>".into()),
            Event::Command("DATA".into()),
            Event::MessageBody {
                sender: "alice@example.com".into(),
                recipients: vec!["bob@example.org".into(), "carol@example.net".into()],
                body: Bytes::from_static(b"Subject: hi\r\n\r\nHello Bob.\r\n"),
            },
            Event::Command("QUIT".into()),
        ]
    );

    let replies: Vec<u16> = events(&server)
        .into_iter()
        .map(|event| match event {
            Event::Response(reply) => reply.code.as_u16(),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(replies, vec![220, 250, 250, 250, 250, 354, 250, 221]);

    assert_eq!(
        server.events[1].1,
        Event::Response(Reply::new(
            ReplyCode::new(250),
            vec![
                "mx.example.com".into(),
                "SIZE 35882577".into(),
                "8BITMIME".into()
            ],
        ))
    );
}

#[test]
fn test_rset_then_body_has_empty_envelope() {
    let dispatcher = Dispatcher::<u32>::default();
    let mut sink = CollectingSink::new();
    dispatcher
        .process_client(
            &7,
            b"MAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nRSET\r\nDATA\r\nx\r\n.\r\n",
            &mut sink,
        )
        .unwrap();

    assert_eq!(
        sink.events.last().unwrap().1,
        Event::MessageBody {
            sender: String::new(),
            recipients: vec![],
            body: Bytes::from_static(b"x\r\n"),
        }
    );
}

#[test]
fn test_envelope_resets_between_messages() {
    let mut parser = ClientParser::new();
    let mut sink = CollectingSink::new();
    parser
        .parse(
            &(),
            b"MAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\none\r\n.\r\nDATA\r\ntwo\r\n.\r\n",
            &mut sink,
        )
        .unwrap();

    let bodies: Vec<_> = events(&sink)
        .into_iter()
        .filter_map(|event| match event {
            Event::MessageBody {
                sender,
                recipients,
                body,
            } => Some((sender, recipients, body)),
            _ => None,
        })
        .collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0].0, "a@b");
    assert_eq!(bodies[1].0, "");
    assert!(bodies[1].1.is_empty());
    assert_eq!(bodies[1].2, Bytes::from_static(b"two\r\n"));
}

#[test]
fn test_terminator_split_across_chunks() {
    let input: &[u8] = b"DATA\r\nhello\r\n.\r\n";
    // Every split point inside the end-of-data marker.
    for split in 11..input.len() {
        let mut parser = ClientParser::new();
        let mut sink = CollectingSink::new();
        parser.parse(&(), &input[..split], &mut sink).unwrap();
        assert_eq!(sink.events.len(), 1, "split at {split}");
        parser.parse(&(), &input[split..], &mut sink).unwrap();

        assert_eq!(
            events(&sink),
            vec![
                Event::Command("DATA".into()),
                Event::MessageBody {
                    sender: String::new(),
                    recipients: vec![],
                    body: Bytes::from_static(b"hello\r\n"),
                },
            ],
            "split at {split}"
        );
    }
}

#[test]
fn test_mismatched_continuation_fails_without_event() {
    let dispatcher = Dispatcher::<u32>::default();
    let mut sink = CollectingSink::new();
    let err = dispatcher
        .process_server(&1, b"250-Hello\r\n251 OK\r\n", &mut sink)
        .unwrap_err();

    assert_eq!(err.kind(), Some(Violation::InconsistentStatus));
    assert_eq!(err.direction(), Direction::Server);
    assert!(sink.events.is_empty());
}

#[test]
fn test_non_numeric_status_position() {
    let mut parser = ServerParser::new();
    let mut sink = CollectingSink::new();
    let err = parser.parse(&(), b"25a-text\r\n", &mut sink).unwrap_err();

    assert_eq!(
        err.to_string(),
        "SMTP server protocol violation at byte 2: status code not numeric"
    );
    assert!(sink.events.is_empty());
}

#[test]
fn test_violation_offset_spans_calls() {
    let mut parser = ServerParser::new();
    let mut sink = CollectingSink::new();
    parser.parse(&(), b"250 OK\r\n", &mut sink).unwrap();
    let err = parser.parse(&(), b"2x", &mut sink).unwrap_err();

    assert_eq!(
        err,
        mailtap_smtp::Error::violation(Direction::Server, 9, Violation::StatusNotNumeric)
    );
}

#[test]
fn test_failed_flow_recovers_after_remove() {
    let dispatcher = Dispatcher::<&str>::default();
    let mut sink = CollectingSink::new();

    assert!(dispatcher.process_client(&"f", b"HELO\r!", &mut sink).is_err());
    assert!(dispatcher.client().contains(&"f"));
    assert!(dispatcher.remove(&"f"));

    dispatcher
        .process_client(&"f", b"HELO again\r\n", &mut sink)
        .unwrap();
    assert_eq!(
        sink.events,
        vec![("f", Event::Command("HELO again".into()))]
    );
}

#[test]
fn test_bytes_after_violation_stay_protocol_violations() {
    let dispatcher = Dispatcher::<u32>::default();
    let mut sink = CollectingSink::new();

    let first = dispatcher.process_server(&1, b"25a", &mut sink).unwrap_err();
    assert_eq!(first.kind(), Some(Violation::StatusNotNumeric));

    for _ in 0..3 {
        let err = dispatcher
            .process_server(&1, b"250 OK\r\n", &mut sink)
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(!err.is_internal());
        assert_eq!(err.kind(), Some(Violation::ParserFailed));
    }
    assert!(sink.events.is_empty());
}

#[test]
fn test_config_limits_apply_to_new_flows() {
    let dispatcher =
        Dispatcher::<u32>::new(ParserConfig::new().with_max_line_length(8));
    let mut sink = CollectingSink::new();

    let err = dispatcher
        .process_client(&1, b"EHLO a.very.long.name\r\n", &mut sink)
        .unwrap_err();
    assert_eq!(err.kind(), Some(Violation::LineTooLong));

    let err = dispatcher
        .process_server(&1, b"250 a very long reply\r\n", &mut sink)
        .unwrap_err();
    assert_eq!(err.kind(), Some(Violation::LineTooLong));
}

/// A sink that counts bodies per flow, shared by value across threads.
#[derive(Default)]
struct BodyCounter {
    bodies: usize,
    bytes: usize,
}

impl EventSink<usize> for BodyCounter {
    fn on_message_body(&mut self, _flow: &usize, _from: &str, _to: &[String], body: &[u8]) {
        self.bodies += 1;
        self.bytes += body.len();
    }
}

#[test]
fn test_concurrent_flows() {
    const FLOWS: usize = 8;
    const MESSAGES: usize = 25;

    let dispatcher = Dispatcher::<usize>::default();
    let message: &[u8] = b"MAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n0123456789\r\n.\r\n";

    let counters: Vec<BodyCounter> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..FLOWS)
            .map(|flow| {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    let mut counter = BodyCounter::default();
                    for _ in 0..MESSAGES {
                        for chunk in message.chunks(7) {
                            dispatcher.process_client(&flow, chunk, &mut counter).unwrap();
                            dispatcher
                                .process_server(&flow, b"25", &mut counter)
                                .unwrap();
                            dispatcher
                                .process_server(&flow, b"0 OK\r\n", &mut counter)
                                .unwrap();
                        }
                    }
                    counter
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    assert_eq!(dispatcher.client().len(), FLOWS);
    assert_eq!(dispatcher.server().len(), FLOWS);
    for counter in counters {
        assert_eq!(counter.bodies, MESSAGES);
        assert_eq!(counter.bytes, MESSAGES * 12);
    }
}

#[test]
fn test_threads_sharing_one_flow_never_interleave() {
    const THREADS: usize = 8;
    const LINES: usize = 200;

    let dispatcher = Dispatcher::<usize>::default();
    let start = Barrier::new(THREADS);

    let sinks: Vec<CollectingSink<usize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let dispatcher = &dispatcher;
                let start = &start;
                scope.spawn(move || {
                    let mut sink = CollectingSink::new();
                    start.wait();
                    for _ in 0..LINES {
                        dispatcher.process_client(&0, b"NOOP\r\n", &mut sink).unwrap();
                    }
                    sink
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    assert_eq!(dispatcher.client().len(), 1);
    let commands: Vec<Event> = sinks.iter().flat_map(events).collect();
    assert_eq!(commands.len(), THREADS * LINES);
    assert!(
        commands
            .iter()
            .all(|event| *event == Event::Command("NOOP".into()))
    );
}
