//! `mailtap` - Replay captured SMTP streams through the incremental parsers
//!
//! Each direction of a captured session is read from its own file, fed to the
//! parsers in fixed-size chunks, and every decoded event is printed as one
//! JSON object per line.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod output;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mailtap_smtp::{Direction, Dispatcher};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use output::JsonSink;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "mailtap")]
#[command(version)]
#[command(about = "Replay captured SMTP streams through the incremental parsers", long_about = None)]
struct Cli {
    /// File holding the bytes the client sent
    #[arg(long, value_name = "FILE")]
    client: Option<PathBuf>,

    /// File holding the bytes the server sent
    #[arg(long, value_name = "FILE")]
    server: Option<PathBuf>,

    /// Number of bytes handed to the parser per call
    #[arg(long, value_name = "BYTES", default_value_t = 1460)]
    chunk_size: usize,

    /// Flow label attached to every event
    #[arg(long, default_value = "replay")]
    flow: String,

    /// Path to a JSON settings file with parser limits
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailtap=info,mailtap_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.chunk_size > 0, "--chunk-size must be at least 1");
    anyhow::ensure!(
        cli.client.is_some() || cli.server.is_some(),
        "nothing to replay: pass --client and/or --server"
    );

    let config = settings::load(cli.config.as_deref()).await?;
    let dispatcher = Arc::new(Dispatcher::<String>::new(config));

    info!(flow = %cli.flow, chunk_size = cli.chunk_size, "Starting replay");

    let mut tasks = Vec::new();
    for (direction, path) in [
        (Direction::Client, cli.client.clone()),
        (Direction::Server, cli.server.clone()),
    ] {
        let Some(path) = path else { continue };
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let dispatcher = Arc::clone(&dispatcher);
        let flow = cli.flow.clone();
        let chunk_size = cli.chunk_size;
        tasks.push(tokio::task::spawn_blocking(move || {
            replay(&dispatcher, direction, &flow, &bytes, chunk_size)
        }));
    }

    let mut failed = false;
    for task in tasks {
        if let Err(e) = task.await? {
            tracing::error!("{e:#}");
            failed = true;
        }
    }

    dispatcher.remove(&cli.flow);
    anyhow::ensure!(!failed, "replay stopped at a protocol error");
    Ok(())
}

/// Feeds one direction of a capture to the dispatcher in `chunk_size` pieces.
fn replay(
    dispatcher: &Dispatcher<String>,
    direction: Direction,
    flow: &str,
    bytes: &[u8],
    chunk_size: usize,
) -> anyhow::Result<()> {
    let mut sink = JsonSink::new(std::io::stdout(), direction);
    let key = flow.to_owned();

    for chunk in bytes.chunks(chunk_size) {
        dispatcher
            .process(direction, &key, chunk, &mut sink)
            .with_context(|| format!("{direction} stream of flow {flow}"))?;
    }

    let written = sink.written();
    sink.finish().context("writing events")?;
    info!(%direction, bytes = bytes.len(), events = written, "Replay finished");
    Ok(())
}
