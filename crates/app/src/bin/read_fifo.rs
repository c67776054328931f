use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use micpipe_audio::{ByteWindows, FifoReader};
use micpipe_foundation::ShutdownHandler;

/// Drain a named pipe non-blockingly and report bytes read per window.
///
/// Runs independently of the producer: it starts without a writer present,
/// rides out writer restarts, and never blocks longer than one poll timeout.
#[derive(Debug, Parser)]
#[command(name = "micpipe-read", version, about)]
struct Args {
    /// Path to an existing FIFO special file.
    #[arg(long, default_value = "/tmp/audio_fifo")]
    pipe: PathBuf,

    /// Reporting window in seconds.
    #[arg(long, default_value_t = 1)]
    window: u64,

    /// Poll timeout in milliseconds; bounds shutdown latency.
    #[arg(long, default_value_t = 100)]
    poll_timeout_ms: u64,

    /// Scratch buffer size per read, in bytes.
    #[arg(long, default_value_t = 4096)]
    buffer_bytes: usize,
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let shutdown = ShutdownHandler::new().install().await;

    let reader = FifoReader::with_scratch(&args.pipe, args.buffer_bytes)
        .with_context(|| format!("opening pipe {}", args.pipe.display()))?;
    tracing::info!("reading from {}; Ctrl-C to stop", args.pipe.display());

    let window_secs = args.window.max(1);
    let windows = ByteWindows::new(
        reader,
        Duration::from_secs(window_secs),
        Duration::from_millis(args.poll_timeout_ms.max(1)),
        shutdown.flag(),
    );

    // The poll loop is blocking by design; keep it off the async runtime.
    let worker = tokio::task::spawn_blocking(move || {
        for bytes in windows {
            tracing::info!("bytes read in last {}s: {}", window_secs, bytes);
        }
    });
    worker.await.context("reader worker panicked")?;

    tracing::info!("shutdown complete");
    Ok(())
}
