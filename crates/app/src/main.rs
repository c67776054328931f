use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use micpipe_audio::{CaptureConfig, CaptureThread, PeriodSink, PipeWriter};
use micpipe_foundation::{AppError, AppState, PipeError, ShutdownHandler, StateManager};
use micpipe_telemetry::{OverflowCounter, OverflowReporter, PipeStats};

/// Stream microphone audio into a named pipe as raw little-endian i16 PCM.
///
/// The FIFO must already exist; create it once with `mkfifo`. The pipe open
/// blocks until a reader (e.g. `micpipe-read`) opens the other end.
#[derive(Debug, Parser)]
#[command(name = "micpipe", version, about)]
struct Args {
    /// Path to an existing FIFO special file.
    #[arg(long, default_value = "/tmp/audio_fifo")]
    pipe: PathBuf,

    /// Capture sample rate in Hz.
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Input channel count.
    #[arg(long, default_value_t = 1)]
    channels: u16,

    /// Samples per period; one pipe write per period.
    #[arg(long, default_value_t = 4096)]
    period_frames: usize,

    /// Input device name; defaults to the host's default input.
    #[arg(long)]
    device: Option<String>,

    /// Seconds between overflow reports.
    #[arg(long, default_value_t = 2)]
    report_interval: u64,

    /// Running-average overflow rate (events/s) that forces a report.
    #[arg(long, default_value_t = 0.1)]
    overflow_threshold: f64,
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

    let state = StateManager::new();
    let shutdown = ShutdownHandler::new().install().await;

    let overflows = OverflowCounter::new();
    let stats = Arc::new(PipeStats::default());

    tracing::info!(
        "opening {} for writing (waiting for a reader)",
        args.pipe.display()
    );
    let writer = PipeWriter::open(&args.pipe)
        .with_context(|| format!("opening pipe {}", args.pipe.display()))?;

    let config = CaptureConfig {
        sample_rate: args.sample_rate,
        channels: args.channels,
        frames_per_period: args.period_frames,
    };
    let sink = PeriodSink::new(
        writer,
        args.period_frames,
        overflows.clone(),
        Arc::clone(&stats),
    );
    let capture =
        CaptureThread::spawn(config, args.device.clone(), sink).context("starting audio capture")?;

    state.transition(AppState::Running)?;
    tracing::info!(
        "streaming audio to {} ({} Hz, {} ch, {} frames/period); Ctrl-C to stop",
        args.pipe.display(),
        args.sample_rate,
        args.channels,
        args.period_frames
    );

    let interval_secs = args.report_interval.max(1);
    let mut reporter =
        OverflowReporter::new(Duration::from_secs(interval_secs), args.overflow_threshold);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // the first tick completes immediately

    let mut fault = false;
    loop {
        if shutdown.is_shutdown_requested() {
            break;
        }
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = interval.tick() => {
                let count = overflows.drain();
                if let Some(report) = reporter.observe(count) {
                    tracing::warn!(
                        "input overflows in last {}s: {} | average: {:.2}/s",
                        interval_secs, report.count, report.average
                    );
                }
                tracing::debug!(
                    periods = stats.periods_written.load(Ordering::Relaxed),
                    silent = stats.periods_silent.load(Ordering::Relaxed),
                    bytes = stats.bytes_written.load(Ordering::Relaxed),
                    short_writes = stats.short_writes.load(Ordering::Relaxed),
                    dropped = stats.backpressure_drops.load(Ordering::Relaxed),
                    "pipe stats"
                );
                if stats.writer_failed.load(Ordering::Acquire) {
                    fault = true;
                    break;
                }
            }
        }
    }

    // Orderly teardown: the capture thread pauses the stream (no further
    // callbacks), drops the stream handle, then the sink, closing the pipe
    // descriptor last.
    if fault {
        state.transition(AppState::Faulted {
            reason: "pipe reader gone".to_string(),
        })?;
    }
    state.transition(AppState::Stopping)?;
    capture.stop();
    state.transition(AppState::Stopped)?;
    tracing::info!("shutdown complete");

    if fault {
        return Err(AppError::Pipe(PipeError::ReaderGone).into());
    }
    Ok(())
}
