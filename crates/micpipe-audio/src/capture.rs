use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig};

use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::detector::OverrunDetector;
use crate::device::open_input_device;
use crate::writer::{PipeWriter, WriteOutcome};
use micpipe_foundation::AudioError;
use micpipe_telemetry::{OverflowCounter, PipeStats};

/// Status flags the audio subsystem reports for one period. Input overflow
/// and output underflow are counted independently when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatus {
    pub input_overflow: bool,
    pub output_underflow: bool,
}

impl StreamStatus {
    pub const CLEAN: Self = Self {
        input_overflow: false,
        output_underflow: false,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames_per_period: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            frames_per_period: 4096,
        }
    }
}

/// Everything the real-time callback does with one period, isolated from
/// CPAL so it can be driven directly in tests: count status flags, pick the
/// input samples or the silence buffer, and issue exactly one best-effort
/// pipe write.
pub struct PeriodSink {
    writer: PipeWriter,
    silence: Vec<u8>,
    scratch: Vec<u8>,
    overflows: OverflowCounter,
    stats: Arc<PipeStats>,
}

impl PeriodSink {
    pub fn new(
        writer: PipeWriter,
        frames_per_period: usize,
        overflows: OverflowCounter,
        stats: Arc<PipeStats>,
    ) -> Self {
        let byte_len = frames_per_period * 2;
        Self {
            writer,
            silence: vec![0u8; byte_len],
            scratch: Vec::with_capacity(byte_len),
            overflows,
            stats,
        }
    }

    /// Runs once per period on the audio subsystem's thread and must stay
    /// within the period's time budget. The only synchronization is the
    /// wait-free counter increment and the only I/O a single non-blocking
    /// write; buffers are reused so the steady state allocates nothing.
    ///
    /// `input` is `None` when the device delivered no samples for the
    /// period; a preallocated all-zero buffer of exactly one period goes
    /// out instead, in one write, so the consumer's byte cadence holds.
    pub fn process(&mut self, input: Option<&[i16]>, status: StreamStatus) {
        if status.input_overflow {
            self.overflows.record();
        }
        if status.output_underflow {
            self.overflows.record();
        }

        let bytes: &[u8] = match input {
            Some(samples) => {
                self.scratch.clear();
                self.scratch.reserve(samples.len() * 2);
                for &s in samples {
                    self.scratch.extend_from_slice(&s.to_le_bytes());
                }
                &self.scratch
            }
            None => {
                self.stats.periods_silent.fetch_add(1, Ordering::Relaxed);
                &self.silence
            }
        };

        let requested = bytes.len();
        match self.writer.write_period(bytes) {
            WriteOutcome::Written(n) => {
                self.stats.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
                if n == requested {
                    self.stats.periods_written.fetch_add(1, Ordering::Relaxed);
                } else {
                    // Unrecoverable for this period; recorded, never retried.
                    self.stats.short_writes.fetch_add(1, Ordering::Relaxed);
                }
            }
            WriteOutcome::WouldBlock => {
                self.stats
                    .backpressure_drops
                    .fetch_add(1, Ordering::Relaxed);
            }
            WriteOutcome::ReaderGone | WriteOutcome::Failed => {
                // The callback never stops the stream; the control thread
                // reacts to the flag on its next check.
                self.stats.writer_failed.store(true, Ordering::Release);
            }
        }
    }

    pub fn stats(&self) -> Arc<PipeStats> {
        Arc::clone(&self.stats)
    }
}

/// Handle to the dedicated thread that owns the CPAL stream (the stream is
/// not `Send`, so it lives and dies on one thread).
pub struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl CaptureThread {
    /// Builds and starts the input stream on a fresh `audio-capture` thread.
    /// Setup errors (device missing, format unsupported, stream build/play
    /// failure) come back synchronously so the caller can abort before any
    /// capture work begins.
    pub fn spawn(
        config: CaptureConfig,
        device_name: Option<String>,
        sink: PeriodSink,
    ) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(&config, device_name.as_deref(), sink) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                }

                // Teardown order matters: pausing stops callback delivery,
                // dropping the stream releases the device handle and the
                // sink inside it, which closes the pipe descriptor last.
                // No write can ever hit a closed descriptor.
                if let Err(e) = stream.pause() {
                    tracing::warn!("pausing stream on shutdown failed: {}", e);
                }
                drop(stream);
                tracing::info!("audio capture thread stopped");
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self { handle, running }),
            Ok(Err(e)) => {
                running.store(false, Ordering::Relaxed);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::Relaxed);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "capture thread did not report readiness".to_string(),
                ))
            }
        }
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn build_stream(
    config: &CaptureConfig,
    device_name: Option<&str>,
    mut sink: PeriodSink,
) -> Result<Stream, AudioError> {
    let device = open_input_device(device_name)?;
    if let Ok(name) = device.name() {
        tracing::info!("selected input device: {}", name);
    }
    ensure_i16_support(&device, config)?;

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Fixed(config.frames_per_period as u32),
    };

    let mut detector = OverrunDetector::new(config.frames_per_period, config.sample_rate);
    let stats = sink.stats();

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            let status = detector.observe(Instant::now());
            sink.process(Some(data), status);
        },
        move |err| {
            tracing::error!("audio stream error: {}", err);
            stats.stream_errors.fetch_add(1, Ordering::Relaxed);
        },
        None,
    )?;

    Ok(stream)
}

/// Format conversion is a non-goal: the device must speak i16 at the
/// requested rate and channel count, or setup fails.
fn ensure_i16_support(device: &cpal::Device, config: &CaptureConfig) -> Result<(), AudioError> {
    let mut ranges = device.supported_input_configs()?;
    let supported = ranges.any(|r| {
        r.sample_format() == SampleFormat::I16
            && r.channels() >= config.channels
            && r.min_sample_rate().0 <= config.sample_rate
            && r.max_sample_rate().0 >= config.sample_rate
    });
    if supported {
        Ok(())
    } else {
        Err(AudioError::FormatNotSupported {
            format: format!(
                "i16 {} Hz {} ch",
                config.sample_rate, config.channels
            ),
        })
    }
}
