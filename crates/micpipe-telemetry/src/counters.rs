use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Event counter shared between the real-time audio thread (writer) and the
/// control thread (drainer). Both sides are individually atomic, so no event
/// is lost or double-counted across a drain boundary; an event racing the
/// drain lands in one window or the other, never both.
#[derive(Clone, Debug, Default)]
pub struct OverflowCounter {
    events: Arc<AtomicU64>,
}

impl OverflowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait-free; the only synchronization the capture callback performs.
    pub fn record(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    /// Read-and-reset. Idempotent per window: two consecutive drains with no
    /// interleaved records return the count, then zero.
    pub fn drain(&self) -> u64 {
        self.events.swap(0, Ordering::AcqRel)
    }

    pub fn peek(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

/// Counters written by the period sink on the real-time thread and read by
/// the control thread. Plain atomics, updated inline.
#[derive(Debug, Default)]
pub struct PipeStats {
    pub periods_written: AtomicU64,
    pub periods_silent: AtomicU64,
    pub bytes_written: AtomicU64,
    pub short_writes: AtomicU64,
    pub backpressure_drops: AtomicU64,
    pub stream_errors: AtomicU64,
    /// Set when the reader end vanished mid-stream. The callback never stops
    /// the stream itself; the control thread reacts to this flag.
    pub writer_failed: AtomicBool,
}
