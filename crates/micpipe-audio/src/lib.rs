pub mod capture;
pub mod detector;
pub mod device;
pub mod reader;
pub mod writer;

// Public API
pub use capture::{CaptureConfig, CaptureThread, PeriodSink, StreamStatus};
pub use detector::OverrunDetector;
pub use reader::{ByteWindows, FifoReader};
pub use writer::{PipeWriter, WriteOutcome};
