use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Pause stream error: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("Device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors on the FIFO itself. Mid-stream write failures never travel through
/// this type from the real-time callback; they are recorded in `PipeStats`
/// and surfaced by the control thread.
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Failed to open pipe {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Reader closed its end of the pipe")]
    ReaderGone,

    #[error("Short write: {written} of {requested} bytes")]
    ShortWrite { written: usize, requested: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
