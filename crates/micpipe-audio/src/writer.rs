use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use micpipe_foundation::PipeError;

/// Write end of the FIFO. `open` performs the blocking FIFO rendezvous,
/// waiting until a reader opens the other end (startup only, outside the
/// real-time path), then flips the descriptor to `O_NONBLOCK` so every
/// per-period write is best-effort and can never stall the audio thread.
pub struct PipeWriter {
    file: File,
}

/// Result of one best-effort period write. Backpressure is a value, not a
/// blocking stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// `n` bytes entered the pipe buffer; `n` less than requested is a
    /// short write, reported but never retried from the callback.
    Written(usize),
    /// The pipe's kernel buffer is full; the period is dropped.
    WouldBlock,
    /// EPIPE: the reader closed its end.
    ReaderGone,
    /// Any other write error; treated as fatal by the control thread.
    Failed,
}

impl PipeWriter {
    pub fn open(path: &Path) -> Result<Self, PipeError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| PipeError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        set_nonblocking(&file)?;
        Ok(Self { file })
    }

    /// Single write against the descriptor, no buffering beyond the OS pipe.
    /// Callable from the real-time callback: it takes no locks and never
    /// retries. The Rust runtime ignores SIGPIPE, so a vanished reader
    /// surfaces as EPIPE rather than killing the process.
    pub fn write_period(&self, bytes: &[u8]) -> WriteOutcome {
        // SAFETY: the fd is owned by `self.file` and valid for the whole
        // call; libc::write only reads `bytes.len()` bytes from the buffer.
        let rc = unsafe {
            libc::write(
                self.file.as_raw_fd(),
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        };
        if rc >= 0 {
            return WriteOutcome::Written(rc as usize);
        }
        match io::Error::last_os_error().raw_os_error() {
            Some(libc::EAGAIN) => WriteOutcome::WouldBlock,
            // An interrupted write is indistinguishable from backpressure
            // for this period; retrying would blow the time budget.
            Some(libc::EINTR) => WriteOutcome::WouldBlock,
            Some(libc::EPIPE) => WriteOutcome::ReaderGone,
            _ => WriteOutcome::Failed,
        }
    }
}

fn set_nonblocking(file: &File) -> Result<(), PipeError> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is a valid open descriptor; F_GETFL/F_SETFL touch no memory.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(PipeError::Io(io::Error::last_os_error()));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(PipeError::Io(io::Error::last_os_error()));
    }
    Ok(())
}
