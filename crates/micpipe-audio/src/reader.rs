use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use micpipe_foundation::PipeError;

pub const DEFAULT_SCRATCH_BYTES: usize = 4096;

/// Read end of the FIFO, opened `O_RDONLY | O_NONBLOCK` so a missing writer
/// never hangs the process. The producer and consumer are fully decoupled:
/// either may start, stop, or restart independently.
pub struct FifoReader {
    file: File,
    scratch: Vec<u8>,
}

impl FifoReader {
    pub fn open(path: &Path) -> Result<Self, PipeError> {
        Self::with_scratch(path, DEFAULT_SCRATCH_BYTES)
    }

    pub fn with_scratch(path: &Path, scratch_bytes: usize) -> Result<Self, PipeError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| PipeError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            scratch: vec![0u8; scratch_bytes.max(1)],
        })
    }

    /// One bounded `poll(2)`; when readable, one `read(2)` into the scratch
    /// buffer. Returns the bytes drained this iteration; empty for a
    /// timeout, an interrupted call, or a closed/absent writer, all of which
    /// the caller treats as ordinary iterations and keeps polling through.
    pub fn poll_read(&mut self, timeout: Duration) -> Result<&[u8], PipeError> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: pfd is a single valid pollfd living across the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                // Interrupted; the window loop re-polls on its next pass.
                return Ok(&[]);
            }
            return Err(PipeError::Io(err));
        }
        if rc == 0 {
            return Ok(&[]);
        }
        if pfd.revents & libc::POLLIN == 0 {
            // POLLHUP with no data: the writer is gone. poll() keeps
            // returning instantly in that state, which would spin the loop
            // hot. Wait out the timeout instead, then let the caller keep
            // polling for a writer that reopens the pipe.
            thread::sleep(timeout);
            return Ok(&[]);
        }

        // SAFETY: scratch is owned, non-empty, valid for writes of its len.
        let n = unsafe {
            libc::read(
                self.file.as_raw_fd(),
                self.scratch.as_mut_ptr() as *mut libc::c_void,
                self.scratch.len(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(&[]),
                _ => Err(PipeError::Io(err)),
            };
        }
        // n == 0 means the writer closed its end; not fatal, keep polling.
        Ok(&self.scratch[..n as usize])
    }
}

/// Lazy sequence of per-window byte totals: each `next` drains the FIFO in
/// bounded polls until the wall-clock window closes, then yields the total.
/// Ends once the shutdown flag is raised; every blocking call is bounded by
/// the poll timeout, so the loop notices the flag within that bound.
/// Restarting after the pipe is recreated means constructing a fresh
/// reader and iterator.
pub struct ByteWindows {
    reader: FifoReader,
    window: Duration,
    poll_timeout: Duration,
    shutdown: Arc<AtomicBool>,
}

impl ByteWindows {
    pub fn new(
        reader: FifoReader,
        window: Duration,
        poll_timeout: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            window,
            poll_timeout,
            shutdown,
        }
    }
}

impl Iterator for ByteWindows {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.shutdown.load(Ordering::Relaxed) {
            return None;
        }

        let deadline = Instant::now() + self.window;
        let mut total: u64 = 0;
        while Instant::now() < deadline {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            match self.reader.poll_read(self.poll_timeout) {
                Ok(bytes) => total += bytes.len() as u64,
                Err(e) => {
                    // Read-side conditions are transient by policy; the
                    // reader outlives writer restarts.
                    tracing::debug!("pipe poll failed: {}", e);
                }
            }
        }
        Some(total)
    }
}
