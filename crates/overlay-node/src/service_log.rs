//! The node's own size-capped log file.
//!
//! [`ServiceLog`] is a cloneable handle that the tracing subscriber writes
//! through. It starts as a discard sink; the node opens `service.log` or
//! switches back to discarding as `logSizeMax` changes. The maintenance loop
//! calls [`ServiceLog::trim`] to keep the file under its cap.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

pub const SERVICE_LOG_FILE: &str = "service.log";

/// Fraction of the cap kept after a trim.
const TRIM_KEEP: f64 = 0.5;

#[derive(Default)]
enum Sink {
    #[default]
    Discard,
    File {
        path: PathBuf,
        file: File,
    },
}

#[derive(Clone, Default)]
pub struct ServiceLog {
    sink: Arc<Mutex<Sink>>,
}

impl ServiceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start appending to `path`, replacing any current sink.
    pub fn open(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.sink.lock() = Sink::File {
            path: path.to_path_buf(),
            file,
        };
        Ok(())
    }

    /// Switch to the discard sink.
    pub fn disable(&self) {
        *self.sink.lock() = Sink::Discard;
    }

    pub fn is_enabled(&self) -> bool {
        matches!(*self.sink.lock(), Sink::File { .. })
    }

    pub fn path(&self) -> Option<PathBuf> {
        match &*self.sink.lock() {
            Sink::File { path, .. } => Some(path.clone()),
            Sink::Discard => None,
        }
    }

    /// If the file exceeds `max_bytes`, keep the newest portion (starting on
    /// a line boundary) and drop the rest. Returns whether a trim happened.
    pub fn trim(&self, max_bytes: u64) -> io::Result<bool> {
        let mut sink = self.sink.lock();
        let Sink::File { path, file } = &mut *sink else {
            return Ok(false);
        };
        let len = file.metadata()?.len();
        if max_bytes == 0 || len <= max_bytes {
            return Ok(false);
        }

        let keep = (max_bytes as f64 * TRIM_KEEP) as u64;
        let mut reader = File::open(&*path)?;
        reader.seek(SeekFrom::Start(len - keep))?;
        let mut tail = Vec::with_capacity(keep as usize);
        reader.read_to_end(&mut tail)?;
        let start = tail
            .iter()
            .position(|&b| b == b'\n')
            .map_or(0, |i| i + 1);

        let mut rewritten = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&*path)?;
        rewritten.write_all(&tail[start..])?;
        drop(rewritten);

        *file = OpenOptions::new().append(true).open(&*path)?;
        Ok(true)
    }
}

pub struct ServiceLogWriter {
    sink: Arc<Mutex<Sink>>,
}

impl Write for ServiceLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.sink.lock() {
            Sink::Discard => Ok(buf.len()),
            Sink::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.sink.lock() {
            Sink::Discard => Ok(()),
            Sink::File { file, .. } => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for ServiceLog {
    type Writer = ServiceLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ServiceLogWriter {
            sink: Arc::clone(&self.sink),
        }
    }
}
