//! Sinks that a [`Logger`](crate::Logger) can write to.
//!
//! Any `std::io::Write + Send` can serve as sink; a logger writes each line,
//! including its trailing newline, with a single `write_all` while holding its lock.
//!
//! This module provides
//!
//! * [`default_sink`], the error stream of the process, which is used if nothing else is configured,
//! * [`file_sink`], which appends to a file,
//! * [`SharedBuffer`], an in-memory sink whose content can be inspected while the logger is in use,
//!   e.g. in tests.
use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

/// A sink as it is owned by a logger.
pub type Sink = Box<dyn Write + Send>;

/// The process's standard error stream.
#[must_use]
pub fn default_sink() -> Sink {
    Box::new(std::io::stderr())
}

/// Opens the file for appending, creates it if necessary.
///
/// # Errors
///
/// `std::io::Error` if the file cannot be opened.
pub fn file_sink<P: AsRef<Path>>(path: P) -> std::io::Result<Sink> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

/// In-memory sink that can be cloned and inspected while a logger writes to it.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // a poisoned buffer still holds all complete lines
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Everything written so far, decoded lossily.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).to_string()
    }

    /// Everything written so far, split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(ToString::to_string).collect()
    }

    /// Discards the content.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// The buffer as sink.
    #[must_use]
    pub fn sink(&self) -> Sink {
        Box::new(self.clone())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
