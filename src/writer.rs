//! Appending run writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SortError;

/// Write buffer size in bytes. A full buffer is handed to the OS before more
/// data is accepted, so pending writes stay bounded.
const WRITE_BUF_SIZE: usize = 64 * 1024;

/// Append-mode text writer for run files.
pub struct RunWriter {
    path: PathBuf,
    stream: BufWriter<File>,
}

impl RunWriter {
    /// Opens `path` for appending, creating the file if needed.
    pub fn new(path: &Path) -> Result<Self, SortError> {
        return Ok(RunWriter {
            path: path.to_path_buf(),
            stream: Self::open_stream(path)?,
        });
    }

    fn open_stream(path: &Path) -> Result<BufWriter<File>, SortError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::with_capacity(WRITE_BUF_SIZE, file))
    }

    /// Appends `data`, returning once the bytes have been accepted.
    pub fn write(&mut self, data: &str) -> Result<(), SortError> {
        self.stream.write_all(data.as_bytes())?;
        Ok(())
    }

    /// Appends `number` followed by a separating space.
    pub fn write_number(&mut self, number: i64) -> Result<(), SortError> {
        write!(self.stream, "{} ", number)?;
        Ok(())
    }

    /// Truncates the file to empty. Pending buffered bytes are flushed first
    /// so they cannot surface after the truncation.
    pub fn reset_file_contents(&mut self) -> Result<(), SortError> {
        self.stream.flush()?;
        fs::write(&self.path, "")?;
        Ok(())
    }

    /// Flushes, closes and reopens the stream in append mode.
    pub fn reset(&mut self) -> Result<(), SortError> {
        self.end()?;
        self.stream = Self::open_stream(&self.path)?;
        Ok(())
    }

    /// Flushes and waits for the stream to settle.
    pub fn end(&mut self) -> Result<(), SortError> {
        self.stream.flush()?;
        Ok(())
    }
}
