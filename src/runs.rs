//! Run-granular file handle.
//!
//! A [`RunsHandler`] pairs one [`ChunkReader`] and one [`RunWriter`] over the
//! same path and exposes run-level operations instead of raw tokens. A run
//! ends at a newline in the underlying file or at an in-line order break,
//! where the next number is smaller than the last one read.

use std::path::{Path, PathBuf};

use crate::error::SortError;
use crate::reader::ChunkReader;
use crate::writer::RunWriter;

pub struct RunsHandler {
    path: PathBuf,
    reader: ChunkReader,
    writer: RunWriter,
    /// Run index this handle is positioned at, synchronized to the reader's
    /// line counter only through [`RunsHandler::update_run_number`].
    run_number: u64,
    last_read: Option<i64>,
}

impl RunsHandler {
    pub fn new(path: &Path) -> Result<Self, SortError> {
        // the writer goes first: opening it in append mode creates the file,
        // so the reader never races a missing path
        let writer = RunWriter::new(path)?;
        let reader = ChunkReader::new(path)?;

        return Ok(RunsHandler {
            path: path.to_path_buf(),
            reader,
            writer,
            run_number: 0,
            last_read: None,
        });
    }

    /// True iff the reader has no more numbers at all.
    pub fn is_eof(&mut self) -> Result<bool, SortError> {
        Ok(self.reader.peek_next()?.is_none())
    }

    /// True iff the current run is exhausted: no numbers remain, another run
    /// has begun (the tracked run index no longer matches the reader's line
    /// index), or the next number is smaller than the last one read.
    pub fn is_eor(&mut self) -> Result<bool, SortError> {
        let next = self.reader.peek_next()?;

        if !self.reader.has_numbers() {
            return Ok(true);
        }
        if self.run_number != self.reader.line_count() {
            return Ok(true);
        }
        Ok(match (self.last_read, next) {
            (Some(last), Some(next)) => last > next,
            _ => false,
        })
    }

    /// Next number of the current run without consuming it, or [`None`] at
    /// end-of-run.
    pub fn peek_next(&mut self) -> Result<Option<i64>, SortError> {
        if !self.is_eor()? {
            self.reader.peek_next()
        } else {
            Ok(None)
        }
    }

    /// Consumes the next number and records it as last read.
    pub fn next_number(&mut self) -> Result<i64, SortError> {
        let number = self.reader.next_number()?;
        self.last_read = Some(number);
        Ok(number)
    }

    /// Pulls one number from `source` and appends it here. Does nothing when
    /// `source` is already at end-of-run.
    pub fn copy_number(&mut self, source: &mut RunsHandler) -> Result<(), SortError> {
        if source.is_eor()? {
            return Ok(());
        }
        let number = source.next_number()?;
        self.writer.write_number(number)
    }

    /// Transfers one whole run from `source`, terminated with a newline.
    pub fn copy_run(&mut self, source: &mut RunsHandler) -> Result<(), SortError> {
        loop {
            let number = source.next_number()?;
            self.writer.write_number(number)?;
            if source.is_eor()? {
                break;
            }
        }
        self.writer.write("\n")
    }

    /// Appends a bare newline, terminating a freshly merged run.
    pub fn write_nl(&mut self) -> Result<(), SortError> {
        self.writer.write("\n")
    }

    /// Resynchronizes the tracked run index to the reader's line index and
    /// clears the last-read number.
    pub fn update_run_number(&mut self) {
        self.run_number = self.reader.line_count();
        self.last_read = None;
    }

    pub fn reset(&mut self) -> Result<(), SortError> {
        self.last_read = None;
        self.writer.reset()?;
        self.reader.reset()
    }

    pub fn reset_file_contents(&mut self) -> Result<(), SortError> {
        self.writer.reset_file_contents()
    }

    pub fn reader(&self) -> &ChunkReader {
        &self.reader
    }

    pub fn writer(&mut self) -> &mut RunWriter {
        &mut self.writer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
