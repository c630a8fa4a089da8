//! Chunked number-stream reader.
//!
//! Reads a file in fixed-size byte windows and lazily turns it into a queue
//! of lines, each a sequence of integers. A token split by a window boundary
//! is carried over as a leftover and glued to the next window, so parsing is
//! insensitive to the chunk size.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::SortError;

/// Default chunk window size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Splits `text` at its last ASCII whitespace character.
///
/// The head is what can be parsed now, the tail is the leftover to prepend to
/// the next chunk. A newline at the split point stays in the tail: downstream
/// it marks the boundary as a completed line. Returns [`None`] when the text
/// contains no whitespace at all.
pub(crate) fn split_on_last_whitespace(text: &str) -> Option<(&str, &str)> {
    let idx = text.rfind(|c: char| c.is_ascii_whitespace())?;
    let head = &text[..idx];
    let tail = if text[idx..].starts_with('\n') {
        &text[idx..]
    } else {
        &text[idx + 1..]
    };
    Some((head, tail))
}

/// Lazily parsed view of a numeric text file.
pub struct ChunkReader {
    path: PathBuf,
    file: File,
    file_size: u64,
    pos: u64,
    chunk_size: usize,
    eof: bool,
    leftover: String,
    /// Set when a line continues across a chunk boundary; suppresses exactly
    /// one line-counter increment so the split halves count as one line.
    merge_ends: bool,
    line_count: u64,
    lines: VecDeque<VecDeque<i64>>,
}

impl ChunkReader {
    /// Opens `path` with the default chunk size.
    pub fn new(path: &Path) -> Result<Self, SortError> {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    /// Opens `path` reading `chunk_size` bytes per window.
    pub fn with_chunk_size(path: &Path, chunk_size: usize) -> Result<Self, SortError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        return Ok(ChunkReader {
            path: path.to_path_buf(),
            file,
            file_size,
            pos: 0,
            chunk_size: chunk_size.max(1),
            eof: false,
            leftover: String::new(),
            merge_ends: false,
            line_count: 0,
            lines: VecDeque::new(),
        });
    }

    /// True while more bytes remain on disk or a buffered line still holds
    /// numbers.
    pub fn has_numbers(&self) -> bool {
        !self.eof || self.lines.front().map_or(false, |line| !line.is_empty())
    }

    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Consumes and returns the next number, refilling from disk as needed.
    ///
    /// The line counter advances exactly once per completed line; when only
    /// one buffered line remains, the next window is read ahead so the line's
    /// completion is visible before it is fully consumed.
    pub fn next_number(&mut self) -> Result<i64, SortError> {
        if self.lines.is_empty() {
            self.fill_buffer()?;
        }

        let number = match self.lines.front_mut().and_then(|line| line.pop_front()) {
            Some(number) => number,
            None => return Err(SortError::UnexpectedEof),
        };
        if self.lines[0].is_empty() {
            if self.lines.len() == 1 {
                self.fill_buffer()?;
            }
            self.lines.pop_front();
            if self.merge_ends {
                self.merge_ends = false;
            } else {
                self.line_count += 1;
            }
        }

        return Ok(number);
    }

    /// Returns the next number without consuming it, or [`None`] when the
    /// data is exhausted.
    pub fn peek_next(&mut self) -> Result<Option<i64>, SortError> {
        if self.lines.is_empty() {
            self.fill_buffer()?;
        }
        Ok(self.lines.front().and_then(|line| line.front().copied()))
    }

    /// Reads windows from disk until at least one number is buffered or the
    /// end of the file is reached.
    pub fn fill_buffer(&mut self) -> Result<(), SortError> {
        let mut parsed_any = false;

        while !parsed_any && !self.eof {
            let chunk = match self.next_chunk()? {
                Some(chunk) => chunk,
                None => break,
            };

            if self.pos > self.chunk_size as u64
                && !self.leftover.contains('\n')
                && !chunk.starts_with('\n')
            {
                self.merge_ends = true;
            }

            let mut data = std::mem::take(&mut self.leftover);
            data.push_str(&chunk);

            let values = if self.eof {
                data.as_str()
            } else {
                match split_on_last_whitespace(&data) {
                    Some((head, tail)) => {
                        self.leftover = tail.to_string();
                        head
                    }
                    None => {
                        // no whitespace anywhere: the whole window is one
                        // partial token, keep reading
                        self.leftover = data.clone();
                        ""
                    }
                }
            };

            parsed_any = self.parse_lines(values)?;
        }

        Ok(())
    }

    /// Reads the next byte window, or [`None`] once the file is exhausted.
    pub(crate) fn next_chunk(&mut self) -> Result<Option<String>, SortError> {
        if self.eof {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        self.pos += self.chunk_size as u64;
        if self.pos >= self.file_size {
            self.eof = true;
        }

        buf.truncate(filled);
        let text =
            String::from_utf8(buf).map_err(|_| SortError::Format(String::from("<non-utf-8>")))?;
        Ok(Some(text))
    }

    fn parse_lines(&mut self, text: &str) -> Result<bool, SortError> {
        let mut parsed_any = false;

        for line in text.trim().split('\n') {
            let mut numbers = VecDeque::new();
            for token in line.split_whitespace() {
                let number = token
                    .parse::<i64>()
                    .map_err(|_| SortError::Format(token.to_string()))?;
                numbers.push_back(number);
            }
            // whitespace-only stretches never become buffered lines
            if !numbers.is_empty() {
                self.lines.push_back(numbers);
                parsed_any = true;
            }
        }

        Ok(parsed_any)
    }

    /// Rewinds to offset 0 and drops all buffered state.
    ///
    /// The file is reopened and re-stat'ed so a truncate-and-rewrite by the
    /// paired writer is picked up. The line counter is deliberately kept: run
    /// indices only move forward and resynchronize through an explicit
    /// advance on the owning handle.
    pub fn reset(&mut self) -> Result<(), SortError> {
        self.eof = false;
        if self.path.exists() {
            self.file = File::open(&self.path)?;
            self.file_size = self.file.metadata()?.len();
        }
        self.pos = 0;
        self.leftover.clear();
        self.merge_ends = false;
        self.lines.clear();
        Ok(())
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }
}
