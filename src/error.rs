//! Sorting error types.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Common I/O error.
    Io(io::Error),
    /// A token in the input does not parse as an integer.
    Format(String),
    /// A number was requested after the data ran out.
    UnexpectedEof,
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::Io(err) => Some(err),
            SortError::Format(_) => None,
            SortError::UnexpectedEof => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::Io(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Format(token) => write!(f, "file contains data that is not a number: {:?}", token),
            SortError::UnexpectedEof => write!(f, "number requested past the end of the data"),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::Io(err)
    }
}
