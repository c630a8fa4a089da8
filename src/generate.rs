//! Random test-data file generation.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::SortError;
use crate::writer::RunWriter;

const SEPARATOR: &str = " ";
const NUMBERS_IN_LINE: usize = 10;
const MIN_NUMBER: i64 = -1000;
const MAX_NUMBER: i64 = 1000;

/// Formats a byte count with binary units and no spaces, e.g. `1.5KiB`.
/// Used to derive generated and sorted file names from byte sizes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["Bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    if bytes == 0 {
        return String::from("0Bytes");
    }

    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let rounded = (value * 100.0).round() / 100.0;

    return format!("{}{}", rounded, UNITS[exp]);
}

/// Writes files of random signed integers for sorting experiments.
pub struct FileGenerator {
    numbers_in_line: usize,
}

impl FileGenerator {
    pub fn new() -> Self {
        FileGenerator {
            numbers_in_line: NUMBERS_IN_LINE,
        }
    }

    /// Generates `generated_file_<size>.txt` in `dir`, exactly `byte_size`
    /// bytes long.
    ///
    /// Lines hold ten random integers each. The final line is cut at the last
    /// whole token and padded with newlines, so the file never ends in a
    /// partial number.
    pub fn generate_file(&self, dir: &Path, byte_size: u64) -> Result<PathBuf, SortError> {
        let name = format!("generated_file_{}.txt", format_size(byte_size));
        let path = dir.join(name);
        fs::write(&path, "")?;

        let mut writer = RunWriter::new(&path)?;
        let mut rng = rand::thread_rng();
        let mut bytes_written = 0u64;

        while bytes_written < byte_size {
            let numbers: Vec<String> = (0..self.numbers_in_line)
                .map(|_| rng.gen_range(MIN_NUMBER..=MAX_NUMBER).to_string())
                .collect();
            let mut line = numbers.join(SEPARATOR);
            line.push('\n');

            let remaining = byte_size - bytes_written;
            if line.len() as u64 > remaining {
                line = Self::fit_line(&line, remaining as usize);
                bytes_written = byte_size;
            } else {
                bytes_written += line.len() as u64;
            }

            writer.write(&line)?;
        }

        writer.end()?;
        log::info!("generated {} ({} bytes)", path.display(), byte_size);

        return Ok(path);
    }

    /// Cuts `line` down to `len` bytes without splitting a token, padding
    /// with newlines up to the exact length.
    fn fit_line(line: &str, len: usize) -> String {
        let mut fitted = String::from(&line[..len]);
        match fitted.rfind(|c: char| c.is_ascii_whitespace()) {
            Some(idx) => fitted.truncate(idx),
            None => fitted.clear(),
        }
        while fitted.len() < len {
            fitted.push('\n');
        }
        fitted
    }
}

impl Default for FileGenerator {
    fn default() -> Self {
        FileGenerator::new()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{format_size, FileGenerator};

    #[rstest]
    #[case(0, "0Bytes")]
    #[case(1, "1Bytes")]
    #[case(999, "999Bytes")]
    #[case(1024, "1KiB")]
    #[case(1536, "1.5KiB")]
    #[case(1100, "1.07KiB")]
    #[case(1024 * 1024, "1MiB")]
    #[case(3 * 1024 * 1024 / 2, "1.5MiB")]
    fn test_format_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_size(bytes), expected);
    }

    #[test]
    fn test_generated_file_has_exact_size_and_parses() {
        let dir = tempfile::tempdir().unwrap();

        let path = FileGenerator::new().generate_file(dir.path(), 256).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 256);
        let content = fs::read_to_string(&path).unwrap();
        for token in content.split_whitespace() {
            let number: i64 = token.parse().unwrap();
            assert!((-1000..=1000).contains(&number));
        }
    }

    #[test]
    fn test_generated_file_name_carries_size() {
        let dir = tempfile::tempdir().unwrap();

        let path = FileGenerator::new().generate_file(dir.path(), 2048).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "generated_file_2KiB.txt"
        );
    }
}
