//! Rotating source/destination file sets for merge passes.
//!
//! A [`FileSet`] owns the run handles a sort invocation works with: the
//! source side being read, the destination side being written, the numbered
//! scratch files under the `temp` directory, the presort scratch file and the
//! canonical sorted-output path.

use std::fs;
use std::path::{Path, PathBuf};

use log;

use crate::error::SortError;
use crate::generate::format_size;
use crate::runs::RunsHandler;

const TEMP_DIR_NAME: &str = "temp";

/// How the source side is initially populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrcMode {
    /// One handle bound to the raw input file (two-way natural merge).
    Attach,
    /// The requested number of empty scratch-file handles (N-way merge,
    /// which needs N source slots up front rather than the raw file).
    Prepopulate,
}

/// Which side of the set an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Src,
    Dest,
}

pub struct FileSet {
    input_path: PathBuf,
    data_dir: PathBuf,
    mode: SrcMode,
    src: Vec<RunsHandler>,
    dest: Vec<RunsHandler>,
    presort_path: PathBuf,
    sorted_path: PathBuf,
}

impl FileSet {
    /// Creates the temp directory and the initial handle sets.
    ///
    /// The destination side always gets `num_dest` scratch files
    /// (`file0.txt ..`); the source side gets either one handle on the input
    /// or `num_src` further scratch files, depending on `mode`.
    pub fn new(
        input_path: &Path,
        num_src: usize,
        num_dest: usize,
        mode: SrcMode,
    ) -> Result<Self, SortError> {
        let input_size = fs::metadata(input_path)?.len();
        let data_dir = match input_path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let input_name = input_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("input.txt");

        let mut file_set = FileSet {
            input_path: input_path.to_path_buf(),
            presort_path: data_dir.join(format!("presorted_{}", input_name)),
            sorted_path: data_dir.join(format!("sorted_file_{}.txt", format_size(input_size))),
            data_dir,
            mode,
            src: Vec::new(),
            dest: Vec::new(),
        };
        file_set.init_runs(num_src, num_dest)?;

        return Ok(file_set);
    }

    fn init_runs(&mut self, num_src: usize, num_dest: usize) -> Result<(), SortError> {
        self.init_temp_dir()?;

        for i in 0..num_dest {
            let handler = self.new_temp_handler(i)?;
            self.dest.push(handler);
        }
        match self.mode {
            SrcMode::Attach => self.src.push(RunsHandler::new(&self.input_path)?),
            SrcMode::Prepopulate => {
                for i in num_dest..num_dest + num_src {
                    let handler = self.new_temp_handler(i)?;
                    self.src.push(handler);
                }
            }
        }

        Ok(())
    }

    fn init_temp_dir(&self) -> Result<(), SortError> {
        let temp_dir = self.data_dir.join(TEMP_DIR_NAME);
        if !temp_dir.exists() {
            fs::create_dir_all(&temp_dir).map_err(SortError::TempDir)?;
        }
        log::info!("using {} as a temporary directory", temp_dir.display());
        Ok(())
    }

    fn new_temp_handler(&self, index: usize) -> Result<RunsHandler, SortError> {
        let path = self.temp_file_path(index);
        fs::write(&path, "").map_err(SortError::TempDir)?;
        RunsHandler::new(&path)
    }

    fn temp_file_path(&self, index: usize) -> PathBuf {
        self.data_dir
            .join(TEMP_DIR_NAME)
            .join(format!("file{}.txt", index))
    }

    /// Starts the very first distribution step.
    ///
    /// Retires the tail source handle, allocates the canonical sorted-output
    /// file and pushes a fresh handle on it into the source list, then
    /// returns the handle distribution should read from: the presort scratch
    /// file when a presort ran, otherwise the raw input.
    pub fn take_initial_src(&mut self, presorted: bool) -> Result<RunsHandler, SortError> {
        let retired = self.src.pop();

        fs::write(&self.sorted_path, "")?;
        self.src.push(RunsHandler::new(&self.sorted_path)?);

        if presorted {
            return RunsHandler::new(&self.presort_path);
        }
        match retired {
            // under Attach the retired handle is the one bound to the input
            Some(handler) if self.mode == SrcMode::Attach => Ok(handler),
            _ => RunsHandler::new(&self.input_path),
        }
    }

    pub fn src_handlers_mut(&mut self) -> &mut [RunsHandler] {
        &mut self.src
    }

    pub fn dest_handlers_mut(&mut self) -> &mut [RunsHandler] {
        &mut self.dest
    }

    /// Both sides at once, for passes that read the sources while writing
    /// the destinations.
    pub fn split_mut(&mut self) -> (&mut [RunsHandler], &mut [RunsHandler]) {
        (&mut self.src, &mut self.dest)
    }

    /// Resets every handle on both sides, then swaps their roles.
    pub fn switch_src_and_dest(&mut self) -> Result<(), SortError> {
        for handler in self.dest.iter_mut() {
            handler.reset()?;
        }
        for handler in self.src.iter_mut() {
            handler.reset()?;
        }
        std::mem::swap(&mut self.src, &mut self.dest);
        Ok(())
    }

    /// Advances every handle in both lists to its reader's current run.
    pub fn move_to_next_run(&mut self) {
        for handler in self.src.iter_mut().chain(self.dest.iter_mut()) {
            handler.update_run_number();
        }
    }

    /// Truncates the files of one side.
    pub fn reset_files(&mut self, target: Target) -> Result<(), SortError> {
        let handlers = match target {
            Target::Src => &mut self.src,
            Target::Dest => &mut self.dest,
        };
        for handler in handlers.iter_mut() {
            handler.reset_file_contents()?;
        }
        Ok(())
    }

    /// Removes the temp directory and the presort scratch file if present.
    pub fn clean_up(&mut self) -> Result<(), SortError> {
        let temp_dir = self.data_dir.join(TEMP_DIR_NAME);
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir)?;
        }
        if self.presort_path.exists() {
            fs::remove_file(&self.presort_path)?;
        }
        Ok(())
    }

    /// Relocates a completed sort result onto the canonical sorted path.
    pub fn move_result_file(&self, from: &Path) -> Result<(), SortError> {
        if from != self.sorted_path {
            fs::rename(from, &self.sorted_path)?;
        }
        Ok(())
    }

    pub fn presort_path(&self) -> &Path {
        &self.presort_path
    }

    pub fn sorted_path(&self) -> &Path {
        &self.sorted_path
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::PathBuf;

    use rstest::*;

    use super::{FileSet, SrcMode, Target};

    #[fixture]
    fn data_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn input_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("input.txt");
        fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    fn test_attach_mode_layout(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1 2 3\n");

        let mut file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();

        assert!(data_dir.path().join("temp/file0.txt").exists());
        assert!(data_dir.path().join("temp/file1.txt").exists());
        assert_eq!(file_set.src_handlers_mut().len(), 1);
        assert_eq!(file_set.src_handlers_mut()[0].path(), input.as_path());
        assert_eq!(file_set.dest_handlers_mut().len(), 2);
    }

    #[rstest]
    fn test_prepopulate_mode_layout(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1 2 3\n");

        let mut file_set = FileSet::new(&input, 3, 3, SrcMode::Prepopulate).unwrap();

        for i in 0..6 {
            assert!(data_dir.path().join(format!("temp/file{}.txt", i)).exists());
        }
        assert_eq!(file_set.src_handlers_mut().len(), 3);
        assert_eq!(file_set.dest_handlers_mut().len(), 3);
    }

    #[rstest]
    fn test_take_initial_src_allocates_sorted_output(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1 2 3\n");

        let mut file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();
        let initial = file_set.take_initial_src(false).unwrap();

        // the retired handle reads the raw input, the source list now holds
        // the eventual home of the result
        assert_eq!(initial.path(), input.as_path());
        let sorted = file_set.sorted_path().to_path_buf();
        assert!(sorted.exists());
        assert_eq!(file_set.src_handlers_mut()[0].path(), sorted.as_path());
    }

    #[rstest]
    fn test_switch_swaps_roles(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1\n");

        let mut file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();
        let dest0 = file_set.dest_handlers_mut()[0].path().to_path_buf();

        file_set.switch_src_and_dest().unwrap();

        assert_eq!(file_set.src_handlers_mut()[0].path(), dest0.as_path());
        assert_eq!(file_set.dest_handlers_mut()[0].path(), input.as_path());
    }

    #[rstest]
    fn test_reset_files_truncates_one_side(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1\n");
        let mut file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();

        let dest0 = file_set.dest_handlers_mut()[0].path().to_path_buf();
        file_set.dest_handlers_mut()[0].write_nl().unwrap();
        file_set.reset_files(Target::Dest).unwrap();

        assert_eq!(fs::read_to_string(&dest0).unwrap(), "");
        assert_eq!(fs::read_to_string(&input).unwrap(), "1\n");
    }

    #[rstest]
    fn test_clean_up_removes_temp_storage(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1\n");
        let mut file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();

        fs::write(file_set.presort_path(), "1 2\n").unwrap();
        file_set.clean_up().unwrap();

        assert!(!data_dir.path().join("temp").exists());
        assert!(!data_dir.path().join("presorted_input.txt").exists());
        assert!(input.exists());
    }

    #[rstest]
    fn test_sorted_path_is_named_by_input_size(data_dir: tempfile::TempDir) {
        let input = input_file(&data_dir, "1 2 3\n");

        let file_set = FileSet::new(&input, 1, 2, SrcMode::Attach).unwrap();

        assert_eq!(
            file_set.sorted_path(),
            data_dir.path().join("sorted_file_6Bytes.txt").as_path()
        );
    }
}
