//! External sort engine.
//!
//! Drives a [`FileSet`] through repeated distribute-and-merge passes until
//! the data collapses to a single sorted run. Two algorithms are available:
//! a two-way natural merge and an N-way tournament merge. Both can be
//! preceded by a presort stage that manufactures long initial runs by
//! sorting large chunks in memory.

use std::fs;
use std::path::{Path, PathBuf};

use log;
use rayon::prelude::*;

use crate::error::SortError;
use crate::fileset::{FileSet, SrcMode, Target};
use crate::reader::{split_on_last_whitespace, ChunkReader};
use crate::runs::RunsHandler;
use crate::writer::RunWriter;

/// Default fan-out of the N-way merge.
pub const DEFAULT_FAN_OUT: usize = 4;

/// Default presort chunk size in bytes. Each chunk is sorted in memory and
/// becomes one initial run.
pub const DEFAULT_PRESORT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Merge algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAlgorithm {
    /// Two-way merge over the file's pre-existing ascending runs.
    NaturalMerge,
    /// Tournament merge over N concurrent input runs.
    MultiWayMerge,
}

/// External sorter builder. Provides methods for [`Sorter`] initialization.
#[derive(Clone)]
pub struct SorterBuilder {
    input_path: PathBuf,
    algorithm: SortAlgorithm,
    presort: bool,
    fan_out: usize,
    presort_chunk_size: usize,
}

impl SorterBuilder {
    /// Creates a builder for sorting `input_path` with `algorithm`.
    pub fn new(input_path: &Path, algorithm: SortAlgorithm) -> Self {
        SorterBuilder {
            input_path: input_path.to_path_buf(),
            algorithm,
            presort: false,
            fan_out: DEFAULT_FAN_OUT,
            presort_chunk_size: DEFAULT_PRESORT_CHUNK_SIZE,
        }
    }

    /// Enables the chunk-presort preprocessing stage.
    pub fn with_presort(mut self, presort: bool) -> SorterBuilder {
        self.presort = presort;
        return self;
    }

    /// Sets the N-way merge fan-out. Values below 2 are treated as 2.
    pub fn with_fan_out(mut self, fan_out: usize) -> SorterBuilder {
        self.fan_out = fan_out.max(2);
        return self;
    }

    /// Sets the presort chunk size in bytes.
    pub fn with_presort_chunk_size(mut self, size: usize) -> SorterBuilder {
        self.presort_chunk_size = size.max(1);
        return self;
    }

    /// Builds a [`Sorter`] instance using the provided configuration.
    pub fn build(self) -> Result<Sorter, SortError> {
        Sorter::new(
            &self.input_path,
            self.algorithm,
            self.presort,
            self.fan_out,
            self.presort_chunk_size,
        )
    }
}

/// External sorter over one input file.
pub struct Sorter {
    input_path: PathBuf,
    algorithm: SortAlgorithm,
    presort: bool,
    presort_chunk_size: usize,
    files: FileSet,
}

impl Sorter {
    fn new(
        input_path: &Path,
        algorithm: SortAlgorithm,
        presort: bool,
        fan_out: usize,
        presort_chunk_size: usize,
    ) -> Result<Self, SortError> {
        let files = match algorithm {
            SortAlgorithm::NaturalMerge => FileSet::new(input_path, 1, 2, SrcMode::Attach)?,
            SortAlgorithm::MultiWayMerge => {
                FileSet::new(input_path, fan_out, fan_out, SrcMode::Prepopulate)?
            }
        };

        return Ok(Sorter {
            input_path: input_path.to_path_buf(),
            algorithm,
            presort,
            presort_chunk_size,
            files,
        });
    }

    /// Sorts the input file and returns the path of the sorted result.
    ///
    /// Temp storage is removed afterwards, on failure as well as on success;
    /// a failed sort leaves no temp artifacts behind.
    pub fn sort(mut self) -> Result<PathBuf, SortError> {
        log::info!(
            "sorting {} ({:?}, presort: {})",
            self.input_path.display(),
            self.algorithm,
            self.presort,
        );

        let result = match self.algorithm {
            SortAlgorithm::NaturalMerge => self.natural_merge(),
            SortAlgorithm::MultiWayMerge => self.multi_way_merge(),
        };

        match result {
            Ok(()) => {
                self.files.clean_up()?;
                log::info!("sorted result at {}", self.files.sorted_path().display());
                Ok(self.files.sorted_path().to_path_buf())
            }
            Err(err) => {
                // the error being reported stays the sort's own
                if let Err(cleanup_err) = self.files.clean_up() {
                    log::warn!("temp cleanup failed: {}", cleanup_err);
                }
                Err(err)
            }
        }
    }

    /// Two-way natural merge: split the source's runs alternately over two
    /// scratch files, then merge them pairwise back, until a pass produces at
    /// most one run.
    fn natural_merge(&mut self) -> Result<(), SortError> {
        if self.presort {
            self.preprocess_file()?;
        }

        let mut passes = 0u32;
        loop {
            let mut merged_runs = 0usize;

            // distribution: runs go round-robin into the destinations
            let mut initial_src = if passes == 0 {
                Some(self.files.take_initial_src(self.presort)?)
            } else {
                None
            };
            self.files.reset_files(Target::Dest)?;
            {
                let (srcs, dests) = self.files.split_mut();
                let src = match initial_src.as_mut() {
                    Some(handler) => handler,
                    None => &mut srcs[0],
                };
                distribute(src, dests)?;
            }
            self.files.reset_files(Target::Src)?;
            self.files.switch_src_and_dest()?;

            // merge: one run from each source merges into one output run
            {
                let (srcs, dests) = self.files.split_mut();
                let (head, tail) = srcs.split_at_mut(1);
                let first = &mut head[0];
                let second = &mut tail[0];
                let dest = &mut dests[0];

                first.update_run_number();
                second.update_run_number();

                while !first.is_eof()? && !second.is_eof()? {
                    merge_one_run(first, second, dest)?;
                    dest.write_nl()?;
                    first.update_run_number();
                    second.update_run_number();
                    dest.update_run_number();
                    merged_runs += 1;
                }

                // drain whole leftover runs from whichever side still has data
                while !first.is_eof()? {
                    dest.copy_run(first)?;
                    merged_runs += 1;
                }
                while !second.is_eof()? {
                    dest.copy_run(second)?;
                    merged_runs += 1;
                }
            }

            passes += 1;
            self.files.switch_src_and_dest()?;
            log::debug!("pass {} produced {} runs", passes, merged_runs);

            if merged_runs <= 1 {
                break;
            }
        }

        self.relocate_result()
    }

    /// N-way tournament merge: distribute runs over N scratch files once,
    /// then repeatedly merge the minimum head among up to N active runs into
    /// a writer cycling over N outputs, until a pass produces at most one
    /// run.
    fn multi_way_merge(&mut self) -> Result<(), SortError> {
        if self.presort {
            self.preprocess_file()?;
        }

        let mut src = self.files.take_initial_src(self.presort)?;
        self.files.reset_files(Target::Dest)?;
        let mut run_count = {
            let dests = self.files.dest_handlers_mut();
            distribute(&mut src, dests)?
        };
        drop(src);
        self.files.reset_files(Target::Src)?;
        self.files.switch_src_and_dest()?;
        log::debug!("distributed {} initial runs", run_count);

        let mut passes = 1u32;
        while run_count > 1 {
            run_count = 0;
            self.files.move_to_next_run();
            self.files.reset_files(Target::Dest)?;

            let (srcs, dests) = self.files.split_mut();
            let mut pool = Vec::new();
            for index in 0..srcs.len() {
                if !srcs[index].is_eof()? {
                    pool.push(index);
                }
            }

            let mut writer_pos = 0usize;
            while !pool.is_empty() {
                // one output run: merge one run from every pooled source
                let mut active = pool.clone();
                let mut copied_any = false;

                while !active.is_empty() {
                    let mut best: Option<(usize, i64)> = None;
                    for (pos, &index) in active.iter().enumerate() {
                        if let Some(value) = srcs[index].peek_next()? {
                            let better = match best {
                                Some((_, smallest)) => value < smallest,
                                None => true,
                            };
                            if better {
                                best = Some((pos, value));
                            }
                        }
                    }

                    let pos = match best {
                        Some((pos, _)) => pos,
                        None => {
                            // every active handle is between runs; retire them
                            for &index in &active {
                                if srcs[index].is_eof()? {
                                    pool.retain(|&pooled| pooled != index);
                                } else {
                                    srcs[index].update_run_number();
                                }
                            }
                            active.clear();
                            continue;
                        }
                    };

                    let index = active[pos];
                    dests[writer_pos].copy_number(&mut srcs[index])?;
                    copied_any = true;

                    if srcs[index].is_eor()? {
                        active.remove(pos);
                        if srcs[index].is_eof()? {
                            pool.retain(|&pooled| pooled != index);
                        } else {
                            srcs[index].update_run_number();
                        }
                    }
                }

                if copied_any {
                    dests[writer_pos].write_nl()?;
                    run_count += 1;
                    writer_pos = (writer_pos + 1) % dests.len();
                }
            }

            passes += 1;
            self.files.switch_src_and_dest()?;
            log::debug!("pass {} produced {} runs", passes, run_count);
        }

        self.relocate_result()
    }

    /// After the final swap the single-run result sits in source slot 0;
    /// move it onto the canonical sorted path.
    fn relocate_result(&mut self) -> Result<(), SortError> {
        let result_path = self.files.src_handlers_mut()[0].path().to_path_buf();
        self.files.move_result_file(&result_path)
    }

    /// Presort stage: reads the input in large chunks, sorts each chunk's
    /// integers in memory and writes it as one line of the scratch file, so
    /// every chunk becomes a single long initial run.
    fn preprocess_file(&mut self) -> Result<(), SortError> {
        let scratch = self.files.presort_path().to_path_buf();
        fs::write(&scratch, "").map_err(SortError::TempDir)?;

        let mut reader = ChunkReader::with_chunk_size(&self.input_path, self.presort_chunk_size)?;
        let mut writer = RunWriter::new(&scratch)?;
        let mut leftover = String::new();
        let mut chunks = 0usize;

        while let Some(chunk) = reader.next_chunk()? {
            let mut text = std::mem::take(&mut leftover);
            text.push_str(&chunk);

            let parsable = if reader.at_eof() {
                text.as_str()
            } else {
                match split_on_last_whitespace(&text) {
                    Some((head, tail)) => {
                        leftover = tail.to_string();
                        head
                    }
                    None => {
                        leftover = text.clone();
                        ""
                    }
                }
            };

            let line = sort_chunk(parsable)?;
            if !line.is_empty() {
                writer.write(&line)?;
                chunks += 1;
            }
        }

        writer.end()?;
        log::debug!("presorted {} chunks into {}", chunks, scratch.display());
        Ok(())
    }
}

/// Copies runs from `src` round-robin into the destinations: run `i` goes to
/// destination `i mod N`. Returns the number of runs distributed.
fn distribute(src: &mut RunsHandler, dests: &mut [RunsHandler]) -> Result<usize, SortError> {
    let mut current = 0usize;
    let mut runs = 0usize;

    while !src.is_eof()? {
        dests[current].copy_run(src)?;
        src.update_run_number();
        current = (current + 1) % dests.len();
        runs += 1;
    }

    return Ok(runs);
}

/// Merges one run from `first` and one from `second` into `dest` by always
/// copying the smaller head; when one side's run ends the other side's rest
/// is drained. The caller terminates the output run with a newline.
fn merge_one_run(
    first: &mut RunsHandler,
    second: &mut RunsHandler,
    dest: &mut RunsHandler,
) -> Result<(), SortError> {
    loop {
        let next1 = first.peek_next()?;
        let next2 = second.peek_next()?;

        let take_first = match (next1, next2) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if take_first {
            dest.copy_number(first)?;
            if first.is_eor()? && next2.is_some() {
                dest.copy_number(second)?;
            }
        } else {
            dest.copy_number(second)?;
            if second.is_eor()? && next1.is_some() {
                dest.copy_number(first)?;
            }
        }

        if first.is_eor()? && second.is_eor()? {
            break;
        }
    }

    Ok(())
}

/// Parses every integer in `text`, sorts them in parallel and renders them as
/// a single line. Whitespace-only input yields an empty string.
pub(crate) fn sort_chunk(text: &str) -> Result<String, SortError> {
    let mut numbers = Vec::new();
    for token in text.split_whitespace() {
        let number = token
            .parse::<i64>()
            .map_err(|_| SortError::Format(token.to_string()))?;
        numbers.push(number);
    }

    if numbers.is_empty() {
        return Ok(String::new());
    }

    numbers.par_sort_unstable();

    let rendered: Vec<String> = numbers.iter().map(i64::to_string).collect();
    return Ok(rendered.join(" ") + "\n");
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{distribute, sort_chunk, SortAlgorithm, SorterBuilder};
    use crate::error::SortError;
    use crate::fileset::{FileSet, SrcMode};
    use crate::runs::RunsHandler;

    fn write_input(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("input.txt");
        fs::write(&path, content).unwrap();
        path
    }

    fn read_numbers(path: &Path) -> Vec<i64> {
        fs::read_to_string(path)
            .unwrap()
            .split_whitespace()
            .map(|token| token.parse().unwrap())
            .collect()
    }

    #[rstest]
    #[case(SortAlgorithm::NaturalMerge, false)]
    #[case(SortAlgorithm::NaturalMerge, true)]
    #[case(SortAlgorithm::MultiWayMerge, false)]
    #[case(SortAlgorithm::MultiWayMerge, true)]
    fn test_sort_round_trip(#[case] algorithm: SortAlgorithm, #[case] presort: bool) {
        let dir = tempfile::tempdir().unwrap();

        let mut numbers: Vec<i64> = (-250..250).collect();
        numbers.shuffle(&mut rand::thread_rng());
        let content: String = numbers
            .chunks(10)
            .map(|line| {
                let rendered: Vec<String> = line.iter().map(i64::to_string).collect();
                rendered.join(" ") + "\n"
            })
            .collect();
        let input = write_input(dir.path(), &content);

        let sorter = SorterBuilder::new(&input, algorithm)
            .with_presort(presort)
            .build()
            .unwrap();
        let sorted_path = sorter.sort().unwrap();

        let expected: Vec<i64> = (-250..250).collect();
        assert_eq!(read_numbers(&sorted_path), expected);
        assert!(!dir.path().join("temp").exists());
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(7)]
    fn test_multi_way_fan_out_variations(#[case] fan_out: usize) {
        let dir = tempfile::tempdir().unwrap();
        let mut numbers: Vec<i64> = (0..300).collect();
        numbers.shuffle(&mut rand::thread_rng());
        let rendered: Vec<String> = numbers.iter().map(i64::to_string).collect();
        let input = write_input(dir.path(), &(rendered.join("\n") + "\n"));

        let sorter = SorterBuilder::new(&input, SortAlgorithm::MultiWayMerge)
            .with_fan_out(fan_out)
            .build()
            .unwrap();
        let sorted_path = sorter.sort().unwrap();

        let expected: Vec<i64> = (0..300).collect();
        assert_eq!(read_numbers(&sorted_path), expected);
    }

    #[rstest]
    #[case(SortAlgorithm::NaturalMerge)]
    #[case(SortAlgorithm::MultiWayMerge)]
    fn test_duplicates_survive_as_a_multiset(#[case] algorithm: SortAlgorithm) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "3 1 3\n2 3 1\n-5 -5\n");

        let sorter = SorterBuilder::new(&input, algorithm).build().unwrap();
        let sorted_path = sorter.sort().unwrap();

        assert_eq!(read_numbers(&sorted_path), vec![-5, -5, 1, 1, 2, 3, 3, 3]);
    }

    #[rstest]
    #[case(SortAlgorithm::NaturalMerge)]
    #[case(SortAlgorithm::MultiWayMerge)]
    fn test_already_sorted_input_is_unchanged(#[case] algorithm: SortAlgorithm) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "1 2 3 4 5 6 7\n");

        let sorter = SorterBuilder::new(&input, algorithm).build().unwrap();
        let sorted_path = sorter.sort().unwrap();

        assert_eq!(read_numbers(&sorted_path), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[rstest]
    #[case(SortAlgorithm::NaturalMerge)]
    #[case(SortAlgorithm::MultiWayMerge)]
    fn test_empty_input_sorts_to_empty_output(#[case] algorithm: SortAlgorithm) {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "");

        let sorter = SorterBuilder::new(&input, algorithm).build().unwrap();
        let sorted_path = sorter.sort().unwrap();

        assert_eq!(fs::read_to_string(&sorted_path).unwrap(), "");
        assert!(!dir.path().join("temp").exists());
    }

    #[test]
    fn test_trailing_zero_is_sorted_not_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "3 1 0");

        let sorter = SorterBuilder::new(&input, SortAlgorithm::NaturalMerge)
            .build()
            .unwrap();
        let sorted_path = sorter.sort().unwrap();

        assert_eq!(read_numbers(&sorted_path), vec![0, 1, 3]);
    }

    #[test]
    fn test_format_error_aborts_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "1 2 oops 4\n");

        let sorter = SorterBuilder::new(&input, SortAlgorithm::NaturalMerge)
            .build()
            .unwrap();
        let result = sorter.sort();

        assert!(matches!(result, Err(SortError::Format(token)) if token == "oops"));
        assert!(!dir.path().join("temp").exists());
        assert_eq!(fs::read_to_string(&input).unwrap(), "1 2 oops 4\n");
    }

    #[test]
    fn test_sort_chunk_merges_lines_into_one_sorted_run() {
        assert_eq!(sort_chunk("5 1 3 2\n7 6 4\n").unwrap(), "1 2 3 4 5 6 7\n");
    }

    #[test]
    fn test_sort_chunk_of_whitespace_is_empty() {
        assert_eq!(sort_chunk(" \n \n").unwrap(), "");
    }

    #[test]
    fn test_distribution_is_round_robin() {
        let dir = tempfile::tempdir().unwrap();
        // five single-number lines make five runs
        let input = write_input(dir.path(), "1\n2\n3\n4\n5\n");

        let mut file_set = FileSet::new(&input, 3, 3, SrcMode::Prepopulate).unwrap();
        let mut src = RunsHandler::new(&input).unwrap();
        let runs = distribute(&mut src, file_set.dest_handlers_mut()).unwrap();
        for handler in file_set.dest_handlers_mut() {
            handler.writer().end().unwrap();
        }

        assert_eq!(runs, 5);
        let contents: Vec<String> = (0..3)
            .map(|i| fs::read_to_string(dir.path().join(format!("temp/file{}.txt", i))).unwrap())
            .collect();
        assert_eq!(contents[0], "1 \n4 \n");
        assert_eq!(contents[1], "2 \n5 \n");
        assert_eq!(contents[2], "3 \n");

        file_set.clean_up().unwrap();
    }

    #[test]
    fn test_presorted_distribution_keeps_runs_unaltered() {
        // a presorted file is one run per line; a distribution pass carries
        // that run into the destination unaltered and a single merge pass
        // finishes the sort
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "5 1 3 2\n7 6 4\n");

        let sorter = SorterBuilder::new(&input, SortAlgorithm::NaturalMerge)
            .with_presort(true)
            .with_presort_chunk_size(1024)
            .build()
            .unwrap();
        let sorted_path = sorter.sort().unwrap();

        assert_eq!(
            fs::read_to_string(&sorted_path).unwrap(),
            "1 2 3 4 5 6 7 \n"
        );
    }
}
