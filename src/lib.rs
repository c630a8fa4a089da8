//! `extmerge` is an external merge sort for numeric text files.
//!
//! External sorting is required when the data being sorted does not fit into
//! the main memory (RAM) of a computer and must instead stay on disk. The
//! crate sorts files of whitespace-separated signed integers using bounded
//! memory and sequential file access only: the input is split into sorted
//! runs distributed over rotating scratch files, and merge passes fold those
//! runs together until a single sorted run remains.
//!
//! # Overview
//!
//! `extmerge` supports the following features:
//!
//! * **Natural merging:**
//!   the two-way natural merge treats the file's pre-existing ascending
//!   subsequences as initial runs, so partially sorted data needs fewer
//!   passes.
//! * **N-way tournament merging:**
//!   the multiway merge selects the minimum among up to N concurrent run
//!   heads, trading open files for passes.
//! * **Chunk presort:**
//!   an optional preprocessing stage sorts large chunks in memory (in
//!   parallel) and writes each as one long initial run, sharply reducing the
//!   number of merge passes.
//! * **Boundary-insensitive parsing:**
//!   files are read in fixed-size chunks and a token split by a chunk
//!   boundary is never lost or misparsed, whatever the chunk size.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use extmerge::{SortAlgorithm, SorterBuilder};
//!
//! fn main() {
//!     env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();
//!
//!     let sorter = SorterBuilder::new(Path::new("data/numbers.txt"), SortAlgorithm::NaturalMerge)
//!         .with_presort(true)
//!         .build()
//!         .unwrap();
//!
//!     let sorted = sorter.sort().unwrap();
//!     println!("sorted file: {}", sorted.display());
//! }
//! ```

pub mod error;
pub mod fileset;
pub mod generate;
pub mod reader;
pub mod runs;
pub mod sort;
pub mod writer;

pub use error::SortError;
pub use fileset::{FileSet, SrcMode, Target};
pub use generate::{format_size, FileGenerator};
pub use reader::{ChunkReader, DEFAULT_CHUNK_SIZE};
pub use runs::RunsHandler;
pub use sort::{SortAlgorithm, Sorter, SorterBuilder, DEFAULT_FAN_OUT, DEFAULT_PRESORT_CHUNK_SIZE};
pub use writer::RunWriter;
