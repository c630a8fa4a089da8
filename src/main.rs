use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use extmerge::{FileGenerator, SortAlgorithm, SorterBuilder};

fn main() {
    let matches = build_arg_parser();

    let log_level: LogLevel = matches.value_of_t_or_exit("log_level");
    init_logger(log_level);

    match matches.subcommand() {
        Some(("sort", sub_matches)) => run_sort(sub_matches),
        Some(("generate", sub_matches)) => run_generate(sub_matches),
        _ => {
            log::error!("a subcommand is required");
            process::exit(2);
        }
    }
}

fn run_sort(matches: &clap::ArgMatches) {
    let input = matches.value_of("input").expect("value is required");
    let input_path = match validate_input_path(input) {
        Ok(path) => path,
        Err(message) => {
            log::error!("{}", message);
            process::exit(1);
        }
    };

    let technique: Technique = matches.value_of_t_or_exit("type");
    let fan_out: usize = matches.value_of_t_or_exit("fan_out");

    let mut sorter_builder = SorterBuilder::new(&input_path, technique.into())
        .with_presort(matches.is_present("presort"))
        .with_fan_out(fan_out);

    if let Some(chunk_size) = matches.value_of("chunk_size") {
        let chunk_size = chunk_size.parse::<ByteSize>().expect("value is pre-validated");
        sorter_builder = sorter_builder.with_presort_chunk_size(chunk_size.as_u64() as usize);
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    match sorter.sort() {
        Ok(path) => log::info!("sorted file written to {}", path.display()),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

fn run_generate(matches: &clap::ArgMatches) {
    let dir = matches.value_of("dir").expect("value is required");
    let size = matches.value_of("size").expect("value is required");
    let size = size.parse::<ByteSize>().expect("value is pre-validated").as_u64();

    match FileGenerator::new().generate_file(Path::new(dir), size) {
        Ok(path) => log::info!("generated file written to {}", path.display()),
        Err(err) => {
            log::error!("file generation error: {}", err);
            process::exit(1);
        }
    }
}

fn validate_input_path(input: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(input);

    if !path.exists() {
        return Err(format!("invalid path: {}", path.display()));
    }

    let metadata = fs::metadata(&path).map_err(|err| format!("cannot stat path: {}", err))?;
    if !metadata.is_file() {
        return Err(format!("provided path '{}' is not a file", path.display()));
    }

    match path.extension().and_then(|extension| extension.to_str()) {
        Some("txt") => Ok(path),
        _ => Err(String::from("file should have '.txt' extension")),
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Technique {
    NaturalMerge,
    MultiWayMerge,
}

impl Technique {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Technique::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Technique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Technique as clap::ArgEnum>::from_str(s, false)
    }
}

impl From<Technique> for SortAlgorithm {
    fn from(technique: Technique) -> Self {
        match technique {
            Technique::NaturalMerge => SortAlgorithm::NaturalMerge,
            Technique::MultiWayMerge => SortAlgorithm::MultiWayMerge,
        }
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("extmerge")
        .about("external merge sort for large numeric text files")
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values())
                .global(true),
        )
        .subcommand(
            clap::App::new("sort")
                .about("sort a numeric text file")
                .arg(
                    clap::Arg::new("input")
                        .help("file to be sorted")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("type")
                        .short('t')
                        .long("type")
                        .help("merge algorithm")
                        .takes_value(true)
                        .default_value("natural-merge")
                        .possible_values(Technique::possible_values()),
                )
                .arg(
                    clap::Arg::new("presort")
                        .short('p')
                        .long("presort")
                        .help("presort large chunks in memory to manufacture long initial runs"),
                )
                .arg(
                    clap::Arg::new("fan_out")
                        .short('n')
                        .long("fan-out")
                        .help("number of files merged concurrently by the multi-way merge")
                        .takes_value(true)
                        .default_value("4")
                        .validator(|v| match v.parse::<usize>() {
                            Ok(n) if n >= 2 => Ok(()),
                            Ok(_) => Err(String::from("fan-out must be at least 2")),
                            Err(err) => Err(format!("fan-out format incorrect: {}", err)),
                        }),
                )
                .arg(
                    clap::Arg::new("chunk_size")
                        .short('c')
                        .long("chunk-size")
                        .help("presort chunk size")
                        .takes_value(true)
                        .validator(|v| match v.parse::<ByteSize>() {
                            Ok(_) => Ok(()),
                            Err(err) => Err(format!("chunk size format incorrect: {}", err)),
                        }),
                ),
        )
        .subcommand(
            clap::App::new("generate")
                .about("generate a file of random integers for sorting experiments")
                .arg(
                    clap::Arg::new("dir")
                        .help("directory for the generated file")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("size")
                        .short('s')
                        .long("size")
                        .help("generated file size")
                        .takes_value(true)
                        .default_value("1MiB")
                        .validator(|v| match v.parse::<ByteSize>() {
                            Ok(_) => Ok(()),
                            Err(err) => Err(format!("size format incorrect: {}", err)),
                        }),
                ),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
