//! Inspect and compare SBF files.
//!
//! ```bash
//! sbftool -l data.sbf          # list dataset headers
//! sbftool -d data.sbf          # headers and contents
//! sbftool --json a.sbf b.sbf   # headers as JSON
//! sbftool -c a.sbf b.sbf       # diff; exit status is the mismatch count
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::LevelFilter;
use serde::Serialize;

use sbf::header::DatasetHeader;
use sbf::{Config, SbfFile, diff, dump};

#[derive(Parser)]
#[command(name = "sbftool")]
#[command(about = "Inspect and compare SBF files")]
struct Cli {
    /// List all datasets in each file
    #[arg(short, long)]
    list: bool,

    /// Print the contents of all datasets
    #[arg(short, long)]
    dump: bool,

    /// Print dataset headers as JSON
    #[arg(long)]
    json: bool,

    /// Compare the contents of two files
    #[arg(short, long)]
    compare: bool,

    /// Tolerance for floating point comparison
    #[arg(long)]
    epsilon: Option<f64>,

    /// JSON file with format limits and diff options
    #[arg(long)]
    config: Option<PathBuf>,

    /// More output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Less output (repeatable)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// SBF files to read
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Listing<'a> {
    path: &'a Path,
    datasets: Vec<&'a DatasetHeader>,
}

fn level(verbose: u8, quiet: u8) -> LevelFilter {
    match 2 + i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(level(cli.verbose, cli.quiet))
        .format_timestamp(None)
        .init();

    let mut config = match &cli.config {
        Some(path) => match Config::from_path(path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(epsilon) = cli.epsilon {
        config.diff.epsilon = epsilon;
        if let Err(e) = config.diff.validate() {
            log::error!("--epsilon: {e}");
            return ExitCode::FAILURE;
        }
    }

    if cli.compare {
        return compare(&cli.files, &config);
    }

    let mut failed = false;
    for path in &cli.files {
        if let Err(e) = show(path, &cli, &config) {
            log::error!("{}: {e}", path.display());
            failed = true;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn show(path: &Path, cli: &Cli, config: &Config) -> sbf::Result<()> {
    let mut file = SbfFile::open(path, config.limits)?;
    if cli.json {
        let listing = Listing {
            path,
            datasets: file.datasets().iter().map(|d| d.header()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
    }
    if !(cli.list || cli.dump) {
        return Ok(());
    }

    println!("---- {} ----", path.display());
    for i in 0..file.n_datasets() {
        let header = file.datasets()[i].header().clone();
        println!("{}", dump::describe(&header));
        if cli.dump {
            let data = file.read_dataset_to_vec(i)?;
            println!("{}", dump::render(&header, &data)?);
        }
    }
    file.close()
}

fn compare(files: &[PathBuf], config: &Config) -> ExitCode {
    let [a_path, b_path] = files else {
        log::error!("comparison needs exactly two files, got {}", files.len());
        return ExitCode::FAILURE;
    };
    let open = |path: &PathBuf| {
        SbfFile::open(path, config.limits).map_err(|e| log::error!("{}: {e}", path.display()))
    };
    let (Ok(mut a), Ok(mut b)) = (open(a_path), open(b_path)) else {
        return ExitCode::FAILURE;
    };

    match diff::diff_files(&mut a, &mut b, &config.diff) {
        Ok(mismatches) => {
            println!("{} mismatches", mismatches.len());
            let status = u8::try_from(mismatches.len()).unwrap_or_else(|_| {
                log::warn!("mismatch count exceeds 255; exit status saturated");
                u8::MAX
            });
            ExitCode::from(status)
        }
        Err(e) => {
            log::error!("comparing {} with {}: {e}", a_path.display(), b_path.display());
            ExitCode::FAILURE
        }
    }
}
