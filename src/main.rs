use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use clap::Parser;
use log::{debug, info};
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use scrubify_rs::file_ops::{remove_aae_files, select_files, BatchOptions, BatchProcessor};
use scrubify_rs::naming::{random_token, TOKEN_LENGTH};
use scrubify_rs::report::ExceptionLedger;

#[derive(Parser)]
#[command(name = "scrubify-rs")]
#[command(version)]
#[command(about = "JPEG photo anonymizer: strips EXIF dates and renames files to random tokens")]
#[command(long_about = "Batch-process the JPEG files in one directory before sharing or archiving \
them: overwrite the EXIF date fields with the run's start timestamp, rename files to anonymized \
collision-resistant names, and delete .AAE sidecar files.

Files are processed in lexicographic name order, one at a time; the numeric suffix of renamed \
files follows that order, so a --whatif dry run previews exactly the names a real run will use. \
Every run writes an append-only log under ./logs and prints its path on exit.")]
struct Cli {
    /// Run against files in the supplied directory
    #[arg(short, long)]
    dir: PathBuf,

    /// Delete the .AAE sidecar files before per-file processing
    #[arg(short, long)]
    removeaae: bool,

    /// What if; dry run
    #[arg(short, long)]
    whatif: bool,

    /// Change filename(s), rename (all) selected file(s)
    #[arg(short, long)]
    changenames: bool,

    /// Strip EXIF dates from the selected file(s)
    #[arg(short, long)]
    stripexifdates: bool,

    /// Only process files named `XXXX <N>.JPG`; for use with -c
    #[arg(short, long)]
    numberspaced: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let start = Local::now();

    if !cli.dir.is_dir() {
        eprintln!("{} is not a valid directory? Quitting.", cli.dir.display());
        return ExitCode::from(2);
    }

    let log_path = match setup_logging(start) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("{:#}", err);
            return ExitCode::from(2);
        }
    };

    match run(&cli, start) {
        Ok(ledger) => {
            println!("{}", log_path.display());
            print_exceptions(&ledger);
            if ledger.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Route the log to `logs/<Y-M-D_H-M-S>.log` under the invocation CWD.
///
/// Components are unpadded, matching the run-timestamp convention used for
/// the EXIF values. The target directory itself stays pristine so logging
/// never feeds back into file selection.
fn setup_logging(start: DateTime<Local>) -> Result<PathBuf> {
    let logs_dir = PathBuf::from("logs");
    fs::create_dir_all(&logs_dir).context("failed to create the logs directory")?;

    let log_path = logs_dir.join(format!(
        "{}-{}-{}_{}-{}-{}.log",
        start.year(),
        start.month(),
        start.day(),
        start.hour(),
        start.minute(),
        start.second()
    ));
    let log_file = File::create(&log_path)
        .with_context(|| format!("failed to create log file {}", log_path.display()))?;

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    debug!("logging_filename is {}", log_path.display());
    Ok(log_path)
}

fn run(cli: &Cli, start: DateTime<Local>) -> Result<ExceptionLedger> {
    let root = cli
        .dir
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", cli.dir.display()))?;

    debug!("dir is {}", root.display());
    debug!("removeaae is {}", cli.removeaae);
    debug!("whatif is {}", cli.whatif);
    debug!("changenames is {}", cli.changenames);
    debug!("stripexifdates is {}", cli.stripexifdates);
    debug!("numberspaced is {:?}", cli.numberspaced);
    debug!("date_now is {}", start.format("%Y-%m-%d %H:%M:%S"));

    let token = random_token(&mut rand::thread_rng(), TOKEN_LENGTH);
    debug!("batch token is {}", token);

    if cli.removeaae {
        let removed = remove_aae_files(&root, cli.whatif)?;
        info!("Removed {} .AAE files", removed);
    }

    let files = select_files(&root, cli.numberspaced.as_deref())?;
    info!("Selected {} files in {}", files.len(), root.display());

    let processor = BatchProcessor::new(
        BatchOptions {
            root,
            dry_run: cli.whatif,
            strip_exif_dates: cli.stripexifdates,
            change_names: cli.changenames,
        },
        start,
        token,
    );
    processor.process_files(&files)
}

fn print_exceptions(ledger: &ExceptionLedger) {
    if ledger.is_empty() {
        return;
    }

    println!("Exceptions collected:");
    for (name, class) in ledger.entries() {
        println!("  {}: {}", name, class);
    }

    println!("\nExceptions by class:");
    for (class, count) in ledger.counts_by_class() {
        println!("  {}: {}", class, count);
    }
}
