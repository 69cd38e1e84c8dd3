/**
 * File operations module: selection, sidecar cleanup, renames, and the
 * per-file processing pipeline
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::exif::{ExifScrubber, StripOutcome};
use crate::naming::{renamed_filename, COUNTER_PADDING};
use crate::report::{ErrorClass, ExceptionLedger};

/// List the files to process, in processing order.
///
/// With a `numberspaced` value `N`, only names matching `<anything> N.jpg`
/// (case-insensitive, literal space) are kept; otherwise every file whose
/// extension is `jpg` in any casing. The lexicographic sort fixes the
/// numeric suffixes assigned downstream, so a dry run and a real run see
/// the same order.
pub fn select_files(root: &Path, numberspaced: Option<&str>) -> Result<Vec<String>> {
    let filter = numberspaced
        .map(|n| Regex::new(&format!(r"(?i)^.+ {}\.jpg$", regex::escape(n))))
        .transpose()
        .context("failed to build the numbered-suffix filter")?;

    let mut names = Vec::new();
    for entry in WalkDir::new(root).max_depth(1) {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let selected = match &filter {
            Some(pattern) => pattern.is_match(&name),
            None => has_jpg_extension(entry.path()),
        };
        if selected {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

fn has_jpg_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("jpg"))
        .unwrap_or(false)
}

/// Delete every `.AAE` sidecar file in `root` (case-insensitive).
///
/// Returns the number of files deleted; finding none is not an error.
pub fn remove_aae_files(root: &Path, dry_run: bool) -> Result<usize> {
    debug!("Removing all .AAE files in {}", root.display());
    let pattern = Regex::new(r"(?i)^.+\.aae$").expect("valid sidecar pattern");

    let mut removed = 0;
    for entry in WalkDir::new(root).max_depth(1) {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !pattern.is_match(&name) {
            continue;
        }
        if dry_run {
            println!("DRYRUN: would have deleted {}", name);
            continue;
        }
        println!("Deleting {}", name);
        debug!("Deleting {}", name);
        fs::remove_file(entry.path())
            .with_context(|| format!("failed to delete {}", entry.path().display()))?;
        removed += 1;
    }
    Ok(removed)
}

/// Result of a rename attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file now lives under the returned name.
    Renamed(String),
    /// Dry run; carries the name that would have been used.
    DryRun(String),
    /// The rename was refused and the file left untouched.
    Refused(ErrorClass),
}

/// Move `name` to its anonymized destination within `root`.
///
/// Non-jpg files are refused rather than aborting the run, and an existing
/// destination is never overwritten: the token+counter scheme can collide
/// with the leftovers of an earlier run.
pub fn rename_file(
    root: &Path,
    name: &str,
    token: &str,
    counter: usize,
    dry_run: bool,
) -> Result<RenameOutcome> {
    let source = root.join(name);
    if !has_jpg_extension(&source) {
        println!("{} is not a .JPG! No action taken.", name);
        debug!("{} is not a .jpg, skipping rename", name);
        return Ok(RenameOutcome::Refused(ErrorClass::InvalidExtension));
    }

    let new_name = renamed_filename(token, counter, COUNTER_PADDING);

    if dry_run {
        println!("DRYRUN: {} would have been renamed {}", name, new_name);
        return Ok(RenameOutcome::DryRun(new_name));
    }

    let destination = root.join(&new_name);
    if destination.exists() {
        warn!("{} already exists, not renaming {}", new_name, name);
        return Ok(RenameOutcome::Refused(ErrorClass::Collision));
    }

    debug!("{} is being renamed {}", name, new_name);
    fs::rename(&source, &destination).with_context(|| {
        format!(
            "failed to rename {} to {}",
            source.display(),
            destination.display()
        )
    })?;
    Ok(RenameOutcome::Renamed(new_name))
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    pub strip_exif_dates: bool,
    pub change_names: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub final_name: String,
    pub error: Option<ErrorClass>,
}

/// Drives the per-file pipeline: scrub dates, then rename, in that order,
/// one file fully completing before the next begins.
pub struct BatchProcessor {
    options: BatchOptions,
    scrubber: ExifScrubber,
    token: String,
}

impl BatchProcessor {
    pub fn new(options: BatchOptions, timestamp: DateTime<Local>, token: String) -> Self {
        Self {
            scrubber: ExifScrubber::new(timestamp),
            options,
            token,
        }
    }

    /// Process the selected files sequentially.
    ///
    /// The 0-based counter advances once per file whatever actions ran on
    /// it, so runs with different flag combinations assign the same numeric
    /// suffixes.
    pub fn process_files(&self, files: &[String]) -> Result<ExceptionLedger> {
        info!("Processing {} files", files.len());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1} files/s) ETA: {eta} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Processing files");

        let mut ledger = ExceptionLedger::new();
        for (counter, name) in files.iter().enumerate() {
            let result = self.process_single_file(name, counter)?;
            if let Some(class) = result.error {
                ledger.record(&result.final_name, class);
            }
            pb.inc(1);
        }

        pb.finish_with_message("Processing complete");
        Ok(ledger)
    }

    fn process_single_file(&self, name: &str, counter: usize) -> Result<ProcessResult> {
        let mut final_name = name.to_string();
        let mut error = None;

        if self.options.strip_exif_dates {
            let outcome = self
                .scrubber
                .scrub_file(&self.options.root.join(name), self.options.dry_run);
            if let Some(class) = outcome.ledger_entry() {
                error = Some(class);
            }
            if matches!(outcome, StripOutcome::Aborted(_)) {
                // an unparseable container abandons the file before any rename
                return Ok(ProcessResult { final_name, error });
            }
        }

        if self.options.change_names {
            match rename_file(
                &self.options.root,
                name,
                &self.token,
                counter,
                self.options.dry_run,
            )? {
                RenameOutcome::Renamed(new_name) => final_name = new_name,
                RenameOutcome::DryRun(_) => {}
                RenameOutcome::Refused(class) => error = Some(class),
            }
        }

        Ok(ProcessResult { final_name, error })
    }
}
