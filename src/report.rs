/**
 * Run reporting module: per-file exception ledger and grouped summary
 */

use std::collections::BTreeMap;
use thiserror::Error;

/// Classes of per-file failure collected over a run.
///
/// An unreadable root directory is fatal before any file is touched and
/// never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Error)]
pub enum ErrorClass {
    #[error("EXIF container could not be parsed")]
    ContainerParse,
    #[error("EXIF field not present")]
    FieldMissing,
    #[error("EXIF field has an incompatible type")]
    FieldType,
    #[error("destination filename already exists")]
    Collision,
    #[error("file is not a .jpg")]
    InvalidExtension,
}

/// Accumulated per-file failures for one run.
///
/// Keyed by the file's final name. At most one entry per file: recording a
/// second failure for the same name replaces the first (last failure wins).
#[derive(Debug, Clone, Default)]
pub struct ExceptionLedger {
    entries: BTreeMap<String, ErrorClass>,
}

impl ExceptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, filename: &str, class: ErrorClass) {
        self.entries.insert(filename.to_string(), class);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, ErrorClass)> {
        self.entries.iter().map(|(name, class)| (name.as_str(), *class))
    }

    /// Failure counts grouped by class, for the end-of-run summary.
    pub fn counts_by_class(&self) -> BTreeMap<ErrorClass, usize> {
        let mut counts = BTreeMap::new();
        for class in self.entries.values() {
            *counts.entry(*class).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorClass, ExceptionLedger};

    #[test]
    fn record_keeps_only_the_last_failure_per_file() {
        let mut ledger = ExceptionLedger::new();
        ledger.record("IMG_0001.JPG", ErrorClass::FieldMissing);
        ledger.record("IMG_0001.JPG", ErrorClass::FieldType);

        assert_eq!(ledger.len(), 1);
        let (name, class) = ledger.entries().next().expect("one entry");
        assert_eq!(name, "IMG_0001.JPG");
        assert_eq!(class, ErrorClass::FieldType);
    }

    #[test]
    fn counts_group_entries_by_class() {
        let mut ledger = ExceptionLedger::new();
        ledger.record("a.jpg", ErrorClass::FieldMissing);
        ledger.record("b.jpg", ErrorClass::FieldMissing);
        ledger.record("c.jpg", ErrorClass::Collision);

        let counts = ledger.counts_by_class();
        assert_eq!(counts.get(&ErrorClass::FieldMissing), Some(&2));
        assert_eq!(counts.get(&ErrorClass::Collision), Some(&1));
        assert_eq!(counts.get(&ErrorClass::ContainerParse), None);
    }

    #[test]
    fn empty_ledger_reports_empty() {
        let ledger = ExceptionLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.counts_by_class().is_empty());
    }
}
