/**
 * EXIF date scrubbing module
 *
 * Parses a JPEG's EXIF container, overwrites the four date-bearing fields
 * with the run timestamp, and swaps the APP1 segment back in without
 * re-encoding image data. Field failures are tolerated one by one: a photo
 * whose camera never wrote GPS data must not block scrubbing its capture
 * time.
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use exif::{Field, In, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use log::{debug, warn};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::report::ErrorClass;

/// The date-bearing EXIF fields this tool overwrites, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    DateTime,
    DateTimeOriginal,
    DateTimeDigitized,
    GpsDateStamp,
}

pub const DATE_FIELDS: [DateField; 4] = [
    DateField::DateTime,
    DateField::DateTimeOriginal,
    DateField::DateTimeDigitized,
    DateField::GpsDateStamp,
];

impl DateField {
    fn tag(self) -> Tag {
        match self {
            DateField::DateTime => Tag::DateTime,
            DateField::DateTimeOriginal => Tag::DateTimeOriginal,
            DateField::DateTimeDigitized => Tag::DateTimeDigitized,
            DateField::GpsDateStamp => Tag::GPSDateStamp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DateField::DateTime => "datetime",
            DateField::DateTimeOriginal => "datetime_original",
            DateField::DateTimeDigitized => "datetime_digitized",
            DateField::GpsDateStamp => "gps_datestamp",
        }
    }
}

/// Result of scrubbing a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripOutcome {
    /// Dry run; nothing was opened or written.
    Skipped,
    /// The container could not be parsed or rewritten; the file's bytes are
    /// untouched and no field was attempted past the failure.
    Aborted(ErrorClass),
    /// The file was rewritten. `failures` lists the fields that could not
    /// be updated, in attempt order; empty means all four were overwritten.
    Rewritten {
        failures: Vec<(DateField, ErrorClass)>,
    },
}

impl StripOutcome {
    /// The class this outcome contributes to the ledger, if any. Mirrors
    /// the one-entry-per-file contract: the last field failure wins.
    pub fn ledger_entry(&self) -> Option<ErrorClass> {
        match self {
            StripOutcome::Skipped => None,
            StripOutcome::Aborted(class) => Some(*class),
            StripOutcome::Rewritten { failures } => failures.last().map(|(_, class)| *class),
        }
    }
}

/// Overwrites date metadata with a fixed per-run timestamp.
pub struct ExifScrubber {
    datetime_value: String,
    datestamp_value: String,
}

impl ExifScrubber {
    pub fn new(timestamp: DateTime<Local>) -> Self {
        Self {
            datetime_value: format_datetime(timestamp),
            datestamp_value: format_datestamp(timestamp),
        }
    }

    /// Scrub the date fields of one file in place.
    ///
    /// The container is parsed once; each of the four fields is then
    /// attempted independently, and the container is reserialized even when
    /// every attempt failed (an unchanged field set rewrites to the same
    /// metadata, which is harmless).
    pub fn scrub_file(&self, path: &Path, dry_run: bool) -> StripOutcome {
        if dry_run {
            println!(
                "DRYRUN: would have removed EXIF date data on {}",
                path.display()
            );
            return StripOutcome::Skipped;
        }

        debug!("Attempting to modify EXIF dates for {}", path.display());

        let original = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("could not read {}: {}", path.display(), err);
                return StripOutcome::Aborted(ErrorClass::ContainerParse);
            }
        };

        let parsed = match exif::Reader::new().read_from_container(&mut Cursor::new(&original)) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    "could not parse EXIF container in {}: {}",
                    path.display(),
                    err
                );
                return StripOutcome::Aborted(ErrorClass::ContainerParse);
            }
        };

        let mut fields: Vec<Field> = parsed
            .fields()
            .map(|f| Field {
                tag: f.tag,
                ifd_num: f.ifd_num,
                value: f.value.clone(),
            })
            .collect();

        let failures = self.scrub_fields(&mut fields);

        if let Err(err) = rewrite_exif(path, &original, &fields) {
            warn!("could not rewrite {}: {:#}", path.display(), err);
            return StripOutcome::Aborted(ErrorClass::ContainerParse);
        }

        StripOutcome::Rewritten { failures }
    }

    /// Replace the four date fields inside a parsed field set.
    ///
    /// A field the container never carried is not invented, and a field
    /// present with a non-ASCII value is left as found; both are recorded
    /// as failures and processing moves on to the next field.
    fn scrub_fields(&self, fields: &mut [Field]) -> Vec<(DateField, ErrorClass)> {
        let mut failures = Vec::new();

        for date_field in DATE_FIELDS {
            let replacement = match date_field {
                DateField::GpsDateStamp => &self.datestamp_value,
                _ => &self.datetime_value,
            };

            let existing = fields
                .iter_mut()
                .find(|f| f.tag == date_field.tag() && f.ifd_num == In::PRIMARY);

            match existing {
                None => {
                    debug!("{} is not present", date_field.name());
                    failures.push((date_field, ErrorClass::FieldMissing));
                }
                Some(field) => {
                    debug!("Before {}: {}", date_field.name(), field.display_value());
                    if matches!(field.value, Value::Ascii(_)) {
                        field.value = Value::Ascii(vec![replacement.as_bytes().to_vec()]);
                        debug!("After {}: {}", date_field.name(), replacement);
                    } else {
                        warn!(
                            "{} has an incompatible type, leaving it as-is",
                            date_field.name()
                        );
                        failures.push((date_field, ErrorClass::FieldType));
                    }
                }
            }
        }

        failures
    }
}

/// Unpadded `Y:M:D H:M:S`, the exact layout existing consumers expect.
fn format_datetime(ts: DateTime<Local>) -> String {
    format!(
        "{}:{}:{} {}:{}:{}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

fn format_datestamp(ts: DateTime<Local>) -> String {
    format!("{}:{}:{}", ts.year(), ts.month(), ts.day())
}

/// Serialize `fields` and splice them back into the JPEG as its APP1
/// segment, preserving every other segment byte-for-byte.
fn rewrite_exif(path: &Path, original: &[u8], fields: &[Field]) -> Result<()> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }

    let mut exif_buffer = Cursor::new(Vec::new());
    writer
        .write(&mut exif_buffer, false)
        .context("failed to reserialize EXIF data")?;

    let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(original))
        .context("failed to parse JPEG structure")?;
    jpeg.set_exif(Some(exif_buffer.into_inner().into()));

    fs::write(path, jpeg.encoder().bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{format_datestamp, format_datetime, DateField, ExifScrubber, StripOutcome};
    use crate::report::ErrorClass;
    use chrono::{Local, TimeZone};
    use exif::{Field, In, Tag, Value};
    use std::fs;
    use tempfile::tempdir;

    fn test_timestamp() -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap()
    }

    fn ascii_field(tag: Tag, value: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![value.as_bytes().to_vec()]),
        }
    }

    fn ascii_value(field: &Field) -> String {
        match &field.value {
            Value::Ascii(parts) => String::from_utf8(parts[0].clone()).expect("utf8"),
            other => panic!("expected ASCII value, got {:?}", other),
        }
    }

    #[test]
    fn datetime_components_are_not_zero_padded() {
        assert_eq!(format_datetime(test_timestamp()), "2023:4:5 6:7:8");
        assert_eq!(format_datestamp(test_timestamp()), "2023:4:5");
    }

    #[test]
    fn all_present_fields_are_overwritten() {
        let scrubber = ExifScrubber::new(test_timestamp());
        let mut fields = vec![
            ascii_field(Tag::DateTime, "2020:01:01 00:00:00"),
            ascii_field(Tag::DateTimeOriginal, "2020:01:01 00:00:00"),
            ascii_field(Tag::DateTimeDigitized, "2020:01:01 00:00:00"),
            ascii_field(Tag::GPSDateStamp, "2020:01:01"),
            ascii_field(Tag::Make, "ACME"),
        ];

        let failures = scrubber.scrub_fields(&mut fields);
        assert!(failures.is_empty());
        assert_eq!(ascii_value(&fields[0]), "2023:4:5 6:7:8");
        assert_eq!(ascii_value(&fields[1]), "2023:4:5 6:7:8");
        assert_eq!(ascii_value(&fields[2]), "2023:4:5 6:7:8");
        assert_eq!(ascii_value(&fields[3]), "2023:4:5");
        // untargeted fields ride along untouched
        assert_eq!(ascii_value(&fields[4]), "ACME");
    }

    #[test]
    fn missing_gps_datestamp_is_recorded_and_the_rest_still_update() {
        let scrubber = ExifScrubber::new(test_timestamp());
        let mut fields = vec![
            ascii_field(Tag::DateTime, "2020:01:01 00:00:00"),
            ascii_field(Tag::DateTimeOriginal, "2020:01:01 00:00:00"),
            ascii_field(Tag::DateTimeDigitized, "2020:01:01 00:00:00"),
        ];

        let failures = scrubber.scrub_fields(&mut fields);
        assert_eq!(
            failures,
            vec![(DateField::GpsDateStamp, ErrorClass::FieldMissing)]
        );
        assert_eq!(ascii_value(&fields[0]), "2023:4:5 6:7:8");
        assert_eq!(ascii_value(&fields[2]), "2023:4:5 6:7:8");
    }

    #[test]
    fn wrong_typed_field_is_left_unchanged_and_recorded() {
        let scrubber = ExifScrubber::new(test_timestamp());
        let mut fields = vec![
            Field {
                tag: Tag::DateTime,
                ifd_num: In::PRIMARY,
                value: Value::Short(vec![7]),
            },
            ascii_field(Tag::DateTimeOriginal, "2020:01:01 00:00:00"),
            ascii_field(Tag::DateTimeDigitized, "2020:01:01 00:00:00"),
            ascii_field(Tag::GPSDateStamp, "2020:01:01"),
        ];

        let failures = scrubber.scrub_fields(&mut fields);
        assert_eq!(failures, vec![(DateField::DateTime, ErrorClass::FieldType)]);
        assert!(matches!(fields[0].value, Value::Short(ref v) if *v == vec![7]));
        assert_eq!(ascii_value(&fields[1]), "2023:4:5 6:7:8");
    }

    #[test]
    fn failures_keep_attempt_order_so_the_last_one_wins_in_the_ledger() {
        let scrubber = ExifScrubber::new(test_timestamp());
        let mut fields = vec![Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: Value::Long(vec![1]),
        }];

        let failures = scrubber.scrub_fields(&mut fields);
        assert_eq!(failures.len(), 4);
        let outcome = StripOutcome::Rewritten { failures };
        // gps_datestamp fails last (missing), so that class is reported
        assert_eq!(outcome.ledger_entry(), Some(ErrorClass::FieldMissing));
    }

    #[test]
    fn unparseable_container_aborts_and_leaves_the_file_untouched() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.jpg");
        fs::write(&path, b"this is not a jpeg").expect("write fixture");

        let scrubber = ExifScrubber::new(test_timestamp());
        let outcome = scrubber.scrub_file(&path, false);

        assert_eq!(outcome, StripOutcome::Aborted(ErrorClass::ContainerParse));
        assert_eq!(outcome.ledger_entry(), Some(ErrorClass::ContainerParse));
        let after = fs::read(&path).expect("read back");
        assert_eq!(after, b"this is not a jpeg");
    }

    #[test]
    fn dry_run_opens_nothing() {
        let scrubber = ExifScrubber::new(test_timestamp());
        // the path does not exist; a dry run must not try to open it
        let outcome = scrubber.scrub_file(std::path::Path::new("missing.jpg"), true);
        assert_eq!(outcome, StripOutcome::Skipped);
        assert_eq!(outcome.ledger_entry(), None);
    }
}
