//! Embedded image metadata: read a title and date, write a new title.
//!
//! Reading uses `kamadak-exif` and never fails: a file without EXIF, or
//! with EXIF we can't parse, gets fallback metadata built from the file
//! system. Writing uses `little_exif` on a temporary copy that is then
//! renamed over the original, so a failed write leaves the photo
//! untouched and a successful one leaves nothing else behind.
//!
//! ## Rust concepts
//! - `Option` chaining with `?` inside helpers that return `Option`
//! - `match` on `exif::Value` variants
//! - `tempfile::NamedTempFile::persist` for atomic replace

use crate::error::MetadataError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use serde::Serialize;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::time::SystemTime;

/// Shown when neither EXIF nor the file system can date a photo.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Same shape as a browser's `toLocaleString()` in en-US: `1/2/2024, 3:04:05 AM`.
const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Extensions whose written titles read back through `exif`.
///
/// `little_exif` stores PNG EXIF where `read_from_container` does not look,
/// so a PNG title would be written and then never shown.
const WRITABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Title and human-readable date of one photo.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ImageMetadata {
    /// Image description, or empty
    pub title: String,
    /// Capture date, file creation date, or "Unknown date"
    pub date: String,
}

// ── Reading ──────────────────────────────────────────────────────────

/// Read the title and date embedded in `path`.
///
/// Date: DateTimeOriginal, then DateTimeDigitized (exiftool's CreateDate),
/// then the file's creation time. Title: ImageDescription, then UserComment.
pub fn read_metadata(path: &Path) -> ImageMetadata {
    let exif = match read_exif(path) {
        Ok(exif) => exif,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "No usable EXIF, using fallback");
            return fallback_metadata(path);
        }
    };

    let date = [Tag::DateTimeOriginal, Tag::DateTimeDigitized]
        .into_iter()
        .find_map(|tag| {
            exif.get_field(tag, In::PRIMARY)
                .and_then(|field| date_from_value(&field.value))
        })
        .unwrap_or_else(|| fallback_date(path));

    let title = exif
        .get_field(Tag::ImageDescription, In::PRIMARY)
        .and_then(|field| ascii_text(&field.value))
        .or_else(|| {
            exif.get_field(Tag::UserComment, In::PRIMARY)
                .and_then(|field| user_comment_text(&field.value, exif.little_endian()))
        })
        .unwrap_or_default();

    ImageMetadata { title, date }
}

fn read_exif(path: &Path) -> Result<Exif, exif::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    exif::Reader::new().read_from_container(&mut reader)
}

/// Metadata for a file without readable EXIF.
pub fn fallback_metadata(path: &Path) -> ImageMetadata {
    ImageMetadata {
        title: String::new(),
        date: fallback_date(path),
    }
}

/// File creation time, formatted, or [`UNKNOWN_DATE`].
pub fn fallback_date(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|m| m.created())
        .map(format_system_time)
        .unwrap_or_else(|_| UNKNOWN_DATE.to_string())
}

fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(DISPLAY_FORMAT).to_string()
}

/// Interpret an EXIF date field.
///
/// ASCII values are EXIF wall-clock timestamps and are shown as-is.
/// Numeric values are Unix-epoch seconds and are shown in local time.
fn date_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let dt = exif::DateTime::from_ascii(raw).ok()?;
            let naive = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
                .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?;
            Some(format_naive(naive))
        }
        Value::Long(v) => epoch_to_string(i64::from(*v.first()?)),
        Value::SLong(v) => epoch_to_string(i64::from(*v.first()?)),
        Value::Short(v) => epoch_to_string(i64::from(*v.first()?)),
        _ => None,
    }
}

fn format_naive(naive: NaiveDateTime) -> String {
    naive.format(DISPLAY_FORMAT).to_string()
}

fn epoch_to_string(secs: i64) -> Option<String> {
    // 0 is what cameras write when the clock was never set.
    if secs <= 0 {
        return None;
    }
    let utc = DateTime::from_timestamp(secs, 0)?;
    Some(utc.with_timezone(&Local).format(DISPLAY_FORMAT).to_string())
}

fn ascii_text(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => {
            let joined = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p))
                .collect::<Vec<_>>()
                .join(" ");
            non_empty(&joined)
        }
        _ => None,
    }
}

/// UserComment starts with an 8-byte character code, then the text.
fn user_comment_text(value: &Value, little_endian: bool) -> Option<String> {
    let bytes = match value {
        Value::Undefined(bytes, _) => bytes.as_slice(),
        other => return ascii_text(other),
    };

    if bytes.len() < 8 {
        return non_empty(&String::from_utf8_lossy(bytes));
    }
    let (code, text) = bytes.split_at(8);

    if code.starts_with(b"UNICODE") {
        let units: Vec<u16> = text
            .chunks_exact(2)
            .map(|pair| {
                let pair = [pair[0], pair[1]];
                if little_endian {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                }
            })
            .collect();
        non_empty(&String::from_utf16_lossy(&units))
    } else {
        non_empty(&String::from_utf8_lossy(text))
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ── Writing ──────────────────────────────────────────────────────────

/// Store `title` as the ImageDescription of `path`, replacing the file.
///
/// Other tags already in the file are preserved. The edit happens on a
/// hidden temporary copy in the same directory which is renamed over the
/// original once the write succeeded; on failure the copy is removed.
pub fn write_title(path: &Path, title: &str) -> Result<(), MetadataError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| WRITABLE_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| MetadataError::UnsupportedFormat(path.to_path_buf()))?;

    let io_err = |source: std::io::Error| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    // little_exif picks the container format from the extension.
    let suffix = format!(".{ext}");
    let tmp = tempfile::Builder::new()
        .prefix(".gallery-edit-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(io_err)?;
    fs::copy(path, tmp.path()).map_err(io_err)?;

    let mut metadata = Metadata::new_from_path(tmp.path()).unwrap_or_else(|err| {
        tracing::debug!(path = %path.display(), error = %err, "Starting from empty EXIF");
        Metadata::new()
    });
    metadata.set_tag(ExifTag::ImageDescription(title.to_string()));
    metadata
        .write_to_file(tmp.path())
        .map_err(|source| MetadataError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::info!(path = %path.display(), title, "Title updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_jpeg(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 8, Rgb([200, 120, 40]))
            .save(&path)
            .unwrap();
        path
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // ── Value decoding ─────────────────────────────────────────────

    #[rstest]
    #[case(b"2024:01:02 03:04:05", "1/2/2024, 3:04:05 AM")]
    #[case(b"1999:12:31 23:59:59", "12/31/1999, 11:59:59 PM")]
    #[case(b"2020:07:15 12:00:00", "7/15/2020, 12:00:00 PM")]
    fn ascii_dates_are_formatted(#[case] raw: &[u8], #[case] expected: &str) {
        let value = Value::Ascii(vec![raw.to_vec()]);
        assert_eq!(date_from_value(&value).as_deref(), Some(expected));
    }

    #[rstest]
    #[case(b"0000:00:00 00:00:00")]
    #[case(b"    :  :     :  :  ")]
    #[case(b"garbage")]
    fn invalid_ascii_dates_are_ignored(#[case] raw: &[u8]) {
        let value = Value::Ascii(vec![raw.to_vec()]);
        assert_eq!(date_from_value(&value), None);
    }

    #[test]
    fn numeric_dates_are_epoch_seconds() {
        let secs: u32 = 1_700_000_000;
        let expected = DateTime::from_timestamp(i64::from(secs), 0)
            .unwrap()
            .with_timezone(&Local)
            .format(DISPLAY_FORMAT)
            .to_string();

        assert_eq!(date_from_value(&Value::Long(vec![secs])), Some(expected));
    }

    #[test]
    fn zero_epoch_is_ignored() {
        assert_eq!(date_from_value(&Value::Long(vec![0])), None);
    }

    #[test]
    fn ascii_title_is_trimmed() {
        let value = Value::Ascii(vec![b"  Sunset over the bay \0".to_vec()]);
        assert_eq!(ascii_text(&value).as_deref(), Some("Sunset over the bay"));
    }

    #[test]
    fn blank_title_is_none() {
        let value = Value::Ascii(vec![b"   ".to_vec()]);
        assert_eq!(ascii_text(&value), None);
    }

    #[rstest]
    #[case(b"ASCII\0\0\0Grandma's garden".to_vec(), false)]
    #[case(b"\0\0\0\0\0\0\0\0Grandma's garden".to_vec(), true)]
    fn user_comment_strips_charset_prefix(#[case] bytes: Vec<u8>, #[case] little_endian: bool) {
        let value = Value::Undefined(bytes, 0);
        assert_eq!(
            user_comment_text(&value, little_endian).as_deref(),
            Some("Grandma's garden")
        );
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn user_comment_decodes_unicode(#[case] little_endian: bool) {
        let mut bytes = b"UNICODE\0".to_vec();
        for unit in "Café".encode_utf16() {
            let pair = if little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            };
            bytes.extend_from_slice(&pair);
        }
        let value = Value::Undefined(bytes, 0);
        assert_eq!(
            user_comment_text(&value, little_endian).as_deref(),
            Some("Café")
        );
    }

    // ── Files ──────────────────────────────────────────────────────

    #[test]
    fn file_without_exif_gets_fallback() {
        let tmp = TempDir::new().unwrap();
        let path = create_jpeg(tmp.path(), "plain.jpg");

        let meta = read_metadata(&path);
        assert_eq!(meta.title, "");
        assert_eq!(meta.date, fallback_date(&path));
        assert!(!meta.date.is_empty());
    }

    #[test]
    fn non_image_gets_fallback() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        assert_eq!(read_metadata(&path), fallback_metadata(&path));
    }

    #[test]
    fn missing_file_is_unknown_date() {
        let tmp = TempDir::new().unwrap();
        let meta = read_metadata(&tmp.path().join("gone.jpg"));
        assert_eq!(meta, ImageMetadata {
            title: String::new(),
            date: UNKNOWN_DATE.to_string(),
        });
    }

    #[rstest]
    #[case("family.jpg")]
    #[case("family.JPEG")]
    fn write_then_read_returns_new_title(#[case] name: &str) {
        let tmp = TempDir::new().unwrap();
        let path = create_jpeg(tmp.path(), name);

        write_title(&path, "Family picnic").unwrap();
        assert_eq!(read_metadata(&path).title, "Family picnic");

        write_title(&path, "Family picnic, 2019").unwrap();
        assert_eq!(read_metadata(&path).title, "Family picnic, 2019");
    }

    #[test]
    fn write_leaves_no_artifacts() {
        let tmp = TempDir::new().unwrap();
        let path = create_jpeg(tmp.path(), "lake.jpg");

        write_title(&path, "Lake").unwrap();
        assert_eq!(dir_entries(tmp.path()), vec!["lake.jpg"]);
    }

    #[test]
    fn write_keeps_capture_date() {
        let tmp = TempDir::new().unwrap();
        let path = create_jpeg(tmp.path(), "dated.jpg");

        let mut metadata = Metadata::new();
        metadata.set_tag(ExifTag::DateTimeOriginal("2021:06:05 14:30:00".to_string()));
        metadata.write_to_file(&path).unwrap();

        write_title(&path, "Graduation").unwrap();

        let meta = read_metadata(&path);
        assert_eq!(meta.title, "Graduation");
        assert_eq!(meta.date, "6/5/2021, 2:30:00 PM");
    }

    #[rstest]
    #[case("anim.gif")]
    #[case("scan.png")]
    fn write_to_unreadable_title_format_is_unsupported(#[case] name: &str) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(name);
        // GIF's encoder wants an alpha channel.
        image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();
        let before = fs::read(&path).unwrap();

        let err = write_title(&path, "nope").unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedFormat(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(read_metadata(&path).title, "");
        assert_eq!(dir_entries(tmp.path()), vec![name.to_string()]);
    }

    #[test]
    fn failed_write_leaves_original_and_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corrupt.jpg");
        fs::write(&path, b"not a jpeg at all").unwrap();

        assert!(write_title(&path, "title").is_err());
        assert_eq!(fs::read(&path).unwrap(), b"not a jpeg at all");
        assert_eq!(dir_entries(tmp.path()), vec!["corrupt.jpg"]);
    }

    #[test]
    fn write_to_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = write_title(&tmp.path().join("gone.jpg"), "x").unwrap_err();
        assert!(matches!(err, MetadataError::Io { .. }));
    }
}
