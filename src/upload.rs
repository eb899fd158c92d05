//! Storing uploaded photos in the image root.
//!
//! Uploads are sniffed with the `image` crate before anything touches the
//! disk, so the catalog never picks up a text file that happens to be
//! called `.jpg`. Names are `<unix millis>-<original name>`; if that
//! collides, a random suffix is added. Files are opened with
//! `create_new`, so an existing photo is never overwritten.

use crate::catalog::is_supported_image;
use crate::error::UploadError;
use image::ImageFormat;
use rand::Rng;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_NAME_ATTEMPTS: usize = 8;

/// Validate `bytes` and write them into `root`. Returns the stored path.
pub fn store_upload(root: &Path, original_name: &str, bytes: &[u8]) -> Result<PathBuf, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    let format = sniff_format(bytes)?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let base = generated_name(millis, original_name, format);

    let mut rng = rand::rng();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            base.clone()
        } else {
            with_suffix(&base, rng.random::<u32>())
        };
        let path = root.join(&name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                if let Err(err) = file.write_all(bytes).and_then(|()| file.sync_all()) {
                    // Don't leave a truncated photo in the catalog.
                    let _ = std::fs::remove_file(&path);
                    return Err(err.into());
                }
                tracing::info!(path = %path.display(), size = bytes.len(), "Stored upload");
                return Ok(path);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(name = %name, "Upload name taken, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(UploadError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {base}"),
    )))
}

/// Detect the image format from magic bytes. Only formats the catalog
/// recognizes are accepted.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, UploadError> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif)) => Ok(format),
        _ => Err(UploadError::NotAnImage),
    }
}

/// `<millis>-<sanitized name>`, with the format's extension appended if the
/// name would not otherwise be picked up by the catalog.
pub fn generated_name(millis: u128, original_name: &str, format: ImageFormat) -> String {
    let mut name = sanitize_file_name(original_name);
    if !is_supported_image(Path::new(&name)) {
        let ext = format.extensions_str().first().copied().unwrap_or("img");
        name = format!("{name}.{ext}");
    }
    format!("{millis}-{name}")
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(original_name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let last = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str, suffix: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{suffix:08x}.{ext}"),
        None => format!("{name}-{suffix:08x}"),
    }
}
