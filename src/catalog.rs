//! Image catalog: walk the image root and collect every photo path.
//!
//! The catalog is rebuilt on every request. Nothing is cached, so files
//! added or removed between requests show up (or disappear) immediately.
//!
//! ## Rust concepts
//! - `walkdir::WalkDir` for recursive directory traversal
//! - `filter_entry` to prune whole subtrees
//! - Matching on `Result` to treat root errors and child errors differently

use crate::error::CatalogError;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File extensions (lowercase) that count as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Returns `true` if `path` has one of the [`IMAGE_EXTENSIONS`], ignoring case.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Recursively scan `root` for image files.
///
/// Returned paths are `root` joined with the relative path of each file, so
/// they are absolute whenever `root` is. The list is sorted to keep output
/// stable; callers must not rely on any particular order.
///
/// An unreadable root is an error. An unreadable entry further down (a
/// directory without permissions, a dangling symlink, a link loop) is
/// logged and skipped so one bad file can't hide the rest of the library.
///
/// Symlinks are followed only while they stay inside `root`. Paths that
/// are not UTF-8 are skipped: they travel to the browser as JSON strings
/// and must come back byte-for-byte to count as seen.
pub fn scan_images(root: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let mut images = Vec::new();
    // A missing root fails below as UnreadableRoot.
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let mut walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(CatalogError::UnreadableRoot {
                    path: root.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                tracing::warn!(
                    path = ?err.path(),
                    error = %err,
                    "Skipping unreadable catalog entry"
                );
                continue;
            }
        };

        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(CatalogError::NotADirectory(root.to_path_buf()));
            }
            continue;
        }

        let skip = if entry.path().to_str().is_none() {
            tracing::warn!(path = ?entry.path(), "Skipping non-UTF-8 path");
            true
        } else if entry.path_is_symlink() && !link_stays_inside(entry.path(), &canonical_root) {
            tracing::warn!(path = %entry.path().display(), "Skipping symlink that leaves the image directory");
            true
        } else {
            false
        };
        if skip {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            images.push(entry.into_path());
        }
    }

    images.sort();
    tracing::debug!(root = %root.display(), count = images.len(), "Catalog scanned");
    Ok(images)
}

fn link_stays_inside(path: &Path, canonical_root: &Path) -> bool {
    path.canonicalize()
        .is_ok_and(|target| target.starts_with(canonical_root))
}

// Dot-entries below the root are editor/sync scratch, including our own
// in-progress metadata writes. The root itself may be a dot-dir.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"fake").unwrap();
        path
    }

    #[rstest]
    #[case("photo.jpg", true)]
    #[case("photo.JPG", true)]
    #[case("photo.jpeg", true)]
    #[case("photo.Jpeg", true)]
    #[case("photo.png", true)]
    #[case("anim.GIF", true)]
    #[case("raw.bmp", false)]
    #[case("notes.txt", false)]
    #[case("jpg", false)]
    #[case("archive.jpg.zip", false)]
    fn test_is_supported_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_supported_image(Path::new(name)), expected);
    }

    #[test]
    fn scan_finds_supported_formats_only() {
        let tmp = TempDir::new().unwrap();

        create_file(tmp.path(), "photo.png");
        create_file(tmp.path(), "pic.JPG");
        create_file(tmp.path(), "shot.jpeg");
        create_file(tmp.path(), "anim.gif");
        create_file(tmp.path(), "raw.bmp");
        create_file(tmp.path(), "readme.txt");

        let images = scan_images(tmp.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["anim.gif", "photo.png", "pic.JPG", "shot.jpeg"]);
    }

    #[test]
    fn scan_recurses_into_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("2023").join("summer");
        std::fs::create_dir_all(&nested).unwrap();

        let top = create_file(tmp.path(), "top.jpg");
        let deep = create_file(&nested, "beach.png");

        let images = scan_images(tmp.path()).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.contains(&top));
        assert!(images.contains(&deep));
    }

    #[test]
    fn scan_returns_absolute_paths_under_root() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "a.jpg");

        let images = scan_images(tmp.path()).unwrap();
        assert!(images.iter().all(|p| p.is_absolute()));
        assert!(images.iter().all(|p| p.starts_with(tmp.path())));
    }

    #[test]
    fn scan_skips_hidden_entries() {
        let tmp = TempDir::new().unwrap();
        let hidden = tmp.path().join(".thumbs");
        std::fs::create_dir(&hidden).unwrap();
        create_file(&hidden, "cached.jpg");
        create_file(tmp.path(), ".gallery-edit-a1b2.jpg");
        create_file(tmp.path(), "visible.jpg");

        let images = scan_images(tmp.path()).unwrap();
        assert_eq!(images, vec![tmp.path().join("visible.jpg")]);
    }

    #[test]
    fn scan_empty_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_images(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn scan_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = scan_images(&missing).unwrap_err();
        assert!(matches!(err, CatalogError::UnreadableRoot { .. }));
    }

    #[test]
    fn scan_file_as_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let file = create_file(tmp.path(), "a.jpg");
        let err = scan_images(&file).unwrap_err();
        assert!(matches!(err, CatalogError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "real.jpg");
        std::os::unix::fs::symlink(tmp.path().join("gone.jpg"), tmp.path().join("link.jpg"))
            .unwrap();

        let images = scan_images(tmp.path()).unwrap();
        assert_eq!(images, vec![tmp.path().join("real.jpg")]);
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_symlinks_leaving_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("images");
        let outside = tmp.path().join("outside");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&outside).unwrap();
        create_file(&outside, "secret.jpg");
        let kept = create_file(&root, "kept.jpg");
        std::os::unix::fs::symlink(&outside, root.join("linked")).unwrap();
        std::os::unix::fs::symlink(outside.join("secret.jpg"), root.join("alias.jpg")).unwrap();

        let images = scan_images(&root).unwrap();
        assert_eq!(images, vec![kept]);
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_symlinks_inside_root() {
        let tmp = TempDir::new().unwrap();
        let albums = tmp.path().join("albums");
        std::fs::create_dir(&albums).unwrap();
        create_file(&albums, "trip.jpg");
        std::os::unix::fs::symlink(&albums, tmp.path().join("favorites")).unwrap();

        let images = scan_images(tmp.path()).unwrap();
        assert_eq!(
            images,
            vec![albums.join("trip.jpg"), tmp.path().join("favorites").join("trip.jpg")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(OsStr::from_bytes(b"\xff.jpg")), b"fake").unwrap();
        let bad_dir = tmp.path().join(OsStr::from_bytes(b"\xfe"));
        std::fs::create_dir(&bad_dir).unwrap();
        create_file(&bad_dir, "inner.jpg");
        let good = create_file(tmp.path(), "good.jpg");

        let images = scan_images(tmp.path()).unwrap();
        assert_eq!(images, vec![good]);
    }
}
