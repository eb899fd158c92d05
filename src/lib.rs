//! Random photo gallery: pick a photo the viewer hasn't seen, show its
//! embedded title and date, let them edit the title or upload more photos.
//!
//! - [`catalog`] walks the image root
//! - [`selection`] picks an unseen photo or signals that all were seen
//! - [`metadata`] reads and writes EXIF title/date
//! - [`upload`] stores new photos
//! - [`server`] exposes all of it over HTTP
//!
//! The binary in `main.rs` wires these together with [`config`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod metadata;
pub mod selection;
pub mod server;
pub mod upload;

pub use error::{ApiError, CatalogError, ConfigError, MetadataError, UploadError};
pub use metadata::ImageMetadata;
pub use selection::{SeenSet, Selection};
