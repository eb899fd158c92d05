//! Server configuration: command-line flags plus an optional JSON file.
//!
//! The JSON file uses the `{ "imageFolder": "...", "port": 3000 }` shape.
//! Flags given on the command line win over the file.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Photo gallery HTTP server
#[derive(Parser, Debug)]
#[command(name = "photo-gallery-rs")]
#[command(about = "Serve a random unseen photo and edit its EXIF title")]
#[command(version)]
pub struct Args {
    /// Root directory containing the photo library (searched recursively)
    #[arg(long)]
    pub images_dir: Option<PathBuf>,

    /// JSON config file with `imageFolder` and optional `port`
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on [default: 3000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory with the static web pages
    #[arg(long, default_value = "public")]
    pub public_dir: PathBuf,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,
}

/// Contents of the optional JSON config file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub image_folder: Option<PathBuf>,
    pub port: Option<u16>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    /// Canonical image root
    pub images_dir: PathBuf,
    pub port: u16,
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl GalleryConfig {
    /// Merge flags and config file. The image root must exist; it is
    /// canonicalized so containment checks compare real paths.
    pub fn resolve(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        // Relative imageFolder is relative to the config file, like the
        // server would have resolved it from its own directory.
        let file_images_dir = file.image_folder.map(|dir| match &args.config {
            Some(config_path) if dir.is_relative() => config_path
                .parent()
                .map(|base| base.join(&dir))
                .unwrap_or(dir),
            _ => dir,
        });

        let images_dir = args
            .images_dir
            .or(file_images_dir)
            .ok_or(ConfigError::MissingImagesDir)?;
        let images_dir = images_dir
            .canonicalize()
            .map_err(|source| ConfigError::ImagesDir {
                path: images_dir.clone(),
                source,
            })?;
        if !images_dir.is_dir() {
            return Err(ConfigError::ImagesDir {
                path: images_dir,
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        Ok(Self {
            images_dir,
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            public_dir: args.public_dir,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}
