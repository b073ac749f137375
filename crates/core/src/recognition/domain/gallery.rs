//! Reference gallery: one subdirectory per identity, holding that
//! person's reference images.
//!
//! ```text
//! faces/
//!   ada/      front.jpg  side.png
//!   grace/    id.jpg
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::IMAGE_EXTENSIONS;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery path {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read gallery directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GalleryEntry {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct Gallery {
    root: PathBuf,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// Scans `root` for identity subdirectories. Entries are sorted by
    /// label and then path. Non-image files are skipped.
    pub fn load(root: &Path) -> Result<Self, GalleryError> {
        if !root.is_dir() {
            return Err(GalleryError::NotADirectory(root.to_path_buf()));
        }

        let mut entries = Vec::new();
        for dir in read_dir_sorted(root)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(label) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for path in read_dir_sorted(&dir)? {
                if path.is_file() && is_image(&path) {
                    entries.push(GalleryEntry {
                        label: label.to_string(),
                        path,
                    });
                }
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }

    /// Like `load`, but a missing directory yields an empty gallery (every
    /// face then resolves to "Unknown").
    pub fn load_or_empty(root: &Path) -> Result<Self, GalleryError> {
        if !root.exists() {
            log::warn!(
                "Gallery directory {} not found; create one subfolder per person \
                 holding their images. All faces will be Unknown.",
                root.display()
            );
            return Ok(Self {
                root: root.to_path_buf(),
                entries: Vec::new(),
            });
        }
        Self::load(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.entries.iter().map(|e| e.label.as_str()).collect();
        labels.dedup();
        labels
    }

    /// Identity label for a reference image path: the name of the
    /// directory directly under the gallery root that contains it.
    pub fn label_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let first = components.next()?;
        // A file directly in the root has no identity folder.
        components.next()?;
        first.as_os_str().to_str().map(str::to_string)
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let read_err = |source| GalleryError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
