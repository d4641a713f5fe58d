//! Media file discovery for shuffled playback.

use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video containers the player handles out of the box
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["avi", "mkv", "mp4", "flv"];

/// Finds files by extension under a directory tree
#[derive(Debug, Clone, Default)]
pub struct MediaScanner {
    /// Lowercase, dot-prefixed. `None` accepts every file.
    extensions: Option<Vec<String>>,
}

/// Lowercase an extension and make sure it starts with a dot
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

impl MediaScanner {
    pub fn new<S: AsRef<str>>(extensions: Option<&[S]>) -> Self {
        Self {
            extensions: extensions.map(|list| {
                list.iter()
                    .map(|ext| normalize_extension(ext.as_ref()))
                    .collect()
            }),
        }
    }

    pub fn videos() -> Self {
        Self::new(Some(DEFAULT_VIDEO_EXTENSIONS))
    }

    pub fn extensions(&self) -> Option<&[String]> {
        self.extensions.as_deref()
    }

    /// Whether a file name carries one of the accepted extensions
    pub fn accepts(&self, file_name: &str) -> bool {
        match &self.extensions {
            None => true,
            Some(extensions) => {
                let lower = file_name.to_lowercase();
                extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
            }
        }
    }

    /// Recursively collect matching files. Unreadable entries are skipped.
    pub fn scan(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let root = root.as_ref();
        log::debug!("Scanning {} for {:?}", root.display(), self.extensions);

        let files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.accepts(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.into_path())
            .collect();

        log::debug!("Found {} file(s) under {}", files.len(), root.display());
        files
    }

    /// Scan and return the matches in random order
    pub fn scan_shuffled(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let mut files = self.scan(root);
        shuffle(&mut files);
        files
    }
}

/// Uniformly random permutation, in place
pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}
