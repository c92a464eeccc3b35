//! Media classification and counting.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif", "dng", "raw",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "3gp", "mkv", "webm", "mov", "avi", "m4v"];

/// Kind of media a file holds, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Other;
        };
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::Other
        }
    }
}

/// Number of media files found under a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCount {
    pub images: usize,
    pub videos: usize,
    pub other: usize,
}

impl MediaCount {
    /// Record one file of the given kind.
    pub fn record(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Image => self.images += 1,
            MediaKind::Video => self.videos += 1,
            MediaKind::Other => self.other += 1,
        }
    }

    /// Images plus videos.
    pub fn media(&self) -> usize {
        self.images + self.videos
    }

    /// Every regular file seen.
    pub fn files(&self) -> usize {
        self.media() + self.other
    }
}

/// Count images and videos under `root`, recursively.
///
/// Hidden files are included and symlinks are not followed. Entries that
/// cannot be read are logged and skipped.
pub fn count_media(root: &Path) -> std::io::Result<MediaCount> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", root.display()),
        ));
    }

    let mut count = MediaCount::default();

    for entry in WalkDir::new(root).skip_hidden(false).min_depth(1) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                count.record(MediaKind::from_path(&entry.path()));
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry while counting media");
            }
        }
    }

    Ok(count)
}

/// Media files directly inside `dir`, most recently modified first.
///
/// Files whose timestamp cannot be read sort last.
pub fn recent_media(dir: &Path, limit: usize) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<(PathBuf, Option<SystemTime>)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if MediaKind::from_path(&path) == MediaKind::Other {
            continue;
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push((path, metadata.modified().ok()));
        }
    }

    files.sort_by_key(|(_, modified)| Reverse(*modified));
    files.truncate(limit);

    Ok(files.into_iter().map(|(path, _)| path).collect())
}
