//! Well-known photo folders on a device.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Prefix of the settings key that stores whether a source is selected.
pub const SOURCE_KEY_PREFIX: &str = "source_";

/// A photo folder the user can pick as a backup source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Camera roll.
    Camera,
    /// Screen captures.
    Screenshots,
    /// Images received through WhatsApp.
    Whatsapp,
    /// Images received through Messenger.
    Messenger,
}

impl MediaSource {
    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Screenshots => "Screenshots",
            Self::Whatsapp => "WhatsApp images",
            Self::Messenger => "Messenger images",
        }
    }

    /// Locations relative to the storage root where this source may live.
    fn relative_paths(&self) -> &'static [&'static str] {
        match self {
            Self::Camera => &["DCIM/Camera"],
            Self::Screenshots => &["Pictures/Screenshots", "DCIM/Screenshots"],
            Self::Whatsapp => &["WhatsApp/Media/WhatsApp Images"],
            Self::Messenger => &["Pictures/Messenger"],
        }
    }

    /// Whether the source is selected on a fresh install.
    pub fn checked_by_default(&self) -> bool {
        matches!(self, Self::Camera)
    }

    /// Settings key for this source, e.g. `source_camera`.
    pub fn key(&self) -> String {
        format!("{SOURCE_KEY_PREFIX}{self}")
    }

    /// Parse a settings key back into a source.
    ///
    /// Returns `None` for keys without the prefix or naming an unknown source.
    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix(SOURCE_KEY_PREFIX)?.parse().ok()
    }

    /// Every candidate location under `storage_root`.
    pub fn possible_paths(&self, storage_root: &Path) -> Vec<PathBuf> {
        self.relative_paths()
            .iter()
            .map(|rel| storage_root.join(rel))
            .collect()
    }

    /// Candidate locations that currently exist as directories.
    pub fn active_paths(&self, storage_root: &Path) -> Vec<PathBuf> {
        self.possible_paths(storage_root)
            .into_iter()
            .filter(|p| p.is_dir())
            .collect()
    }

    /// Check whether at least one location exists.
    pub fn exists(&self, storage_root: &Path) -> bool {
        !self.active_paths(storage_root).is_empty()
    }

    /// All known sources.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}
