//! Best-effort probes of the host device.

use std::path::{Path, PathBuf};

use crate::source::MediaSource;

/// Mount points where removable storage usually shows up.
const REMOVABLE_MOUNTS: &[&str] = &["/storage/usbdisk", "/storage/usbdrive", "/media", "/mnt/usb"];

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Current battery charge in percent, if the platform exposes one.
pub fn battery_level() -> Option<f32> {
    battery_level_in(Path::new(POWER_SUPPLY_DIR))
}

/// Read the first `BAT*` capacity under a sysfs power-supply directory.
pub fn battery_level_in(power_supply_dir: &Path) -> Option<f32> {
    let mut batteries: Vec<PathBuf> = std::fs::read_dir(power_supply_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("BAT"))
        })
        .collect();
    batteries.sort();

    batteries.iter().find_map(|bat| {
        let raw = std::fs::read_to_string(bat.join("capacity")).ok()?;
        let level: f32 = raw.trim().parse().ok()?;
        Some(level.clamp(0.0, 100.0))
    })
}

/// Guess a source folder: the camera roll under `storage_root`, if present.
pub fn guess_source_folder(storage_root: &Path) -> Option<PathBuf> {
    MediaSource::Camera.active_paths(storage_root).into_iter().next()
}

/// Guess a destination folder among the usual removable-storage mounts.
pub fn guess_dest_folder() -> Option<PathBuf> {
    guess_dest_folder_in(REMOVABLE_MOUNTS.iter().map(PathBuf::from))
}

/// First existing directory among `candidates`.
pub fn guess_dest_folder_in(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.is_dir())
}

/// Default storage root: the user's home directory.
pub fn default_storage_root() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
