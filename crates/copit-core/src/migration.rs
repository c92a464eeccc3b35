//! Versioned settings migrations.
//!
//! Each step is registered in [`MIGRATIONS`] under the version it upgrades
//! to. Upgrading from `from` to `to` runs, in ascending order, every step
//! whose version lies in `(from, to]`, then stamps `to` on the settings.

use crate::settings::Settings;
use crate::source::MediaSource;

/// Schema version written by this release.
pub const CURRENT_VERSION: u32 = 8;

/// A single upgrade step.
pub type MigrationStep = fn(&mut Settings);

/// Ordered table of migration steps, indexed by target version.
pub const MIGRATIONS: &[(u32, MigrationStep)] = &[(7, reset_to_defaults), (8, prune_source_flags)];

/// Run every step in `(from, to]` and stamp `to`.
///
/// Returns the versions of the steps that ran.
pub fn migrate(settings: &mut Settings, from: u32, to: u32) -> Vec<u32> {
    let mut applied = Vec::new();

    if from < to {
        for &(version, step) in MIGRATIONS {
            if version > from && version <= to {
                tracing::debug!(version, "applying settings migration");
                step(settings);
                applied.push(version);
            }
        }
    }

    settings.version = settings.version.max(to);
    applied
}

/// Version 7: start from a clean slate with default source flags and
/// backup folder name.
fn reset_to_defaults(settings: &mut Settings) {
    *settings = Settings {
        version: settings.version,
        ..Settings::default()
    };
}

/// Version 8: drop flags for sources that no longer exist and add
/// defaults for sources introduced since the file was written.
fn prune_source_flags(settings: &mut Settings) {
    settings
        .sources
        .retain(|key, _| MediaSource::from_key(key).is_some());

    for source in MediaSource::all() {
        settings
            .sources
            .entry(source.key())
            .or_insert_with(|| source.checked_by_default());
    }
}
