//! Backup job: preconditions, backup folders and a background worker.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use copit_core::{BackupConfig, ProgressMode, ProgressState, SyncError};

use crate::engine::{SyncEngine, SyncStats};
use crate::guard::RunGuard;
use crate::progress::{OverallProgress, count_entries};
use crate::validate::{validate, validate_backup_folder};
use crate::EVENT_CHANNEL_SIZE;

/// Progress of a running backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupProgress {
    /// Source folder being walked.
    pub source: PathBuf,
    /// Progress within the directory currently being walked.
    pub scope: ProgressState,
    /// Progress across every source, in [`ProgressMode::Overall`].
    pub overall: Option<ProgressState>,
}

/// Event sent through the channel of [`BackupJob::start`].
#[derive(Debug)]
pub enum BackupEvent {
    /// The worker picked up the job.
    Started { sources: usize },
    /// Progress update.
    Progress(BackupProgress),
    /// The job ended; no further events follow.
    Finished(Result<BackupReport, SyncError>),
}

/// Outcome of backing up one source folder.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: PathBuf,
    pub backup_folder: PathBuf,
    pub stats: SyncStats,
}

/// Outcome of a successful backup job.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub sources: Vec<SourceReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BackupReport {
    /// Statistics summed over every source.
    pub fn totals(&self) -> SyncStats {
        let mut totals = SyncStats::default();
        for report in &self.sources {
            totals.merge(&report.stats);
        }
        totals
    }
}

/// A backup of one or more source folders into a destination.
#[derive(Debug, Clone)]
pub struct BackupJob {
    config: BackupConfig,
    battery_level: Option<f32>,
    cancel: CancellationToken,
}

impl BackupJob {
    /// Create a job for `config` with an unknown battery level.
    pub fn new(config: BackupConfig) -> Self {
        Self {
            config,
            battery_level: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the battery level measured by the caller, in percent.
    pub fn with_battery_level(mut self, level: Option<f32>) -> Self {
        self.battery_level = level;
        self
    }

    /// Use `token` to cancel the job between two entries.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this job.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The job's configuration.
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn check_battery(&self) -> Result<(), SyncError> {
        match self.battery_level {
            Some(level) if level < self.config.minimum_battery_level => Err(SyncError::LowBattery {
                level,
                minimum: self.config.minimum_battery_level,
            }),
            _ => Ok(()),
        }
    }

    /// Run the job on the current thread.
    ///
    /// Holds `guard` for the whole run. Every source is validated against
    /// the destination before anything is created; sources are then copied
    /// one after another into their backup folders. The first error ends
    /// the job.
    pub fn run(
        &self,
        guard: &RunGuard,
        mut on_progress: impl FnMut(BackupProgress),
    ) -> Result<BackupReport, SyncError> {
        let _ticket = guard.try_acquire().ok_or(SyncError::AlreadyRunning)?;
        self.check_battery()?;

        let started_at = Utc::now();
        tracing::info!(
            sources = self.config.sources.len(),
            destination = %self.config.destination.display(),
            "backup started"
        );

        for source in &self.config.sources {
            validate(source, &self.config.destination)?;
            validate_backup_folder(source, &self.config.backup_folder_for(source))?;
        }

        let overall_total = match self.config.progress_mode {
            ProgressMode::Directory => None,
            ProgressMode::Overall => {
                let mut total = 0;
                for source in &self.config.sources {
                    total += count_entries(source)?;
                }
                Some(total)
            }
        };

        let engine = SyncEngine::with_cancel(self.cancel.clone());
        let mut done = 0;
        let mut reports = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let backup_folder = create_backup_folder(&self.config, source)?;

            let stats = match overall_total {
                Some(total) => {
                    let mut sink = OverallProgress::resume(done, total, |scope, overall| {
                        on_progress(BackupProgress {
                            source: source.clone(),
                            scope,
                            overall: Some(overall),
                        })
                    });
                    let stats = engine.copy_folder(source, &backup_folder, &mut sink)?;
                    done = sink.overall().processed;
                    stats
                }
                None => {
                    let mut sink = |processed: usize, total: usize| {
                        on_progress(BackupProgress {
                            source: source.clone(),
                            scope: ProgressState::new(processed, total),
                            overall: None,
                        })
                    };
                    engine.copy_folder(source, &backup_folder, &mut sink)?
                }
            };

            tracing::info!(
                source = %source.display(),
                copied = stats.files_copied,
                skipped = stats.files_skipped,
                "source backed up"
            );

            reports.push(SourceReport {
                source: source.clone(),
                backup_folder,
                stats,
            });
        }

        let report = BackupReport {
            sources: reports,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(bytes = report.totals().bytes_copied, "backup finished");

        Ok(report)
    }

    /// Run the job on a blocking worker of the current tokio runtime.
    ///
    /// Returns a receiver for progress updates and the final result.
    pub fn start(self, guard: RunGuard) -> mpsc::Receiver<BackupEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        tokio::task::spawn_blocking(move || {
            let _ = tx.blocking_send(BackupEvent::Started {
                sources: self.config.sources.len(),
            });

            let result = self.run(&guard, |progress| {
                let _ = tx.blocking_send(BackupEvent::Progress(progress));
            });

            if let Err(ref e) = result {
                tracing::warn!(error = %e, "backup failed");
            }
            let _ = tx.blocking_send(BackupEvent::Finished(result));
        });

        rx
    }
}

/// Create `dest/<backup folder name>/<source name>` if it is missing.
pub fn create_backup_folder(config: &BackupConfig, source: &Path) -> Result<PathBuf, SyncError> {
    let folder = config.backup_folder_for(source);
    if !folder.is_dir() {
        std::fs::create_dir_all(&folder).map_err(|e| SyncError::cant_create(&folder, e))?;
    }
    Ok(folder)
}
