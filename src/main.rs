//! copit - Back up photo and video folders to removable storage.
//!
//! Usage:
//!   copit backup             Back up the selected sources
//!   copit check -s SRC -d DEST
//!                            Check whether a folder pair can be backed up
//!   copit count [PATH]       Count images and videos
//!   copit sources            List well-known photo folders
//!   copit config show        Show persisted settings
//!   copit --help             Show help

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Report, Result, bail, eyre};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use copit_core::media::recent_media;
use copit_core::{
    BackupConfig, MediaCount, MediaSource, ProgressMode, Settings, SyncError, count_media, device,
};
use copit_sync::{BackupEvent, BackupJob, BackupReport, RunGuard, validate};

#[derive(Parser)]
#[command(
    name = "copit",
    version,
    about = "Back up photo and video folders to removable storage",
    long_about = "copit copies your photo folders into a backup folder on removable \
                  storage. Files already backed up with the same size and modification \
                  time are skipped, so repeated backups only copy what changed."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Back up source folders into the destination
    Backup {
        /// Source folder (repeatable; defaults to the selected sources)
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Destination folder (defaults to the saved destination)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Report progress across the whole backup instead of per folder
        #[arg(long)]
        overall: bool,

        /// Battery level in percent (defaults to the detected level)
        #[arg(long)]
        battery: Option<f32>,

        /// Output format for the final report
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check whether a source can be backed up into a destination
    Check {
        /// Source folder
        #[arg(short, long)]
        source: PathBuf,

        /// Destination folder
        #[arg(short, long)]
        dest: PathBuf,
    },

    /// Count images and videos under a folder
    Count {
        /// Folder to count
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Also list this many of the newest media files directly in the folder
        #[arg(long, default_value_t = 0)]
        recent: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List well-known photo folders and whether they are selected
    Sources,

    /// Inspect or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the settings file
    Show,

    /// Change settings
    Set {
        /// Destination folder
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Root folder that well-known sources are looked up in
        #[arg(long)]
        storage_root: Option<PathBuf>,

        /// Folder created under the destination for backups
        #[arg(long)]
        backup_folder_name: Option<String>,

        /// Minimum battery level in percent
        #[arg(long)]
        min_battery: Option<f32>,

        /// Progress reporting mode
        #[arg(long)]
        progress: Option<ProgressArg>,

        /// Select a well-known source (camera, screenshots, whatsapp, messenger)
        #[arg(long)]
        enable: Vec<MediaSource>,

        /// Deselect a well-known source
        #[arg(long)]
        disable: Vec<MediaSource>,

        /// Add a folder to back up alongside the selected sources
        #[arg(long)]
        add_folder: Vec<PathBuf>,

        /// Stop backing up a previously added folder
        #[arg(long)]
        remove_folder: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProgressArg {
    Directory,
    Overall,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Directory => ProgressMode::Directory,
            ProgressArg::Overall => ProgressMode::Overall,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings_path = match cli.config {
        Some(path) => path,
        None => Settings::config_path().ok_or_else(|| eyre!("No config directory available"))?,
    };

    match cli.command {
        Command::Backup {
            sources,
            dest,
            overall,
            battery,
            format,
        } => {
            run_backup(&settings_path, sources, dest, overall, battery, format).await?;
        }
        Command::Check { source, dest } => {
            run_check(&source, &dest)?;
        }
        Command::Count {
            path,
            recent,
            format,
        } => {
            run_count(&path, recent, format)?;
        }
        Command::Sources => {
            run_sources(&settings_path)?;
        }
        Command::Config { action } => {
            run_config(&settings_path, action)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load settings, writing upgraded files back.
fn load_settings(path: &Path) -> Result<Settings> {
    let existed = path.exists();
    let settings = Settings::load_from(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    debug!(path = %path.display(), version = settings.version, "Loaded settings");
    if existed {
        settings
            .save_to(path)
            .with_context(|| format!("Failed to save settings to {}", path.display()))?;
    }
    Ok(settings)
}

/// Run a backup and stream its progress to stderr.
async fn run_backup(
    settings_path: &Path,
    sources: Vec<PathBuf>,
    dest: Option<PathBuf>,
    overall: bool,
    battery: Option<f32>,
    format: OutputFormat,
) -> Result<()> {
    let mut settings = load_settings(settings_path)?;

    let sources = if sources.is_empty() {
        let folders = settings.source_folders();
        if folders.is_empty() {
            device::guess_source_folder(&settings.storage_root())
                .into_iter()
                .collect()
        } else {
            folders
        }
    } else {
        sources
    };
    if sources.is_empty() {
        bail!("No source folders: pass --source or select one with `copit config set --enable`");
    }

    let dest = dest
        .or_else(|| settings.destination.clone())
        .or_else(device::guess_dest_folder)
        .ok_or_else(|| {
            eyre!("No destination folder: pass --dest or run `copit config set --dest`")
        })?;

    let progress_mode = if overall {
        ProgressMode::Overall
    } else {
        settings.progress_mode
    };

    let config = BackupConfig::builder()
        .sources(sources)
        .destination(dest)
        .backup_folder_name(settings.backup_folder_name.clone())
        .progress_mode(progress_mode)
        .minimum_battery_level(settings.minimum_battery_level)
        .build()
        .context("Invalid backup configuration")?;

    let cancel = CancellationToken::new();
    let job = BackupJob::new(config)
        .with_battery_level(battery.or_else(device::battery_level))
        .with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            cancel.cancel();
        }
    });

    let mut events = job.start(RunGuard::new());
    let mut outcome = None;

    while let Some(event) = events.recv().await {
        match event {
            BackupEvent::Started { sources } => {
                eprintln!("Backing up {sources} folder(s)...");
            }
            BackupEvent::Progress(progress) => {
                let name = progress
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match progress.overall {
                    Some(overall) => eprint!(
                        "\r {name}: {:>5.1}% ({overall})        ",
                        overall.percentage()
                    ),
                    None => eprint!("\r {name}: {}        ", progress.scope),
                }
                let _ = std::io::stderr().flush();
            }
            BackupEvent::Finished(result) => outcome = Some(result),
        }
    }
    eprintln!();

    match outcome {
        Some(Ok(report)) => {
            info!(sources = report.sources.len(), "Backup completed");
            settings.record_success(Utc::now());
            settings
                .save_to(settings_path)
                .with_context(|| {
                    format!("Failed to save settings to {}", settings_path.display())
                })?;
            print_report(&report, format)?;
            Ok(())
        }
        Some(Err(err)) => {
            if err.is_validation() {
                eprintln!("Try `copit check -s <SOURCE> -d <DEST>` to inspect the folders.");
            }
            let message = user_message(&err);
            Err(Report::new(err).wrap_err(message))
        }
        None => bail!("Backup worker stopped without a result"),
    }
}

/// Print a finished backup report.
fn print_report(report: &BackupReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let totals = report.totals();
            println!();
            println!("{}", "─".repeat(60));
            println!(" Backup completed");
            println!("{}", "─".repeat(60));
            for source in &report.sources {
                println!(
                    " {} -> {}",
                    source.source.display(),
                    source.backup_folder.display()
                );
                println!(
                    "   {} copied, {} up to date, {}",
                    source.stats.files_copied,
                    source.stats.files_skipped,
                    format_size(source.stats.bytes_copied)
                );
            }
            println!();
            println!(
                " {} files copied ({}), {} already up to date",
                totals.files_copied,
                format_size(totals.bytes_copied),
                totals.files_skipped
            );
            let elapsed = report.finished_at - report.started_at;
            println!(
                " Finished in {:.2}s",
                elapsed.num_milliseconds() as f64 / 1000.0
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

/// Validate a folder pair without copying anything.
fn run_check(source: &Path, dest: &Path) -> Result<()> {
    match validate(source, dest) {
        Ok(()) => {
            println!("OK: {} can be backed up into {}", source.display(), dest.display());
            Ok(())
        }
        Err(err) => {
            let message = user_message(&err);
            Err(Report::new(err).wrap_err(message))
        }
    }
}

#[derive(Serialize)]
struct CountOutput<'a> {
    path: &'a Path,
    count: MediaCount,
    recent: &'a [PathBuf],
}

/// Count media files under a folder.
fn run_count(path: &Path, recent: usize, format: OutputFormat) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let count = count_media(&path).context("Count failed")?;
    let newest = if recent > 0 {
        recent_media(&path, recent).context("Failed to list recent media")?
    } else {
        Vec::new()
    };

    match format {
        OutputFormat::Text => {
            println!(" {}", path.display());
            println!("   {} images", count.images);
            println!("   {} videos", count.videos);
            println!("   {} other files", count.other);
            if !newest.is_empty() {
                println!();
                println!(" Most recent:");
                for file in &newest {
                    println!("   {}", file.display());
                }
            }
        }
        OutputFormat::Json => {
            let output = CountOutput {
                path: &path,
                count,
                recent: &newest,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// List well-known sources under the storage root.
fn run_sources(settings_path: &Path) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let root = settings.storage_root();
    let selected = settings.selected_sources();

    println!(" Storage root: {}", root.display());
    for source in MediaSource::all() {
        let mark = if selected.contains(&source) { "x" } else { " " };
        let location = match source.active_paths(&root).first() {
            Some(path) => path.display().to_string(),
            None => "(not found)".to_string(),
        };
        println!(" [{mark}] {:<12} {:<18} {location}", source.to_string(), source.label());
    }
    for extra in &settings.extra_sources {
        println!(" [x] {:<12} {:<18} {}", "folder", "", extra.display());
    }
    Ok(())
}

/// Show or update persisted settings.
fn run_config(settings_path: &Path, action: ConfigAction) -> Result<()> {
    let mut settings = load_settings(settings_path)?;

    match action {
        ConfigAction::Show => {
            println!("# {}", settings_path.display());
            print!(
                "{}",
                toml::to_string_pretty(&settings).context("Failed to encode settings")?
            );
            match settings.last_backup {
                Some(at) => println!(
                    "# last backup: {}",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                ),
                None => println!("# no backup yet"),
            }
        }
        ConfigAction::Set {
            dest,
            storage_root,
            backup_folder_name,
            min_battery,
            progress,
            enable,
            disable,
            add_folder,
            remove_folder,
        } => {
            if let Some(dest) = dest {
                settings.destination = Some(dest);
            }
            if let Some(root) = storage_root {
                settings.storage_root = Some(root);
            }
            if let Some(name) = backup_folder_name {
                settings.backup_folder_name = name;
            }
            if let Some(level) = min_battery {
                settings.minimum_battery_level = level;
            }
            if let Some(mode) = progress {
                settings.progress_mode = mode.into();
            }
            for source in enable {
                settings.set_source(source, true);
            }
            for source in disable {
                settings.set_source(source, false);
            }
            for folder in add_folder {
                if !settings.extra_sources.contains(&folder) {
                    settings.extra_sources.push(folder);
                }
            }
            settings.extra_sources.retain(|f| !remove_folder.contains(f));
            settings.validate().context("Settings not saved")?;

            settings
                .save_to(settings_path)
                .with_context(|| {
                    format!("Failed to save settings to {}", settings_path.display())
                })?;
            eprintln!("Settings saved to {}", settings_path.display());
        }
    }
    Ok(())
}

/// User-facing text for an error kind.
fn user_message(err: &SyncError) -> &'static str {
    match err.message_key() {
        "copy_error_source" => "The source folder doesn't exist",
        "copy_error_dest" => "The destination folder doesn't exist or can't be written",
        "copy_error_samefolder" => {
            "The destination can't be the source folder or a folder inside it"
        }
        "copy_error_battery" => "The battery is too low to start a backup",
        "copy_error_running" => "A backup is already running",
        "copy_error_cancelled" => "The backup was cancelled",
        _ => "The backup failed",
    }
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
