use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use copit_core::{BackupConfig, NoProgress, ProgressMode, ProgressState, SyncError};
use copit_sync::{BackupEvent, BackupJob, RunGuard, copy_folder, count_entries};
use filetime::FileTime;
use tempfile::TempDir;

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Two images and two videos in `dir/subdir`, two of each directly in `dir`.
fn media_tree(dir: &Path) {
    for name in ["image1.png", "image2.jpg", "video1.mp4", "video2.3gp"] {
        write_file(&dir.join(name), name.as_bytes());
        write_file(&dir.join("subdir").join(name), name.as_bytes());
    }
}

#[test]
fn test_missing_source_fails_for_any_dest() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("random_source_folder");

    for dest in [tmp.path().to_path_buf(), tmp.path().join("random_dest_folder")] {
        let err = copy_folder(&missing, &dest, &mut NoProgress).unwrap_err();
        assert!(matches!(err, SyncError::NoSource { .. }), "{err:?}");
    }
}

#[test]
fn test_missing_dest_fails() {
    let source = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();

    let err = copy_folder(source.path(), &tmp.path().join("random_dest_folder"), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, SyncError::NoDestination { .. }));
}

#[test]
fn test_same_folder_fails() {
    let source = TempDir::new().unwrap();
    write_file(&source.path().join("image1.png"), b"png");

    let err = copy_folder(source.path(), source.path(), &mut NoProgress).unwrap_err();
    assert!(matches!(err, SyncError::SameDirectory { .. }));
}

#[test]
fn test_nested_dest_fails_without_copying() {
    let source = TempDir::new().unwrap();
    write_file(&source.path().join("image1.png"), b"png");
    let nested = source.path().join("subdir");
    fs::create_dir(&nested).unwrap();

    let err = copy_folder(source.path(), &nested, &mut NoProgress).unwrap_err();
    assert!(matches!(err, SyncError::IsChild { .. }));
    assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
}

#[test]
fn test_two_images_into_empty_dest() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_file(&source.path().join("image1.png"), b"first image");
    write_file(&source.path().join("image2.png"), b"second, larger image");

    let mut events = Vec::new();
    let stats = copy_folder(source.path(), dest.path(), &mut |p: usize, t: usize| {
        events.push(ProgressState::new(p, t))
    })
    .unwrap();

    assert_eq!(events, vec![ProgressState::new(1, 2), ProgressState::new(2, 2)]);
    assert_eq!(stats.files_copied, 2);
    assert_eq!(
        collect_files(dest.path()),
        vec![PathBuf::from("image1.png"), PathBuf::from("image2.png")]
    );

    for name in ["image1.png", "image2.png"] {
        let src = source.path().join(name);
        let dst = dest.path().join(name);
        assert_eq!(fs::read(&src).unwrap(), fs::read(&dst).unwrap());
        assert_eq!(mtime(&src), mtime(&dst));
    }
}

#[test]
fn test_preserves_old_modification_time() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let src = source.path().join("image1.png");
    write_file(&src, b"png");

    let five_months_ago = SystemTime::now() - Duration::from_secs(150 * 24 * 60 * 60);
    filetime::set_file_mtime(&src, FileTime::from_system_time(five_months_ago)).unwrap();

    copy_folder(source.path(), dest.path(), &mut NoProgress).unwrap();

    let dst = dest.path().join("image1.png");
    assert!(dst.exists());
    assert_eq!(mtime(&dst), mtime(&src));
    assert_eq!(mtime(&dst), FileTime::from_system_time(five_months_ago));
}

#[test]
fn test_recursive_structure() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_file(&source.path().join("top1.jpg"), b"1");
    write_file(&source.path().join("top2.jpg"), b"2");
    write_file(&source.path().join("top3.jpg"), b"3");
    write_file(&source.path().join("album/inner1.jpg"), b"4");
    write_file(&source.path().join("album/inner2.jpg"), b"5");

    let stats = copy_folder(source.path(), dest.path(), &mut NoProgress).unwrap();

    assert_eq!(stats.files_copied, 5);
    assert_eq!(stats.dirs_visited, 1);
    assert_eq!(collect_files(dest.path()), collect_files(source.path()));
    assert_eq!(collect_files(dest.path()).len(), 3 + 2);
}

#[test]
fn test_empty_subdirectory_is_recreated() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    fs::create_dir(source.path().join("empty")).unwrap();

    let mut events = Vec::new();
    copy_folder(source.path(), dest.path(), &mut |p: usize, t: usize| events.push((p, t))).unwrap();

    assert!(dest.path().join("empty").is_dir());
    assert_eq!(events, vec![(1, 1)]);
}

#[test]
fn test_progress_is_scoped_per_directory() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_file(&source.path().join("sub/a.png"), b"a");
    write_file(&source.path().join("sub/b.png"), b"b");
    write_file(&source.path().join("sub/c.png"), b"c");

    let mut events = Vec::new();
    copy_folder(source.path(), dest.path(), &mut |p: usize, t: usize| events.push((p, t))).unwrap();

    // Three events for the children of `sub`, then one for `sub` itself.
    assert_eq!(events, vec![(1, 3), (2, 3), (3, 3), (1, 1)]);
}

#[test]
fn test_second_run_copies_nothing() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    media_tree(source.path());

    let mut first_events = 0;
    let first = copy_folder(source.path(), dest.path(), &mut |_: usize, _: usize| {
        first_events += 1
    })
    .unwrap();

    let mut second_events = 0;
    let second = copy_folder(source.path(), dest.path(), &mut |_: usize, _: usize| {
        second_events += 1
    })
    .unwrap();

    assert_eq!(first.files_copied, 8);
    assert!(first.bytes_copied > 0);
    assert_eq!(second.files_copied, 0);
    assert_eq!(second.bytes_copied, 0);
    assert_eq!(second.files_skipped, 8);
    assert_eq!(first_events, second_events);
    assert_eq!(second_events, 9);
}

#[test]
fn test_changed_file_is_recopied() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let src = source.path().join("image1.png");
    write_file(&src, b"original");

    copy_folder(source.path(), dest.path(), &mut NoProgress).unwrap();

    write_file(&src, b"edited and longer");
    filetime::set_file_mtime(&src, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let stats = copy_folder(source.path(), dest.path(), &mut NoProgress).unwrap();
    assert_eq!(stats.files_copied, 1);
    assert_eq!(fs::read(dest.path().join("image1.png")).unwrap(), b"edited and longer");
}

#[test]
fn test_count_entries_matches_progress_events() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    media_tree(source.path());
    write_file(&source.path().join("subdir/deeper/clip.mkv"), b"mkv");

    let mut events = 0;
    copy_folder(source.path(), dest.path(), &mut |_: usize, _: usize| events += 1).unwrap();

    assert_eq!(count_entries(source.path()).unwrap(), events);
}

#[test]
fn test_media_count_over_source() {
    let source = TempDir::new().unwrap();
    media_tree(source.path());

    let count = copit_core::count_media(source.path()).unwrap();
    assert_eq!(count.images, 4);
    assert_eq!(count.videos, 4);
}

#[test]
fn test_job_writes_into_backup_folder() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let camera = source.path().join("Camera");
    media_tree(&camera);

    let config = BackupConfig::builder()
        .sources(vec![camera.clone()])
        .destination(dest.path())
        .progress_mode(ProgressMode::Overall)
        .build()
        .unwrap();

    let mut last_overall = None;
    let report = BackupJob::new(config)
        .run(&RunGuard::new(), |p| last_overall = p.overall)
        .unwrap();

    let backup = dest.path().join("copit_backup").join("Camera");
    assert_eq!(report.sources[0].backup_folder, backup);
    assert_eq!(collect_files(&backup), collect_files(&camera));
    assert_eq!(last_overall, Some(ProgressState::new(9, 9)));
    assert_eq!(report.totals().files_copied, 8);
}

#[test]
fn test_job_validates_every_source_before_copying() {
    let tmp = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let good = tmp.path().join("good");
    write_file(&good.join("a.png"), b"a");

    let config = BackupConfig::builder()
        .sources(vec![good, tmp.path().join("missing")])
        .destination(dest.path())
        .build()
        .unwrap();

    let err = BackupJob::new(config).run(&RunGuard::new(), |_| {}).unwrap_err();
    assert!(matches!(err, SyncError::NoSource { .. }));
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_started_job_reports_events() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_file(&source.path().join("image1.png"), b"1");
    write_file(&source.path().join("image2.png"), b"2");

    let guard = RunGuard::new();
    let mut rx = BackupJob::new(BackupConfig::new(source.path(), dest.path())).start(guard.clone());

    let mut started = false;
    let mut progress = Vec::new();
    let mut finished = None;
    while let Some(event) = rx.recv().await {
        match event {
            BackupEvent::Started { sources } => {
                assert_eq!(sources, 1);
                started = true;
            }
            BackupEvent::Progress(p) => progress.push(p.scope),
            BackupEvent::Finished(result) => finished = Some(result),
        }
    }

    assert!(started);
    assert_eq!(progress, vec![ProgressState::new(1, 2), ProgressState::new(2, 2)]);
    let report = finished.expect("finished event").expect("backup succeeded");
    assert_eq!(report.totals().files_copied, 2);
    assert!(!guard.is_running());
}

#[cfg(unix)]
#[test]
fn test_socket_is_skipped_but_reported() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let _listener = std::os::unix::net::UnixListener::bind(source.path().join("s")).unwrap();

    let mut events = Vec::new();
    let stats = copy_folder(source.path(), dest.path(), &mut |p: usize, t: usize| {
        events.push((p, t))
    })
    .unwrap();

    assert_eq!(stats.special_skipped, 1);
    assert_eq!(stats.files_copied, 0);
    assert_eq!(events, vec![(1, 1)]);
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    assert_eq!(count_entries(source.path()).unwrap(), events.len());
}

#[cfg(unix)]
#[test]
fn test_read_only_dest_fails() {
    use std::os::unix::fs::PermissionsExt;

    // Permission bits do not apply to root.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_file(&source.path().join("image1.png"), b"png");
    fs::set_permissions(dest.path(), fs::Permissions::from_mode(0o555)).unwrap();

    let result = copy_folder(source.path(), dest.path(), &mut NoProgress);

    fs::set_permissions(dest.path(), fs::Permissions::from_mode(0o755)).unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err, SyncError::NoDestination { .. }), "{err:?}");
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_overall_job_survives_dangling_symlink() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let photos = source.path().join("Photos");
    write_file(&photos.join("a.png"), b"png");
    std::os::unix::fs::symlink(photos.join("gone"), photos.join("dangling")).unwrap();

    let config = BackupConfig::builder()
        .sources(vec![photos.clone()])
        .destination(dest.path())
        .progress_mode(ProgressMode::Overall)
        .build()
        .unwrap();

    let mut last_overall = None;
    let report = BackupJob::new(config)
        .run(&RunGuard::new(), |p| last_overall = p.overall)
        .unwrap();

    assert_eq!(last_overall, Some(ProgressState::new(2, 2)));
    assert_eq!(report.totals().special_skipped, 1);
    assert_eq!(report.totals().files_copied, 1);
}
