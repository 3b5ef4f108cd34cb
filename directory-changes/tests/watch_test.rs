//! Integration tests against the real filesystem.
//!
//! These drive the `notify`-backed source on a temp directory, so every wait
//! is bounded by a timeout instead of assuming OS notification latency.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directory_changes::{
    Backend, ChangeEvent, ChangeKind, ChangeStream, DirectoryChangesSource, InvalidDirectoryReason,
    WatchConfig, WatcherError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const POLLING_INTERVAL: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(10);

/// A canonical temp directory, so reported paths compare equal on every platform.
fn watched_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    (temp_dir, root)
}

async fn next_change(changes: &mut ChangeStream) -> ChangeEvent {
    tokio::time::timeout(WAIT, changes.recv())
        .await
        .expect("timed out waiting for a change")
        .expect("stream ended")
        .expect("stream failed")
}

/// Next change for `path`, skipping unrelated ones.
async fn next_change_for(changes: &mut ChangeStream, path: &Path) -> ChangeEvent {
    loop {
        let change = next_change(changes).await;
        if change.path == path {
            return change;
        }
    }
}

#[tokio::test]
async fn test_source_emits_on_directory_changes() {
    let (_temp_dir, root) = watched_dir();
    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 200)
        .start()
        .unwrap();

    let file = root.join("test1file1.sample");
    std::fs::File::create(&file).unwrap();
    assert_eq!(next_change(&mut changes).await, ChangeEvent::creation(&file));

    std::fs::write(&file, "Some data").unwrap();
    assert_eq!(next_change(&mut changes).await, ChangeEvent::modification(&file));

    // A write can straddle a poll boundary and surface as two modifications.
    std::fs::remove_file(&file).unwrap();
    let mut change = next_change(&mut changes).await;
    while change == ChangeEvent::modification(&file) {
        change = next_change(&mut changes).await;
    }
    assert_eq!(change, ChangeEvent::deletion(&file));

    let summary = changes.cancel().await.unwrap();
    assert_eq!(summary.released_watches, 1);
}

#[tokio::test]
async fn test_emit_multiple_changes() {
    let (_temp_dir, root) = watched_dir();
    let count = 25;
    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();

    let files: Vec<PathBuf> = (0..count)
        .map(|i| root.join(format!("test2files{i}")))
        .collect();
    for file in &files {
        std::fs::File::create(file).unwrap();
    }
    let expected: HashSet<PathBuf> = files.iter().cloned().collect();

    let mut created = HashSet::new();
    while created.len() < count {
        let change = next_change(&mut changes).await;
        if change.kind == ChangeKind::Creation {
            created.insert(change.path);
        }
    }
    assert_eq!(created, expected);

    for file in &files {
        std::fs::remove_file(file).unwrap();
    }

    let mut deleted = HashSet::new();
    while deleted.len() < count {
        let change = next_change(&mut changes).await;
        if change.kind == ChangeKind::Deletion {
            deleted.insert(change.path);
        }
    }
    assert_eq!(deleted, expected);

    changes.cancel().await.unwrap();
}

#[tokio::test]
async fn test_changes_in_new_subdirectory_are_seen() {
    let (_temp_dir, root) = watched_dir();
    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();

    let sub = root.join("nested");
    std::fs::create_dir(&sub).unwrap();
    assert_eq!(next_change_for(&mut changes, &sub).await, ChangeEvent::creation(&sub));

    let file = sub.join("inner.txt");
    std::fs::write(&file, "x").unwrap();
    assert_eq!(
        next_change_for(&mut changes, &file).await,
        ChangeEvent::creation(&file)
    );

    changes.cancel().await.unwrap();
}

#[tokio::test]
async fn test_existing_subdirectories_are_watched() {
    let (_temp_dir, root) = watched_dir();
    let sub = root.join("already").join("here");
    std::fs::create_dir_all(&sub).unwrap();

    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();

    let file = sub.join("deep.txt");
    std::fs::write(&file, "x").unwrap();
    assert_eq!(
        next_change_for(&mut changes, &file).await,
        ChangeEvent::creation(&file)
    );

    let summary = changes.cancel().await.unwrap();
    assert_eq!(summary.released_watches, 3);
}

#[tokio::test]
async fn test_overflow_without_consumption() {
    let (_temp_dir, root) = watched_dir();
    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 5)
        .start()
        .unwrap();

    for i in 0..20 {
        std::fs::File::create(root.join(format!("overflow{i}"))).unwrap();
    }

    // Let the loop see everything before demanding anything.
    tokio::time::sleep(POLLING_INTERVAL * 10).await;

    let result = tokio::time::timeout(WAIT, async {
        loop {
            match changes.recv().await {
                Some(Ok(_)) => continue,
                other => return other,
            }
        }
    })
    .await
    .unwrap();

    assert!(matches!(
        result,
        Some(Err(WatcherError::BufferOverflow { capacity: 5 }))
    ));
    assert!(changes.recv().await.is_none());
    assert_eq!(changes.cancel().await.unwrap().released_watches, 1);
}

#[tokio::test]
async fn test_root_deletion_fails_the_stream() {
    let (_temp_dir, parent) = watched_dir();
    let root = parent.join("watched");
    std::fs::create_dir(&root).unwrap();

    let mut changes = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();
    std::fs::remove_dir(&root).unwrap();

    let result = tokio::time::timeout(WAIT, async {
        loop {
            match changes.recv().await {
                Some(Ok(_)) => continue,
                other => return other,
            }
        }
    })
    .await
    .unwrap();

    assert!(matches!(
        result,
        Some(Err(WatcherError::NotificationPrimitiveFailure(_)))
    ));
}

#[tokio::test]
async fn test_poll_backend() {
    let (_temp_dir, root) = watched_dir();
    let config = WatchConfig::new(&root)
        .with_polling_interval(POLLING_INTERVAL)
        .with_backend(Backend::Poll);
    let mut changes = DirectoryChangesSource::new(config).start().unwrap();

    let file = root.join("polled.txt");
    std::fs::write(&file, "x").unwrap();
    assert_eq!(
        next_change_for(&mut changes, &file).await,
        ChangeEvent::creation(&file)
    );

    changes.cancel().await.unwrap();
}

#[tokio::test]
async fn test_start_on_a_file_fails() {
    let (_temp_dir, root) = watched_dir();
    let file = root.join("plain.txt");
    std::fs::write(&file, "x").unwrap();

    let result = DirectoryChangesSource::create(&file, POLLING_INTERVAL, 10).start();
    assert!(matches!(
        result,
        Err(WatcherError::InvalidDirectory {
            reason: InvalidDirectoryReason::NotADirectory,
            ..
        })
    ));
}

#[tokio::test]
async fn test_independent_sources_on_same_directory() {
    let (_temp_dir, root) = watched_dir();
    let mut first = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();
    let mut second = DirectoryChangesSource::create(&root, POLLING_INTERVAL, 100)
        .start()
        .unwrap();

    let file = root.join("shared.txt");
    std::fs::File::create(&file).unwrap();

    assert_eq!(next_change(&mut first).await, ChangeEvent::creation(&file));
    first.cancel().await.unwrap();

    assert_eq!(next_change(&mut second).await, ChangeEvent::creation(&file));
    second.cancel().await.unwrap();
}
