//! Change events emitted by the source.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// Kind of change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Path was created (or renamed into place).
    Creation,

    /// Path contents or metadata changed.
    Modification,

    /// Path was deleted (or renamed away).
    Deletion,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Creation => "Creation",
            Self::Modification => "Modification",
            Self::Deletion => "Deletion",
        };
        f.write_str(name)
    }
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// The kind of change.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn creation(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Creation)
    }

    pub fn modification(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modification)
    }

    pub fn deletion(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Deletion)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path: {}, Change: {}", self.path.display(), self.kind)
    }
}

/// Translate a notify event into change events.
///
/// Access and unclassified events produce nothing. A rename with both ends
/// known becomes a deletion of the old path followed by a creation of the new.
pub fn from_notify(event: &notify::Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Create(_) => with_kind(&event.paths, ChangeKind::Creation),
        EventKind::Remove(_) => with_kind(&event.paths, ChangeKind::Deletion),
        EventKind::Modify(ModifyKind::Name(mode)) => from_rename(mode, &event.paths),
        EventKind::Modify(_) => with_kind(&event.paths, ChangeKind::Modification),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn with_kind(paths: &[PathBuf], kind: ChangeKind) -> Vec<ChangeEvent> {
    paths
        .iter()
        .map(|path| ChangeEvent::new(path.clone(), kind))
        .collect()
}

fn from_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<ChangeEvent> {
    match mode {
        RenameMode::From => with_kind(paths, ChangeKind::Deletion),
        RenameMode::To => with_kind(paths, ChangeKind::Creation),
        RenameMode::Both => match paths {
            [from, to] => vec![ChangeEvent::deletion(from), ChangeEvent::creation(to)],
            _ => paths.iter().map(|p| by_existence(p)).collect(),
        },
        // Backends that cannot tell which end of the rename they saw.
        RenameMode::Any | RenameMode::Other => paths.iter().map(|p| by_existence(p)).collect(),
    }
}

fn by_existence(path: &Path) -> ChangeEvent {
    if path.symlink_metadata().is_ok() {
        ChangeEvent::creation(path)
    } else {
        ChangeEvent::deletion(path)
    }
}
