//! The set of live directory watches owned by one watch loop.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::primitive::NotificationPrimitive;

/// Directory registrations keyed by path.
///
/// Grows as subdirectories appear and shrinks as they are deleted. Every
/// entry is released through the primitive it was registered with.
#[derive(Debug, Default)]
pub struct WatchRegistrations {
    directories: BTreeSet<PathBuf>,
}

impl WatchRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch on `directory` unless one is already live.
    ///
    /// Returns whether a new registration was made.
    pub fn register<P: NotificationPrimitive + ?Sized>(
        &mut self,
        primitive: &mut P,
        directory: &Path,
    ) -> Result<bool> {
        if self.directories.contains(directory) {
            return Ok(false);
        }

        primitive.register(directory)?;
        self.directories.insert(directory.to_path_buf());
        debug!("Registered watch: {}", directory.display());
        Ok(true)
    }

    /// Release `directory` and every registration beneath it.
    ///
    /// The directory is usually already gone when this runs, so a failed
    /// release is only logged.
    pub fn release_tree<P: NotificationPrimitive + ?Sized>(
        &mut self,
        primitive: &mut P,
        directory: &Path,
    ) -> usize {
        let doomed: Vec<PathBuf> = self
            .directories
            .iter()
            .filter(|registered| registered.starts_with(directory))
            .cloned()
            .collect();

        for path in &doomed {
            self.directories.remove(path);
            release_one(primitive, path);
        }

        doomed.len()
    }

    /// Release every registration.
    pub fn release_all<P: NotificationPrimitive + ?Sized>(&mut self, primitive: &mut P) -> usize {
        let released = self.directories.len();
        for path in std::mem::take(&mut self.directories) {
            release_one(primitive, &path);
        }
        released
    }

    pub fn contains(&self, directory: &Path) -> bool {
        self.directories.contains(directory)
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

fn release_one<P: NotificationPrimitive + ?Sized>(primitive: &mut P, path: &Path) {
    match primitive.release(path) {
        Ok(()) => debug!("Released watch: {}", path.display()),
        Err(e) => debug!("Release of {} failed: {e}", path.display()),
    }
}
