//! Filesystem notification primitives the watch loop polls.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify::{PollWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::config::Backend;
use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, from_notify};

/// A pollable source of filesystem change signals.
///
/// Each registration covers exactly one directory (no recursion); the watch
/// loop registers subdirectories itself as they appear.
pub trait NotificationPrimitive: Send + 'static {
    /// Start receiving signals for the direct children of `directory`.
    fn register(&mut self, directory: &Path) -> Result<()>;

    /// Stop receiving signals for `directory`.
    fn release(&mut self, directory: &Path) -> Result<()>;

    /// Signals reported since the previous poll, oldest first. Never blocks.
    fn poll(&mut self) -> Result<Vec<ChangeEvent>>;
}

/// Notification primitive backed by the `notify` crate.
pub struct NotifyPrimitive {
    watcher: Box<dyn Watcher + Send>,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl NotifyPrimitive {
    /// Create a primitive for the given backend.
    ///
    /// `polling_interval` only matters for [`Backend::Poll`], where it sets
    /// how often the stat scan runs.
    pub fn new(backend: Backend, polling_interval: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let watcher: Box<dyn Watcher + Send> = match backend {
            Backend::Native => Box::new(notify::recommended_watcher(tx)?),
            Backend::Poll => Box::new(PollWatcher::new(
                tx,
                notify::Config::default().with_poll_interval(polling_interval),
            )?),
        };

        debug!("Created {backend:?} notification primitive");
        Ok(Self { watcher, rx })
    }
}

impl NotificationPrimitive for NotifyPrimitive {
    fn register(&mut self, directory: &Path) -> Result<()> {
        self.watcher.watch(directory, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn release(&mut self, directory: &Path) -> Result<()> {
        self.watcher.unwatch(directory)?;
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<ChangeEvent>> {
        let mut changes = Vec::new();

        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    if event.need_rescan() {
                        return Err(WatcherError::NotificationPrimitiveFailure(
                            "notification queue overflowed, changes were lost".to_string(),
                        ));
                    }
                    changes.extend(from_notify(&event));
                }
                Ok(Err(e)) => {
                    return Err(WatcherError::NotificationPrimitiveFailure(e.to_string()));
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    return Err(WatcherError::NotificationPrimitiveFailure(
                        "notification channel closed".to_string(),
                    ));
                }
            }
        }

        Ok(changes)
    }
}
