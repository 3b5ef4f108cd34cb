//! The directory changes source and its consumer-facing stream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::buffer::{PendingBuffer, Take};
use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, ChangeKind};
use crate::primitive::{NotificationPrimitive, NotifyPrimitive};
use crate::registration::WatchRegistrations;

/// A source of changes for one directory.
///
/// Nothing happens until [`start`](Self::start) is called; each start runs
/// an independent watch loop on the current tokio runtime.
#[derive(Debug, Clone)]
pub struct DirectoryChangesSource {
    config: WatchConfig,
}

impl DirectoryChangesSource {
    /// Create a source from a full configuration.
    pub fn new(config: WatchConfig) -> Self {
        Self { config }
    }

    /// Create a recursive source with the given cadence and capacity.
    pub fn create(
        directory: impl Into<PathBuf>,
        polling_interval: Duration,
        max_buffer_size: usize,
    ) -> Self {
        Self::new(
            WatchConfig::new(directory)
                .with_polling_interval(polling_interval)
                .with_max_buffer_size(max_buffer_size),
        )
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Start watching with the `notify` primitive selected by the config.
    pub fn start(self) -> Result<ChangeStream> {
        self.check()?;
        let primitive =
            NotifyPrimitive::new(self.config.backend, self.config.polling_interval())?;
        self.start_with(primitive)
    }

    /// Start watching with a caller-supplied notification primitive.
    pub fn start_with<P: NotificationPrimitive>(self, primitive: P) -> Result<ChangeStream> {
        self.check()?;
        let runtime = Handle::try_current().map_err(|_| {
            WatcherError::Config(
                "a directory watch must be started inside a tokio runtime".to_string(),
            )
        })?;

        let buffer = Arc::new(PendingBuffer::new(self.config.max_buffer_size));
        let mut watch_loop = WatchLoop::new(&self.config, primitive, buffer.clone());
        watch_loop.register_initial()?;

        info!(
            "Watching {} (interval {:?}, capacity {}, {} watches)",
            self.config.directory.display(),
            self.config.polling_interval(),
            self.config.max_buffer_size,
            watch_loop.registrations.len()
        );

        let cancel = CancellationToken::new();
        let task = runtime.spawn(watch_loop.run(cancel.clone()));

        Ok(ChangeStream {
            buffer,
            cancel,
            task: Some(task),
        })
    }

    fn check(&self) -> Result<()> {
        self.config.validate()?;
        self.config.check_directory()
    }
}

/// What a finished watch loop left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Number of poll cycles run.
    pub polls: u64,

    /// Number of registrations released on exit.
    pub released_watches: usize,
}

/// Consumer handle for a running source.
///
/// Each call to [`recv`](Self::recv) is demand for one change and
/// [`recv_many`](Self::recv_many) for up to `n`. Dropping the handle cancels
/// the watch.
#[derive(Debug)]
pub struct ChangeStream {
    buffer: Arc<PendingBuffer>,
    cancel: CancellationToken,
    task: Option<JoinHandle<WatchSummary>>,
}

impl ChangeStream {
    /// Wait for the next change.
    ///
    /// Returns `Some(Err(_))` once if the stream failed, then `None`.
    pub async fn recv(&mut self) -> Option<Result<ChangeEvent>> {
        match self.buffer.take(1).await {
            Take::Events(mut events) => events.pop().map(Ok),
            Take::Failed(error) => Some(Err(error)),
            Take::Closed | Take::Empty => None,
        }
    }

    /// Wait for at least one change, then take up to `limit` without waiting.
    pub async fn recv_many(&mut self, limit: usize) -> Option<Result<Vec<ChangeEvent>>> {
        if limit == 0 {
            return Some(Ok(Vec::new()));
        }

        match self.buffer.take(limit).await {
            Take::Events(events) => Some(Ok(events)),
            Take::Failed(error) => Some(Err(error)),
            Take::Closed | Take::Empty => None,
        }
    }

    /// Number of changes detected but not yet delivered.
    pub async fn pending(&self) -> usize {
        self.buffer.len().await
    }

    /// Whether the watch loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop watching and wait until every registration is released.
    ///
    /// Changes still buffered are discarded.
    pub async fn cancel(mut self) -> Result<WatchSummary> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(WatchSummary::default());
        };

        task.await.map_err(|e| {
            WatcherError::NotificationPrimitiveFailure(format!(
                "watch loop did not exit cleanly: {e}"
            ))
        })
    }

    /// Adapt into a [`Stream`] where each poll is demand for one change.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChangeEvent>> + Send + 'static {
        futures::stream::unfold(self, |mut changes| async move {
            changes.recv().await.map(|item| (item, changes))
        })
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the background task of one started source.
struct WatchLoop<P> {
    root: PathBuf,
    recursive: bool,
    interval: Duration,
    primitive: P,
    registrations: WatchRegistrations,
    buffer: Arc<PendingBuffer>,
    /// Last known state of paths whose primitive report may trail into the
    /// next cycle: entries reported on the primitive's behalf and released
    /// directories.
    carried: HashMap<PathBuf, ChangeKind>,
    polls: u64,
}

impl<P: NotificationPrimitive> WatchLoop<P> {
    fn new(config: &WatchConfig, primitive: P, buffer: Arc<PendingBuffer>) -> Self {
        Self {
            root: config.directory.clone(),
            recursive: config.recursive,
            interval: config.polling_interval(),
            primitive,
            registrations: WatchRegistrations::new(),
            buffer,
            carried: HashMap::new(),
            polls: 0,
        }
    }

    fn register_initial(&mut self) -> Result<()> {
        let result = self.register_existing_tree();
        if result.is_err() {
            self.registrations.release_all(&mut self.primitive);
        }
        result
    }

    fn register_existing_tree(&mut self) -> Result<()> {
        let root = self.root.clone();
        self.registrations.register(&mut self.primitive, &root)?;

        if self.recursive {
            let entries = WalkDir::new(&root)
                .min_depth(1)
                .into_iter()
                .filter_map(std::result::Result::ok);
            for entry in entries {
                if entry.file_type().is_dir() {
                    self.registrations.register(&mut self.primitive, entry.path())?;
                }
            }
        }

        Ok(())
    }

    async fn run(mut self, cancel: CancellationToken) -> WatchSummary {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let failure = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break None,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        break Some(e);
                    }
                }
            }
        };

        let released_watches = self.registrations.release_all(&mut self.primitive);
        match failure {
            None => {
                self.buffer.close().await;
                info!(
                    "Stopped watching {} after {} polls",
                    self.root.display(),
                    self.polls
                );
            }
            Some(error) => {
                warn!("Watch of {} failed: {error}", self.root.display());
                self.buffer.fail(error).await;
            }
        }

        WatchSummary {
            polls: self.polls,
            released_watches,
        }
    }

    async fn poll_cycle(&mut self) -> Result<()> {
        self.polls += 1;

        if !self.root.is_dir() {
            return Err(WatcherError::NotificationPrimitiveFailure(format!(
                "watched directory {} is no longer available",
                self.root.display()
            )));
        }

        let signals = self.primitive.poll()?;
        let mut seen = std::mem::take(&mut self.carried);
        let mut changes = Vec::with_capacity(signals.len());

        for signal in signals {
            self.translate(signal, &mut seen, &mut changes)?;
        }

        if !changes.is_empty() {
            debug!("Detected {} changes under {}", changes.len(), self.root.display());
        }
        self.buffer.push_all(changes).await
    }

    fn translate(
        &mut self,
        signal: ChangeEvent,
        seen: &mut HashMap<PathBuf, ChangeKind>,
        changes: &mut Vec<ChangeEvent>,
    ) -> Result<()> {
        if signal.path == self.root {
            if signal.kind == ChangeKind::Deletion {
                return Err(WatcherError::NotificationPrimitiveFailure(format!(
                    "watched directory {} was removed",
                    self.root.display()
                )));
            }
            return Ok(());
        }

        // Duplicate report for a path whose state has not changed since.
        if seen.get(&signal.path) == Some(&signal.kind) {
            return Ok(());
        }
        seen.insert(signal.path.clone(), signal.kind);

        match signal.kind {
            ChangeKind::Creation if self.recursive && is_real_dir(&signal.path) => {
                let directory = signal.path.clone();
                changes.push(signal);
                self.adopt_directory(&directory, seen, changes)?;
            }
            ChangeKind::Deletion if self.registrations.contains(&signal.path) => {
                self.registrations
                    .release_tree(&mut self.primitive, &signal.path);
                self.carried
                    .insert(signal.path.clone(), ChangeKind::Deletion);
                changes.push(signal);
            }
            _ => changes.push(signal),
        }

        Ok(())
    }

    /// Watch a newly created directory and report what is already inside it.
    ///
    /// Entries created before the watch took effect were never signalled, so
    /// they are reported here and remembered for the next cycle.
    fn adopt_directory(
        &mut self,
        directory: &Path,
        seen: &mut HashMap<PathBuf, ChangeKind>,
        changes: &mut Vec<ChangeEvent>,
    ) -> Result<()> {
        if !self.register_if_present(directory)? {
            return Ok(());
        }

        let entries = WalkDir::new(directory)
            .min_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok);
        for entry in entries {
            let path = entry.path();
            if entry.file_type().is_dir() && !self.register_if_present(path)? {
                continue;
            }
            if seen.insert(path.to_path_buf(), ChangeKind::Creation) != Some(ChangeKind::Creation) {
                self.carried.insert(path.to_path_buf(), ChangeKind::Creation);
                changes.push(ChangeEvent::creation(path));
            }
        }

        Ok(())
    }

    /// Register `directory`, tolerating it having vanished already.
    ///
    /// Any other failure ends the stream as a primitive failure.
    fn register_if_present(&mut self, directory: &Path) -> Result<bool> {
        match self.registrations.register(&mut self.primitive, directory) {
            Ok(_) => Ok(true),
            Err(_) if !is_real_dir(directory) => {
                debug!(
                    "Directory vanished before it could be watched: {}",
                    directory.display()
                );
                Ok(false)
            }
            Err(e) => Err(WatcherError::NotificationPrimitiveFailure(format!(
                "failed to watch {}: {e}",
                directory.display()
            ))),
        }
    }
}

/// A directory that is not reached through a symlink.
fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|metadata| metadata.is_dir())
}
