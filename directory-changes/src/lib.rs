//! # Directory Changes
//!
//! This crate turns filesystem change notifications for a directory into a
//! demand-driven stream of typed changes.
//!
//! ## Features
//!
//! - **Polling Cadence**: The notification primitive is checked on a fixed interval
//! - **Recursive Watching**: Subdirectories are registered as they appear
//! - **Bounded Buffering**: Undelivered changes never exceed a fixed capacity
//! - **Fail-Fast Overflow**: A consumer that falls behind gets an error, not gaps
//! - **Deterministic Shutdown**: Every watch is released on every exit path
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Directory Changes Source                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchConfig ──► WatchLoop ──► PendingBuffer ──► ChangeStream  │
//! │                     │                               │           │
//! │                     ▼                               ▼           │
//! │  NotificationPrimitive + WatchRegistrations    ChangeEvent     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use directory_changes::DirectoryChangesSource;
//!
//! # async fn run() -> directory_changes::Result<()> {
//! let mut changes =
//!     DirectoryChangesSource::create("/srv/inbox", Duration::from_secs(1), 1000).start()?;
//!
//! while let Some(change) = changes.recv().await {
//!     println!("{}", change?);
//! }
//! # Ok(())
//! # }
//! ```

mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod primitive;
pub mod registration;
pub mod source;

pub use config::{Backend, WatchConfig};
pub use error::{InvalidDirectoryReason, Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind};
pub use primitive::{NotificationPrimitive, NotifyPrimitive};
pub use registration::WatchRegistrations;
pub use source::{ChangeStream, DirectoryChangesSource, WatchSummary};
