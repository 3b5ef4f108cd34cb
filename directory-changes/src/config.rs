//! Configuration types for directory watching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidDirectoryReason, Result, WatcherError};

/// Default polling interval in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// Default capacity of the pending buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1000;

/// Construction parameters for a directory changes source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Path to the directory.
    pub directory: PathBuf,

    /// How often the notification primitive is checked, in milliseconds.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Maximum number of undelivered changes.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,

    /// Whether subdirectories are watched too.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Which notification backend to use.
    #[serde(default)]
    pub backend: Backend,
}

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_max_buffer_size() -> usize {
    DEFAULT_MAX_BUFFER_SIZE
}

fn default_recursive() -> bool {
    true
}

impl WatchConfig {
    /// Create a new config with default values.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            recursive: true,
            backend: Backend::default(),
        }
    }

    /// Set the polling interval. Sub-millisecond intervals round up to 1ms.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_millis();
        self.polling_interval_ms = if millis == 0 && !interval.is_zero() {
            1
        } else {
            u64::try_from(millis).unwrap_or(u64::MAX)
        };
        self
    }

    /// Set the pending buffer capacity.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Only watch the top-level directory.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Set the notification backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// The polling interval as a duration.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Reject parameters the watch loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_ms == 0 {
            return Err(WatcherError::Config(
                "polling interval must be positive".to_string(),
            ));
        }
        if self.max_buffer_size == 0 {
            return Err(WatcherError::Config(
                "max buffer size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Check that the configured directory exists and is a directory.
    pub fn check_directory(&self) -> Result<()> {
        let metadata = match std::fs::metadata(&self.directory) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WatcherError::InvalidDirectory {
                    path: self.directory.clone(),
                    reason: InvalidDirectoryReason::NotFound,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_dir() {
            return Err(WatcherError::InvalidDirectory {
                path: self.directory.clone(),
                reason: InvalidDirectoryReason::NotADirectory,
            });
        }

        Ok(())
    }

    /// Parse a config from TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Which notification primitive backs the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// The platform's native change notifications.
    #[default]
    Native,

    /// Periodic stat scans, for filesystems without native notifications.
    Poll,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_watch_config_creation() {
        let config = WatchConfig::new("/home/user/documents")
            .with_polling_interval(Duration::from_millis(250))
            .with_max_buffer_size(200)
            .non_recursive();

        assert_eq!(config.directory, Path::new("/home/user/documents"));
        assert_eq!(config.polling_interval(), Duration::from_millis(250));
        assert_eq!(config.max_buffer_size, 200);
        assert!(!config.recursive);
        assert_eq!(config.backend, Backend::Native);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = WatchConfig::new("/tmp").with_polling_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(WatcherError::Config(_))));

        let config = WatchConfig::new("/tmp").with_max_buffer_size(0);
        assert!(matches!(config.validate(), Err(WatcherError::Config(_))));

        let config = WatchConfig::new("/tmp").with_polling_interval(Duration::from_micros(10));
        assert_eq!(config.polling_interval_ms, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(WatchConfig::new(temp_dir.path()).check_directory().is_ok());

        let missing = WatchConfig::new(temp_dir.path().join("missing"));
        assert!(matches!(
            missing.check_directory(),
            Err(WatcherError::InvalidDirectory {
                reason: InvalidDirectoryReason::NotFound,
                ..
            })
        ));

        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, "data").unwrap();
        assert!(matches!(
            WatchConfig::new(&file).check_directory(),
            Err(WatcherError::InvalidDirectory {
                reason: InvalidDirectoryReason::NotADirectory,
                ..
            })
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = WatchConfig::from_toml_str(
            r#"
            directory = "/srv/inbox"
            polling_interval_ms = 500
            backend = "poll"
            "#,
        )
        .unwrap();

        assert_eq!(config.directory, Path::new("/srv/inbox"));
        assert_eq!(config.polling_interval_ms, 500);
        assert_eq!(config.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
        assert!(config.recursive);
        assert_eq!(config.backend, Backend::Poll);

        let result = WatchConfig::from_toml_str("directory = \"/srv\"\nmax_buffer_size = 0\n");
        assert!(matches!(result, Err(WatcherError::Config(_))));
    }
}
