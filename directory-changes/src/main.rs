//! Print every change under a directory until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use directory_changes::{Backend, ChangeStream, DirectoryChangesSource, WatchConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "directory-changes", about = "Watch a directory and print its changes")]
struct Cli {
    /// Directory to watch.
    path: Option<PathBuf>,

    /// Load settings from a TOML file; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How often to check for changes, in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Maximum number of undelivered changes before the watch fails.
    #[arg(long)]
    max_buffer_size: Option<usize>,

    /// Do not watch subdirectories.
    #[arg(long)]
    non_recursive: bool,

    /// Notification backend.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Print one JSON object per change.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Native,
    Poll,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => Self::Native,
            BackendArg::Poll => Self::Poll,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<WatchConfig> {
        let mut config = match (&self.config, &self.path) {
            (Some(file), _) => WatchConfig::from_toml_file(file)
                .with_context(|| format!("failed to load {}", file.display()))?,
            (None, Some(path)) => WatchConfig::new(path),
            (None, None) => anyhow::bail!("either a directory or --config is required"),
        };

        if let (Some(_), Some(path)) = (&self.config, &self.path) {
            config.directory = path.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            config.polling_interval_ms = interval;
        }
        if let Some(size) = self.max_buffer_size {
            config.max_buffer_size = size;
        }
        if self.non_recursive {
            config.recursive = false;
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let config = cli.into_config()?;
    let directory = config.directory.clone();

    let mut changes = DirectoryChangesSource::new(config)
        .start()
        .with_context(|| format!("failed to watch {}", directory.display()))?;

    let finished = tokio::select! {
        result = print_changes(&mut changes, json) => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            None
        }
    };

    match finished {
        Some(result) => result,
        None => {
            let summary = changes.cancel().await?;
            info!("Released {} watches", summary.released_watches);
            Ok(())
        }
    }
}

async fn print_changes(changes: &mut ChangeStream, json: bool) -> Result<()> {
    while let Some(change) = changes.recv().await {
        let change = change?;
        if json {
            println!("{}", serde_json::to_string(&change)?);
        } else {
            println!("{change}");
        }
    }
    Ok(())
}
