use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "provisioning_cli=info";

/// Where TUI sessions write their log, since stderr belongs to the terminal UI.
pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("provisioning-cli").join("provisioning-cli.log"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. With `to_file` set, logs are appended to
/// [`log_file_path`]; otherwise they go to stderr.
pub fn init_logging(to_file: bool) -> Result<()> {
    if !to_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(env_filter())
            .try_init()
            .context("install log subscriber")?;
        return Ok(());
    }

    let Some(path) = log_file_path() else {
        // No cache directory: run without logs rather than corrupt the screen.
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .with(env_filter())
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}
