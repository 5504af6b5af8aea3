//! Subscriber setup for the binary.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Keeps the file writer flushing; drop it last.
pub struct LogGuard {
  _guard: Option<WorkerGuard>,
}

/// The filter to run with: RUST_LOG if set, else the configured directives.
pub fn filter(config: &LogConfig) -> Result<EnvFilter> {
  match EnvFilter::try_from_default_env() {
    Ok(filter) => Ok(filter),
    Err(_) => EnvFilter::try_new(&config.filter)
      .map_err(|e| eyre!("Invalid log filter '{}': {}", config.filter, e)),
  }
}

/// Install the global subscriber, writing to `config.file` or stderr.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
  let filter = filter(config)?;

  let Some(path) = &config.file else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .try_init()
      .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
    return Ok(LogGuard { _guard: None });
  };

  let dir = match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
    _ => std::path::PathBuf::from("."),
  };
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(LogGuard {
    _guard: Some(guard),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_configured_filter_parses() {
    let config = LogConfig {
      filter: "fedisync=debug,rusqlite=warn".to_string(),
      file: None,
    };
    assert!(filter(&config).is_ok());
  }
}
