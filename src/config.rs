use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a fetched view is refetched on read
  pub stale_after_secs: u64,
  /// Keep views in SQLite between runs
  pub persist: bool,
  /// Database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_after_secs: 300,
      persist: false,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
  /// `EnvFilter` directives, used when RUST_LOG is unset
  pub filter: String,
  /// Write logs here instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      filter: "fedisync=info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fedisync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fedisync/config.yaml
  ///
  /// Without a file, defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fedisync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fedisync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("{}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-default config.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))
  }

  pub fn stale_time(&self) -> chrono::Duration {
    // Larger values would overflow the millisecond range.
    let secs = self.cache.stale_after_secs.min(i64::MAX as u64 / 1000) as i64;
    chrono::Duration::seconds(secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.cache.stale_after_secs, 300);
    assert_eq!(config.log.filter, "fedisync=info");
    assert_eq!(config.stale_time(), chrono::Duration::minutes(5));
  }

  #[test]
  fn test_partial_sections_keep_defaults() {
    let config = Config::parse(
      r#"
cache:
  persist: true
log:
  file: /tmp/fedisync.log
"#,
    )
    .unwrap();

    assert!(config.cache.persist);
    assert_eq!(config.cache.stale_after_secs, 300);
    assert_eq!(config.log.filter, "fedisync=info");
    assert_eq!(config.log.file, Some(PathBuf::from("/tmp/fedisync.log")));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/fedisync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
  }

  #[test]
  fn test_invalid_yaml_is_an_error() {
    assert!(Config::parse("cache: [1, 2").is_err());
  }
}
