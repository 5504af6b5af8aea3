//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::mastodon::ViewKey;

use super::view::ViewData;

/// One persisted view.
#[derive(Debug, Clone)]
pub struct StoredView {
  pub key: ViewKey,
  pub data: ViewData,
  /// Whether the view was invalidated and must be refetched on next read
  pub stale: bool,
  /// When the view was last written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Replace everything stored with `views`.
  fn save_views(&self, views: &[StoredView]) -> Result<()>;

  /// Every stored view.
  fn load_views(&self) -> Result<Vec<StoredView>>;

  /// Remove everything stored.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn save_views(&self, _views: &[StoredView]) -> Result<()> {
    Ok(()) // Discard
  }

  fn load_views(&self) -> Result<Vec<StoredView>> {
    Ok(Vec::new()) // Always empty
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// A private database that lives as long as the storage does.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("fedisync").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per view (key and contents stored as JSON)
CREATE TABLE IF NOT EXISTS view_cache (
    view_hash TEXT PRIMARY KEY,
    view_key TEXT NOT NULL,
    data BLOB NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStorage for SqliteStorage {
  fn save_views(&self, views: &[StoredView]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM view_cache", [])
      .map_err(|e| eyre!("Failed to clear view cache: {}", e))?;

    for view in views {
      let key =
        serde_json::to_string(&view.key).map_err(|e| eyre!("Failed to serialize key: {}", e))?;
      let data =
        serde_json::to_vec(&view.data).map_err(|e| eyre!("Failed to serialize view: {}", e))?;
      let cached_at = view.cached_at.format(DATETIME_FORMAT).to_string();

      tx.execute(
        "INSERT OR REPLACE INTO view_cache (view_hash, view_key, data, stale, cached_at)
         VALUES (?, ?, ?, ?, ?)",
        params![view.key.cache_hash(), key, data, view.stale, cached_at],
      )
      .map_err(|e| eyre!("Failed to store view {}: {}", view.key, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn load_views(&self) -> Result<Vec<StoredView>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT view_key, data, stale, cached_at FROM view_cache ORDER BY view_key")
      .map_err(|e| eyre!("Failed to prepare view query: {}", e))?;

    let rows: Vec<(String, Vec<u8>, bool, String)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
      .map_err(|e| eyre!("Failed to query views: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut views = Vec::with_capacity(rows.len());
    for (key, data, stale, cached_at) in rows {
      // Rows written by an older schema of keys or views are skipped.
      let Ok(key) = serde_json::from_str::<ViewKey>(&key) else {
        tracing::debug!(key = %key, "skipping unreadable view key");
        continue;
      };
      let Ok(data) = serde_json::from_slice::<ViewData>(&data) else {
        tracing::debug!(view = %key, "skipping unreadable view data");
        continue;
      };
      views.push(StoredView {
        key,
        data,
        stale,
        cached_at: parse_datetime(&cached_at)?,
      });
    }

    Ok(views)
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM view_cache", [])
      .map_err(|e| eyre!("Failed to clear view cache: {}", e))?;

    Ok(())
  }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ViewCache;
  use crate::mastodon::{Status, Timeline};

  fn stored(key: ViewKey, stale: bool) -> StoredView {
    StoredView {
      key,
      data: ViewData::statuses([Status {
        id: "1".to_string(),
        favourites_count: 4,
        ..Default::default()
      }]),
      stale,
      cached_at: Utc::now(),
    }
  }

  #[test]
  fn test_save_and_load_views() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .save_views(&[
        stored(ViewKey::timeline(Timeline::Home), false),
        stored(ViewKey::Bookmarks, true),
      ])
      .unwrap();

    let views = storage.load_views().unwrap();
    assert_eq!(views.len(), 2);

    let bookmarks = views
      .iter()
      .find(|v| v.key == ViewKey::Bookmarks)
      .unwrap();
    assert!(bookmarks.stale);
    assert_eq!(bookmarks.data.entries()[0].id(), "1");
  }

  #[test]
  fn test_save_replaces_previous_contents() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .save_views(&[stored(ViewKey::Bookmarks, false)])
      .unwrap();
    storage
      .save_views(&[stored(ViewKey::Trending, false)])
      .unwrap();

    let views = storage.load_views().unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].key, ViewKey::Trending);

    storage.clear().unwrap();
    assert!(storage.load_views().unwrap().is_empty());
  }

  #[test]
  fn test_lookalike_keys_survive_save_and_load() {
    let keys = [
      ViewKey::SearchAll {
        query: "Rust".to_string(),
      },
      ViewKey::SearchAll {
        query: "rust".to_string(),
      },
      ViewKey::Relationships {
        ids: vec!["1,2".to_string()],
      },
      ViewKey::Relationships {
        ids: vec!["1".to_string(), "2".to_string()],
      },
    ];
    let cache = ViewCache::new();
    for key in &keys {
      cache.set(key.clone(), stored(key.clone(), false).data);
    }

    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.save_views(&cache.export()).unwrap();
    let views = storage.load_views().unwrap();
    assert_eq!(views.len(), 4);

    let restored = ViewCache::new();
    restored.restore(views);
    for key in &keys {
      assert!(restored.contains(key), "lost {}", key);
    }
  }

  #[test]
  fn test_noop_storage_discards() {
    NoopStorage
      .save_views(&[stored(ViewKey::Bookmarks, false)])
      .unwrap();
    assert!(NoopStorage.load_views().unwrap().is_empty());
  }
}
