//! Generic view cache for server entities.
//!
//! This module provides a shape-agnostic cache of named views that:
//! - Stores each view as paginated pages, a flat list or a singleton
//! - Fans updates out across views through per-shape adapters
//! - Tracks in-flight fetches so stale results can be disowned
//! - Persists views to SQLite between runs

mod shape;
mod storage;
mod store;
mod traits;
mod view;

pub use shape::{adapter_for, Mismatch, ShapeAdapter};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage, StoredView};
pub use store::{FanOut, FetchTicket, ViewCache};
pub use traits::{CacheResult, CacheSource};
pub use view::{Cursors, Entry, Page, Shape, Singleton, ViewData};
