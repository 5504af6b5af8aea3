//! In-memory view cache: uniform addressing, fan-out and fetch tracking.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::mastodon::ViewKey;

use super::shape::{adapter_for, Mismatch, ShapeAdapter};
use super::storage::StoredView;
use super::traits::CacheResult;
use super::view::ViewData;

struct ViewSlot {
  data: ViewData,
  /// Resolved once from the key's category
  adapter: &'static dyn ShapeAdapter,
  revision: u64,
  stale: bool,
  updated_at: DateTime<Utc>,
}

impl ViewSlot {
  fn new(key: &ViewKey, data: ViewData, stale: bool, updated_at: DateTime<Utc>) -> Self {
    Self {
      data,
      adapter: adapter_for(key.shape()),
      revision: 1,
      stale,
      updated_at,
    }
  }
}

#[derive(Default)]
struct Views {
  slots: BTreeMap<ViewKey, ViewSlot>,
  /// Fetch generation per key; bumped to disown in-flight fetches
  generations: HashMap<ViewKey, u64>,
}

impl Views {
  fn write(&mut self, key: ViewKey, data: ViewData) {
    match self.slots.get_mut(&key) {
      Some(slot) => {
        slot.data = data;
        slot.revision += 1;
        slot.stale = false;
        slot.updated_at = Utc::now();
      }
      None => {
        let slot = ViewSlot::new(&key, data, false, Utc::now());
        self.slots.insert(key, slot);
      }
    }
  }
}

/// Proof that a fetch was started, checked again when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
  key: ViewKey,
  generation: u64,
}

impl FetchTicket {
  pub fn key(&self) -> &ViewKey {
    &self.key
  }
}

/// What one fan-out did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
  /// Views matching the filter
  pub visited: usize,
  /// Views whose contents changed
  pub changed: usize,
  /// Views skipped because their data had the wrong shape
  pub failed: usize,
}

/// Shared cache of every view the client has fetched.
///
/// Cloning is cheap and clones share state. All access is synchronous; no
/// lock is held across an await point.
#[derive(Clone)]
pub struct ViewCache {
  views: Arc<Mutex<Views>>,
  /// How long before fetched data is considered stale
  stale_time: Duration,
}

impl Default for ViewCache {
  fn default() -> Self {
    Self::new()
  }
}

impl ViewCache {
  pub fn new() -> Self {
    Self {
      views: Arc::new(Mutex::new(Views::default())),
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn lock(&self) -> MutexGuard<'_, Views> {
    self.views.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &ViewKey) -> Option<ViewData> {
    self.lock().slots.get(key).map(|slot| slot.data.clone())
  }

  pub fn contains(&self, key: &ViewKey) -> bool {
    self.lock().slots.contains_key(key)
  }

  pub fn keys(&self) -> Vec<ViewKey> {
    self.lock().slots.keys().cloned().collect()
  }

  /// Write counter of a view; unchanged by fan-outs that change nothing.
  pub fn revision(&self, key: &ViewKey) -> Option<u64> {
    self.lock().slots.get(key).map(|slot| slot.revision)
  }

  /// Replace a view's contents, creating it if needed.
  pub fn set(&self, key: ViewKey, data: ViewData) {
    self.lock().write(key, data);
  }

  pub fn remove(&self, key: &ViewKey) -> Option<ViewData> {
    self.lock().slots.remove(key).map(|slot| slot.data)
  }

  /// Drop every view whose key and contents match. Returns how many went.
  pub fn remove_where(&self, mut pred: impl FnMut(&ViewKey, &ViewData) -> bool) -> usize {
    let mut views = self.lock();
    let before = views.slots.len();
    views.slots.retain(|key, slot| !pred(key, &slot.data));
    before - views.slots.len()
  }

  /// Run `updater` over every view whose key matches `filter`.
  ///
  /// Views are updated one at a time. A view whose data does not have its
  /// declared shape is logged and skipped; the rest of the fan-out continues.
  pub fn for_each_view(
    &self,
    filter: impl Fn(&ViewKey) -> bool,
    mut updater: impl FnMut(&ViewKey, &dyn ShapeAdapter, &mut ViewData) -> Result<bool, Mismatch>,
  ) -> FanOut {
    let mut report = FanOut::default();
    let mut views = self.lock();

    for (key, slot) in views.slots.iter_mut().filter(|(key, _)| filter(key)) {
      report.visited += 1;
      match updater(key, slot.adapter, &mut slot.data) {
        Ok(true) => {
          slot.revision += 1;
          report.changed += 1;
        }
        Ok(false) => {}
        Err(mismatch) => {
          report.failed += 1;
          tracing::warn!(error = %mismatch.at(key), "skipping view during fan-out");
        }
      }
    }

    report
  }

  /// First `Some` returned by `f` over matching views, in key order.
  pub fn find_map<R>(
    &self,
    filter: impl Fn(&ViewKey) -> bool,
    mut f: impl FnMut(&ViewKey, &dyn ShapeAdapter, &ViewData) -> Result<Option<R>, Mismatch>,
  ) -> Option<R> {
    let views = self.lock();
    for (key, slot) in views.slots.iter().filter(|(key, _)| filter(key)) {
      match f(key, slot.adapter, &slot.data) {
        Ok(Some(found)) => return Some(found),
        Ok(None) => {}
        Err(mismatch) => {
          tracing::warn!(error = %mismatch.at(key), "skipping view during lookup");
        }
      }
    }
    None
  }

  // ==========================================================================
  // Fetch tracking
  // ==========================================================================

  /// Register an outgoing fetch for `key`.
  pub fn begin_fetch(&self, key: ViewKey) -> FetchTicket {
    let mut views = self.lock();
    let generation = *views.generations.entry(key.clone()).or_insert(0);
    FetchTicket { key, generation }
  }

  /// Store a fetch result unless the fetch was cancelled since it began.
  ///
  /// The generation check and the write happen under one lock, so a cancel
  /// and a local write cannot slip in between them.
  pub fn complete_fetch(&self, ticket: FetchTicket, data: ViewData) -> bool {
    let mut views = self.lock();
    let current = views.generations.get(ticket.key()).copied().unwrap_or(0);
    if current != ticket.generation {
      tracing::warn!(view = %ticket.key(), "discarding result of cancelled fetch");
      return false;
    }
    views.write(ticket.key, data);
    true
  }

  /// Stop trusting every in-flight fetch whose key matches. Returns how
  /// many keys were affected.
  pub fn cancel(&self, filter: impl Fn(&ViewKey) -> bool) -> usize {
    let mut views = self.lock();
    let mut cancelled = 0;
    for (_, generation) in views.generations.iter_mut().filter(|(key, _)| filter(key)) {
      *generation += 1;
      cancelled += 1;
    }
    cancelled
  }

  /// Mark matching views stale so the next read refetches them.
  pub fn invalidate(&self, filter: impl Fn(&ViewKey) -> bool) -> usize {
    let mut views = self.lock();
    let mut invalidated = 0;
    for (_, slot) in views.slots.iter_mut().filter(|(key, _)| filter(key)) {
      slot.stale = true;
      invalidated += 1;
    }
    invalidated
  }

  pub fn is_stale(&self, key: &ViewKey) -> bool {
    let views = self.lock();
    match views.slots.get(key) {
      Some(slot) => slot.stale || Utc::now() - slot.updated_at > self.stale_time,
      None => true,
    }
  }

  /// Read a view with a cache-first strategy.
  ///
  /// 1. Fresh cache is returned immediately
  /// 2. Stale, invalidated or missing views are fetched
  /// 3. On fetch failure, stale cache is returned (offline mode)
  /// 4. A fetch cancelled while in flight is not stored
  pub async fn fetch_view<F, Fut, E>(
    &self,
    key: &ViewKey,
    fetcher: F,
  ) -> Result<CacheResult<ViewData>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ViewData, E>>,
  {
    let cached = self.cached(key);
    if let Some((data, cached_at)) = &cached {
      if !self.is_stale(key) {
        return Ok(CacheResult::from_cache(data.clone(), *cached_at));
      }
    }

    let ticket = self.begin_fetch(key.clone());
    match fetcher().await {
      Ok(data) => {
        if self.complete_fetch(ticket, data.clone()) {
          return Ok(CacheResult::from_network(data));
        }
        match self.cached(key) {
          Some((current, cached_at)) => Ok(CacheResult::superseded(current, Some(cached_at))),
          None => Ok(CacheResult::superseded(data, None)),
        }
      }
      // Re-read: local writes may have landed while the fetch was in flight.
      Err(err) => match self.cached(key) {
        Some((data, cached_at)) => {
          tracing::debug!(view = %key, "fetch failed, serving stale cache");
          Ok(CacheResult::offline(data, cached_at))
        }
        None => Err(err),
      },
    }
  }

  fn cached(&self, key: &ViewKey) -> Option<(ViewData, DateTime<Utc>)> {
    self
      .lock()
      .slots
      .get(key)
      .map(|slot| (slot.data.clone(), slot.updated_at))
  }

  // ==========================================================================
  // Persistence
  // ==========================================================================

  /// Copy every view out for storage.
  pub fn export(&self) -> Vec<StoredView> {
    self
      .lock()
      .slots
      .iter()
      .map(|(key, slot)| StoredView {
        key: key.clone(),
        data: slot.data.clone(),
        stale: slot.stale,
        cached_at: slot.updated_at,
      })
      .collect()
  }

  /// Load stored views, replacing any cached view with the same key.
  pub fn restore(&self, stored: Vec<StoredView>) {
    let mut views = self.lock();
    for view in stored {
      let slot = ViewSlot::new(&view.key, view.data, view.stale, view.cached_at);
      views.slots.insert(view.key, slot);
    }
  }
}
