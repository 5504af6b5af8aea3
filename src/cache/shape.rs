//! Shape adapters: let propagators walk a view without knowing how it is laid out.
//!
//! Every operation takes a per-item function that returns `Some(new)` to
//! replace an item and `None` to leave it alone, and reports whether the view
//! changed at all. An adapter handed data of another shape returns
//! [`Mismatch`] and does not touch it.

use crate::error::SyncError;
use crate::mastodon::{Status, ViewKey};

use super::view::{Entry, Page, Shape, Singleton, ViewData};

/// Data did not have the shape the adapter handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
  pub expected: Shape,
  pub found: Shape,
}

impl Mismatch {
  /// Attach the offending view key.
  pub fn at(self, key: &ViewKey) -> SyncError {
    SyncError::ShapeMismatch {
      key: key.to_string(),
      expected: self.expected,
      found: self.found,
    }
  }
}

pub type StatusFn<'a> = dyn FnMut(&Status) -> Option<Status> + 'a;
pub type EntryFn<'a> = dyn FnMut(&Entry) -> Option<Entry> + 'a;

/// Shape-specific access to a view's contents.
pub trait ShapeAdapter: Send + Sync {
  fn shape(&self) -> Shape;

  /// First status matching `pred`, in view order.
  fn find_status<'d>(
    &self,
    data: &'d ViewData,
    pred: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<Option<&'d Status>, Mismatch>;

  /// Replace statuses in place. Returns whether anything changed.
  fn map_statuses(&self, data: &mut ViewData, f: &mut StatusFn<'_>) -> Result<bool, Mismatch>;

  /// Drop statuses for which `keep` is false.
  fn retain_statuses(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<bool, Mismatch>;

  /// Replace list entries in place. Singletons have no entries.
  fn map_entries(&self, data: &mut ViewData, f: &mut EntryFn<'_>) -> Result<bool, Mismatch>;

  /// Drop list entries for which `keep` is false.
  fn retain_entries(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Entry) -> bool,
  ) -> Result<bool, Mismatch>;

  /// Insert an entry at the head of the view.
  fn push_front(&self, data: &mut ViewData, entry: Entry) -> Result<bool, Mismatch>;

  fn check(&self, data: &ViewData) -> Result<(), Mismatch> {
    if data.shape() == self.shape() {
      Ok(())
    } else {
      Err(Mismatch {
        expected: self.shape(),
        found: data.shape(),
      })
    }
  }
}

/// The adapter for views of `shape`.
pub fn adapter_for(shape: Shape) -> &'static dyn ShapeAdapter {
  match shape {
    Shape::Paginated => &PaginatedAdapter,
    Shape::Flat => &FlatAdapter,
    Shape::Singleton => &SingletonAdapter,
  }
}

// ============================================================================
// Shared list helpers
// ============================================================================

fn map_list(entries: &mut [Entry], f: &mut EntryFn<'_>) -> bool {
  let mut changed = false;
  for entry in entries.iter_mut() {
    if let Some(next) = f(entry) {
      *entry = next;
      changed = true;
    }
  }
  changed
}

fn retain_list(entries: &mut Vec<Entry>, keep: &mut dyn FnMut(&Entry) -> bool) -> bool {
  let before = entries.len();
  entries.retain(|entry| keep(entry));
  entries.len() != before
}

fn map_status_list(statuses: &mut [Status], f: &mut StatusFn<'_>) -> bool {
  let mut changed = false;
  for status in statuses.iter_mut() {
    if let Some(next) = f(status) {
      *status = next;
      changed = true;
    }
  }
  changed
}

fn retain_status_list(statuses: &mut Vec<Status>, keep: &mut dyn FnMut(&Status) -> bool) -> bool {
  let before = statuses.len();
  statuses.retain(|status| keep(status));
  statuses.len() != before
}

// ============================================================================
// Paginated
// ============================================================================

pub struct PaginatedAdapter;

impl PaginatedAdapter {
  fn pages<'d>(&self, data: &'d ViewData) -> Result<&'d [Page], Mismatch> {
    match data {
      ViewData::Paginated(pages) => Ok(pages),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }

  fn pages_mut<'d>(&self, data: &'d mut ViewData) -> Result<&'d mut Vec<Page>, Mismatch> {
    match data {
      ViewData::Paginated(pages) => Ok(pages),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }
}

impl ShapeAdapter for PaginatedAdapter {
  fn shape(&self) -> Shape {
    Shape::Paginated
  }

  fn find_status<'d>(
    &self,
    data: &'d ViewData,
    pred: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<Option<&'d Status>, Mismatch> {
    Ok(
      self
        .pages(data)?
        .iter()
        .flat_map(|page| page.items())
        .filter_map(Entry::as_status)
        .find(|s| pred(s)),
    )
  }

  fn map_statuses(&self, data: &mut ViewData, f: &mut StatusFn<'_>) -> Result<bool, Mismatch> {
    self.map_entries(data, &mut |entry: &Entry| {
      entry.as_status().and_then(|s| f(s)).map(Entry::Status)
    })
  }

  fn retain_statuses(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<bool, Mismatch> {
    self.retain_entries(data, &mut |entry: &Entry| {
      entry.as_status().map_or(true, |s| keep(s))
    })
  }

  fn map_entries(&self, data: &mut ViewData, f: &mut EntryFn<'_>) -> Result<bool, Mismatch> {
    let mut changed = false;
    for page in self.pages_mut(data)? {
      changed |= map_list(page.items_mut(), f);
    }
    Ok(changed)
  }

  fn retain_entries(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Entry) -> bool,
  ) -> Result<bool, Mismatch> {
    let mut changed = false;
    for page in self.pages_mut(data)? {
      changed |= retain_list(page.items_mut(), keep);
    }
    Ok(changed)
  }

  fn push_front(&self, data: &mut ViewData, entry: Entry) -> Result<bool, Mismatch> {
    let pages = self.pages_mut(data)?;
    match pages.first_mut() {
      Some(first) => first.items_mut().insert(0, entry),
      None => pages.push(Page::new(vec![entry])),
    }
    Ok(true)
  }
}

// ============================================================================
// Flat
// ============================================================================

pub struct FlatAdapter;

impl FlatAdapter {
  fn list<'d>(&self, data: &'d ViewData) -> Result<&'d [Entry], Mismatch> {
    match data {
      ViewData::Flat(entries) => Ok(entries),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }

  fn list_mut<'d>(&self, data: &'d mut ViewData) -> Result<&'d mut Vec<Entry>, Mismatch> {
    match data {
      ViewData::Flat(entries) => Ok(entries),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }
}

impl ShapeAdapter for FlatAdapter {
  fn shape(&self) -> Shape {
    Shape::Flat
  }

  fn find_status<'d>(
    &self,
    data: &'d ViewData,
    pred: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<Option<&'d Status>, Mismatch> {
    Ok(
      self
        .list(data)?
        .iter()
        .filter_map(Entry::as_status)
        .find(|s| pred(s)),
    )
  }

  fn map_statuses(&self, data: &mut ViewData, f: &mut StatusFn<'_>) -> Result<bool, Mismatch> {
    self.map_entries(data, &mut |entry: &Entry| {
      entry.as_status().and_then(|s| f(s)).map(Entry::Status)
    })
  }

  fn retain_statuses(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<bool, Mismatch> {
    self.retain_entries(data, &mut |entry: &Entry| {
      entry.as_status().map_or(true, |s| keep(s))
    })
  }

  fn map_entries(&self, data: &mut ViewData, f: &mut EntryFn<'_>) -> Result<bool, Mismatch> {
    Ok(map_list(self.list_mut(data)?, f))
  }

  fn retain_entries(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Entry) -> bool,
  ) -> Result<bool, Mismatch> {
    Ok(retain_list(self.list_mut(data)?, keep))
  }

  fn push_front(&self, data: &mut ViewData, entry: Entry) -> Result<bool, Mismatch> {
    self.list_mut(data)?.insert(0, entry);
    Ok(true)
  }
}

// ============================================================================
// Singleton
// ============================================================================

/// Statuses inside a detail, a thread context (ancestors and descendants
/// independently) or an "all" search result.
pub struct SingletonAdapter;

impl SingletonAdapter {
  fn inner<'d>(&self, data: &'d ViewData) -> Result<&'d Singleton, Mismatch> {
    match data {
      ViewData::Singleton(inner) => Ok(inner),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }

  fn inner_mut<'d>(&self, data: &'d mut ViewData) -> Result<&'d mut Singleton, Mismatch> {
    match data {
      ViewData::Singleton(inner) => Ok(inner),
      other => Err(Mismatch {
        expected: self.shape(),
        found: other.shape(),
      }),
    }
  }
}

impl ShapeAdapter for SingletonAdapter {
  fn shape(&self) -> Shape {
    Shape::Singleton
  }

  fn find_status<'d>(
    &self,
    data: &'d ViewData,
    pred: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<Option<&'d Status>, Mismatch> {
    let found = match self.inner(data)? {
      Singleton::Status(status) => Some(status).filter(|s| pred(s)),
      Singleton::Context(context) => context
        .ancestors
        .iter()
        .chain(context.descendants.iter())
        .find(|s| pred(s)),
      Singleton::Search(results) => results.statuses.iter().find(|s| pred(s)),
      Singleton::Policy(_) => None,
    };
    Ok(found)
  }

  fn map_statuses(&self, data: &mut ViewData, f: &mut StatusFn<'_>) -> Result<bool, Mismatch> {
    let changed = match self.inner_mut(data)? {
      Singleton::Status(status) => match f(status) {
        Some(next) => {
          *status = next;
          true
        }
        None => false,
      },
      Singleton::Context(context) => {
        let ancestors = map_status_list(&mut context.ancestors, f);
        let descendants = map_status_list(&mut context.descendants, f);
        ancestors || descendants
      }
      Singleton::Search(results) => map_status_list(&mut results.statuses, f),
      Singleton::Policy(_) => false,
    };
    Ok(changed)
  }

  /// A lone status cannot be filtered out of its own view; callers drop the
  /// whole view instead.
  fn retain_statuses(
    &self,
    data: &mut ViewData,
    keep: &mut dyn FnMut(&Status) -> bool,
  ) -> Result<bool, Mismatch> {
    let changed = match self.inner_mut(data)? {
      Singleton::Status(_) | Singleton::Policy(_) => false,
      Singleton::Context(context) => {
        let ancestors = retain_status_list(&mut context.ancestors, keep);
        let descendants = retain_status_list(&mut context.descendants, keep);
        ancestors || descendants
      }
      Singleton::Search(results) => retain_status_list(&mut results.statuses, keep),
    };
    Ok(changed)
  }

  fn map_entries(&self, data: &mut ViewData, _f: &mut EntryFn<'_>) -> Result<bool, Mismatch> {
    self.check(data)?;
    Ok(false)
  }

  fn retain_entries(
    &self,
    data: &mut ViewData,
    _keep: &mut dyn FnMut(&Entry) -> bool,
  ) -> Result<bool, Mismatch> {
    self.check(data)?;
    Ok(false)
  }

  fn push_front(&self, data: &mut ViewData, _entry: Entry) -> Result<bool, Mismatch> {
    self.check(data)?;
    Ok(false)
  }
}
