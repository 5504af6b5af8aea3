//! Fan one logical change out to every cached copy of an entity.

use crate::cache::{Entry, FanOut, Shape, ViewCache};
use crate::mastodon::{Conversation, Poll, Status, ViewCategory, ViewKey};

/// Categories whose views can hold a copy of a status.
pub const STATUS_SURFACE: &[ViewCategory] = &[
  ViewCategory::StatusDetail,
  ViewCategory::Context,
  ViewCategory::Timeline,
  ViewCategory::Bookmarks,
  ViewCategory::AccountStatuses,
  ViewCategory::PinnedStatuses,
  ViewCategory::Trending,
  ViewCategory::Search,
  ViewCategory::SearchAll,
];

pub fn on_status_surface(key: &ViewKey) -> bool {
  STATUS_SURFACE.contains(&key.category())
}

/// Status lists, as opposed to singletons.
pub fn is_status_list(key: &ViewKey) -> bool {
  on_status_surface(key) && key.shape() != Shape::Singleton
}

/// Apply `transform` to the copy of `id` inside `status`, if it has one.
///
/// A reblog wrapper is cloned with its inner status replaced. Returns `None`
/// when `status` does not carry `id` or the transform changed nothing.
fn rewrite(status: &Status, id: &str, transform: &dyn Fn(&Status) -> Status) -> Option<Status> {
  if status.id == id {
    let next = transform(status);
    return (next != *status).then_some(next);
  }

  let inner = status.reblog.as_deref().filter(|inner| inner.id == id)?;
  let next = transform(inner);
  if next == *inner {
    return None;
  }
  Some(Status {
    reblog: Some(Box::new(next)),
    ..status.clone()
  })
}

/// Apply a pure transform to every copy of status `id` across the status surface.
pub fn apply(cache: &ViewCache, id: &str, transform: impl Fn(&Status) -> Status) -> FanOut {
  let report = cache.for_each_view(on_status_surface, |_, adapter, data| {
    adapter.map_statuses(data, &mut |status: &Status| rewrite(status, id, &transform))
  });

  tracing::debug!(
    status = id,
    visited = report.visited,
    changed = report.changed,
    failed = report.failed,
    "fanned out status update"
  );
  report
}

/// Overwrite every copy of `status` with it.
pub fn replace(cache: &ViewCache, status: &Status) -> FanOut {
  apply(cache, &status.id, |_| status.clone())
}

fn with_poll(status: &Status, poll: &Poll) -> Option<Status> {
  if !status.carries_poll(&poll.id) {
    return None;
  }

  let mut next = status.clone();
  if status.poll.as_ref().is_some_and(|p| p.id == poll.id) {
    next.poll = Some(poll.clone());
  }
  if let Some(inner) = status
    .reblog
    .as_deref()
    .and_then(|inner| with_poll(inner, poll))
  {
    next.reblog = Some(Box::new(inner));
  }
  (next != *status).then_some(next)
}

/// Replace poll `poll.id` wholesale in every status that embeds it.
pub fn apply_poll(cache: &ViewCache, poll: &Poll) -> FanOut {
  let report = cache.for_each_view(on_status_surface, |_, adapter, data| {
    adapter.map_statuses(data, &mut |status: &Status| with_poll(status, poll))
  });

  tracing::debug!(
    poll = %poll.id,
    visited = report.visited,
    changed = report.changed,
    failed = report.failed,
    "fanned out poll update"
  );
  report
}

/// What a removal touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
  pub lists: FanOut,
  pub details_dropped: usize,
  pub contexts_invalidated: usize,
}

/// Remove status `id` everywhere it appears, standalone or as a reblog.
///
/// Thread contexts are not patched: any of them may hold the status as an
/// ancestor or descendant, so all of them are marked stale instead.
pub fn remove(cache: &ViewCache, id: &str) -> Removal {
  let lists = cache.for_each_view(
    |key| {
      on_status_surface(key)
        && !matches!(
          key.category(),
          ViewCategory::Context | ViewCategory::StatusDetail
        )
    },
    |_, adapter, data| adapter.retain_statuses(data, &mut |status: &Status| !status.targets(id)),
  );

  let detail = ViewKey::detail(id);
  let details_dropped = cache.remove_where(|key, _| key == &detail);
  let contexts_invalidated = cache.invalidate(|key| key.category() == ViewCategory::Context);

  tracing::info!(
    status = id,
    changed = lists.changed,
    details_dropped,
    contexts_invalidated,
    "removed status from cache"
  );

  Removal {
    lists,
    details_dropped,
    contexts_invalidated,
  }
}

/// Mark every status list stale.
pub fn invalidate_status_lists(cache: &ViewCache) -> usize {
  let count = cache.invalidate(is_status_list);
  tracing::info!(count, "invalidated status lists");
  count
}

/// Apply `transform` to conversation `id` in the conversations view.
pub fn apply_conversation(
  cache: &ViewCache,
  id: &str,
  transform: impl Fn(&Conversation) -> Conversation,
) -> FanOut {
  cache.for_each_view(
    |key| key.category() == ViewCategory::Conversations,
    |_, adapter, data| {
      adapter.map_entries(data, &mut |entry: &Entry| match entry {
        Entry::Conversation(c) if c.id == id => {
          let next = transform(c);
          (next != *c).then_some(Entry::Conversation(next))
        }
        _ => None,
      })
    },
  )
}

/// Drop entries with any of `ids` from every view of `category`.
pub fn remove_entries(cache: &ViewCache, category: ViewCategory, ids: &[String]) -> FanOut {
  cache.for_each_view(
    |key| key.category() == category,
    |_, adapter, data| {
      adapter.retain_entries(data, &mut |entry: &Entry| {
        !ids.iter().any(|id| id == entry.id())
      })
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{Page, Singleton, ViewData};
  use crate::mastodon::{Context, SearchKind, SearchResults, Timeline};

  fn status(id: &str) -> Status {
    Status {
      id: id.to_string(),
      ..Default::default()
    }
  }

  fn reblog_of(id: &str, inner: Status) -> Status {
    Status {
      id: id.to_string(),
      reblog: Some(Box::new(inner)),
      ..Default::default()
    }
  }

  fn favourited(s: &Status) -> Status {
    Status {
      favourited: true,
      ..s.clone()
    }
  }

  fn all_copies(cache: &ViewCache, id: &str) -> Vec<Status> {
    let mut copies = Vec::new();
    cache.for_each_view(
      |_| true,
      |_, adapter, data| {
        adapter.map_statuses(data, &mut |s: &Status| {
          if let Some(copy) = s.resolve(id) {
            copies.push(copy.clone());
          }
          None
        })
      },
    );
    copies
  }

  /// One copy of "5" in every shape the status surface has.
  fn seeded() -> ViewCache {
    let cache = ViewCache::new();
    cache.set(ViewKey::detail("5"), ViewData::status(status("5")));
    cache.set(
      ViewKey::Context {
        id: "1".to_string(),
      },
      ViewData::Singleton(Singleton::Context(Context {
        ancestors: vec![status("5")],
        descendants: vec![status("6")],
      })),
    );
    cache.set(
      ViewKey::timeline(Timeline::Hashtag {
        tag: "rust".to_string(),
      }),
      ViewData::statuses([reblog_of("100", status("5"))]),
    );
    cache.set(ViewKey::Bookmarks, ViewData::statuses([status("5")]));
    cache.set(
      ViewKey::AccountStatuses {
        account_id: "a".to_string(),
        filter: Default::default(),
      },
      ViewData::statuses([status("5")]),
    );
    cache.set(
      ViewKey::PinnedStatuses {
        account_id: "a".to_string(),
      },
      ViewData::flat_statuses([status("5")]),
    );
    cache.set(
      ViewKey::Trending,
      ViewData::Paginated(vec![Page::Bare(vec![Entry::Status(status("5"))])]),
    );
    cache.set(
      ViewKey::Search {
        query: "q".to_string(),
        kind: SearchKind::Statuses,
      },
      ViewData::statuses([status("5")]),
    );
    cache.set(
      ViewKey::SearchAll {
        query: "q".to_string(),
      },
      ViewData::Singleton(Singleton::Search(SearchResults {
        statuses: vec![status("5")],
        ..Default::default()
      })),
    );
    cache
  }

  #[test]
  fn test_apply_reaches_every_shape() {
    let cache = seeded();
    let report = apply(&cache, "5", favourited);

    assert_eq!(report.changed, 9);
    let copies = all_copies(&cache, "5");
    assert_eq!(copies.len(), 9);
    assert!(copies.iter().all(|s| s.favourited));
  }

  #[test]
  fn test_apply_keeps_reblog_wrapper() {
    let cache = seeded();
    apply(&cache, "5", favourited);

    let key = ViewKey::timeline(Timeline::Hashtag {
      tag: "rust".to_string(),
    });
    let data = cache.get(&key).unwrap();
    let wrapper = data.entries()[0].as_status().unwrap().clone();
    assert_eq!(wrapper.id, "100");
    assert!(!wrapper.favourited);
    assert!(wrapper.reblog.unwrap().favourited);
  }

  #[test]
  fn test_apply_with_no_effect_keeps_revisions() {
    let cache = seeded();
    let before = cache.revision(&ViewKey::Bookmarks);

    let report = apply(&cache, "5", |s| s.clone());

    assert_eq!(report.changed, 0);
    assert_eq!(cache.revision(&ViewKey::Bookmarks), before);
  }

  #[test]
  fn test_apply_poll_updates_original_and_reblog() {
    let poll = Poll {
      id: "p".to_string(),
      ..Default::default()
    };
    let original = Status {
      poll: Some(poll.clone()),
      ..status("5")
    };
    let cache = ViewCache::new();
    cache.set(ViewKey::Bookmarks, ViewData::statuses([original.clone()]));
    cache.set(
      ViewKey::timeline(Timeline::Home),
      ViewData::statuses([reblog_of("100", original)]),
    );

    let voted = Poll {
      voted: Some(true),
      votes_count: 1,
      own_votes: vec![0],
      ..poll
    };
    let report = apply_poll(&cache, &voted);

    assert_eq!(report.changed, 2);
    let copies = all_copies(&cache, "5");
    assert_eq!(copies.len(), 2);
    assert!(copies.iter().all(|s| s.poll.as_ref() == Some(&voted)));
  }

  #[test]
  fn test_remove_filters_lists_and_invalidates_contexts() {
    let cache = seeded();
    let unrelated = ViewKey::Context {
      id: "99".to_string(),
    };
    cache.set(
      unrelated.clone(),
      ViewData::Singleton(Singleton::Context(Context::default())),
    );

    let removal = remove(&cache, "5");

    assert_eq!(removal.details_dropped, 1);
    assert_eq!(removal.contexts_invalidated, 2);
    assert!(!cache.contains(&ViewKey::detail("5")));
    assert!(cache.is_stale(&unrelated));
    // Only the context copy is left, waiting for its refetch.
    assert_eq!(all_copies(&cache, "5").len(), 1);
  }

  #[test]
  fn test_remove_entries_by_id() {
    let cache = ViewCache::new();
    cache.set(
      ViewKey::NotificationRequests,
      ViewData::Paginated(vec![Page::new(vec![
        Entry::NotificationRequest(crate::mastodon::NotificationRequest {
          id: "r1".to_string(),
          ..Default::default()
        }),
        Entry::NotificationRequest(crate::mastodon::NotificationRequest {
          id: "r2".to_string(),
          ..Default::default()
        }),
      ])]),
    );

    let report = remove_entries(
      &cache,
      ViewCategory::NotificationRequests,
      &["r1".to_string()],
    );

    assert_eq!(report.changed, 1);
    let data = cache.get(&ViewKey::NotificationRequests).unwrap();
    let ids: Vec<&str> = data.entries().into_iter().map(Entry::id).collect();
    assert_eq!(ids, vec!["r2"]);
  }
}
