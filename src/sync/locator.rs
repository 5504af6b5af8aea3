//! Finds one current copy of an entity, for snapshotting before a mutation.

use crate::cache::{Entry, ViewCache};
use crate::mastodon::{Conversation, Status, ViewCategory, ViewKey};

/// Where statuses are looked for, most authoritative first.
const PRIORITY: &[ViewCategory] = &[
  ViewCategory::Trending,
  ViewCategory::Timeline,
  ViewCategory::Bookmarks,
  ViewCategory::AccountStatuses,
  ViewCategory::PinnedStatuses,
];

/// The pre-mutation copy of an entity, if any view held one.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
  Captured(T),
  /// No cached copy; rollback becomes a no-op
  Missing,
}

impl<T> Snapshot<T> {
  pub fn captured(&self) -> Option<&T> {
    match self {
      Self::Captured(value) => Some(value),
      Self::Missing => None,
    }
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, Self::Missing)
  }
}

impl<T> From<Option<T>> for Snapshot<T> {
  fn from(value: Option<T>) -> Self {
    value.map_or(Self::Missing, Self::Captured)
  }
}

/// First cached copy of status `id`: the detail view, then trending,
/// timelines, bookmarks and account statuses (paginated, then pinned).
///
/// Reblog wrappers are unwrapped, so the returned status always has `id`.
pub fn find(cache: &ViewCache, id: &str) -> Snapshot<Status> {
  let detail = ViewKey::detail(id);
  let mut lookups = std::iter::once(None).chain(PRIORITY.iter().copied().map(Some));

  let found = lookups.find_map(|category| {
    cache.find_map(
      |key| match category {
        None => key == &detail,
        Some(category) => key.category() == category,
      },
      |_, adapter, data| {
        Ok(
          adapter
            .find_status(data, &mut |s: &Status| s.targets(id))?
            .and_then(|s| s.resolve(id))
            .cloned(),
        )
      },
    )
  });

  found.into()
}

/// First cached copy of conversation `id`.
pub fn find_conversation(cache: &ViewCache, id: &str) -> Snapshot<Conversation> {
  cache
    .find_map(
      |key| key.category() == ViewCategory::Conversations,
      |_, _, data| {
        Ok(data.entries().into_iter().find_map(|entry| match entry {
          Entry::Conversation(c) if c.id == id => Some(c.clone()),
          _ => None,
        }))
      },
    )
    .into()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ViewData;
  use crate::mastodon::Timeline;

  fn status(id: &str, favourites_count: u64) -> Status {
    Status {
      id: id.to_string(),
      favourites_count,
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

  #[test]
  fn test_detail_wins_over_lists() {
    let cache = ViewCache::new();
    cache.set(ViewKey::Trending, ViewData::statuses([status("1", 10)]));
    cache.set(ViewKey::detail("1"), ViewData::status(status("1", 20)));

    assert_eq!(find(&cache, "1"), Snapshot::Captured(status("1", 20)));
  }

  #[test]
  fn test_trending_wins_over_timelines() {
    let cache = ViewCache::new();
    cache.set(
      ViewKey::timeline(Timeline::Home),
      ViewData::statuses([status("1", 1)]),
    );
    cache.set(ViewKey::Trending, ViewData::statuses([status("1", 2)]));

    assert_eq!(find(&cache, "1"), Snapshot::Captured(status("1", 2)));
  }

  #[test]
  fn test_unwraps_reblog() {
    let cache = ViewCache::new();
    cache.set(
      ViewKey::timeline(Timeline::Home),
      ViewData::statuses([reblog_of("100", status("7", 3))]),
    );

    assert_eq!(find(&cache, "7"), Snapshot::Captured(status("7", 3)));
  }

  #[test]
  fn test_finds_pinned_flat_list() {
    let cache = ViewCache::new();
    cache.set(
      ViewKey::PinnedStatuses {
        account_id: "a".to_string(),
      },
      ViewData::flat_statuses([status("9", 1)]),
    );

    assert_eq!(find(&cache, "9"), Snapshot::Captured(status("9", 1)));
  }

  #[test]
  fn test_search_views_are_skipped_by_find() {
    let cache = ViewCache::new();
    cache.set(
      ViewKey::Search {
        query: "q".to_string(),
        kind: crate::mastodon::SearchKind::Statuses,
      },
      ViewData::statuses([status("1", 1)]),
    );

    assert!(find(&cache, "1").is_missing());
  }

  #[test]
  fn test_find_conversation() {
    let cache = ViewCache::new();
    let conversation = Conversation {
      id: "c1".to_string(),
      unread: true,
      ..Default::default()
    };
    cache.set(
      ViewKey::Conversations,
      ViewData::Paginated(vec![crate::cache::Page::new(vec![Entry::Conversation(
        conversation.clone(),
      )])]),
    );

    assert_eq!(
      find_conversation(&cache, "c1"),
      Snapshot::Captured(conversation)
    );
    assert!(find_conversation(&cache, "c2").is_missing());
  }
}
