//! Server-pushed events, folded into the cache with the same fan-out the
//! coordinator uses.

use serde::{Deserialize, Serialize};

use crate::cache::{Entry, FanOut, ViewCache};
use crate::mastodon::{Conversation, Status, Timeline, ViewCategory, ViewKey};

use super::propagate;

/// One event from the streaming API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
  /// A new status on a timeline
  Update { timeline: Timeline, status: Status },
  /// A status was edited
  StatusUpdate(Status),
  Delete(String),
  Conversation(Conversation),
}

/// Apply `event` to every affected view.
pub fn ingest(cache: &ViewCache, event: StreamEvent) -> FanOut {
  match event {
    StreamEvent::Update { timeline, status } => prepend(cache, ViewKey::timeline(timeline), status),
    StreamEvent::StatusUpdate(status) => propagate::replace(cache, &status),
    StreamEvent::Delete(id) => propagate::remove(cache, &id).lists,
    StreamEvent::Conversation(conversation) => upsert_conversation(cache, conversation),
  }
}

fn prepend(cache: &ViewCache, key: ViewKey, status: Status) -> FanOut {
  let report = cache.for_each_view(
    |k| k == &key,
    |_, adapter, data| {
      if adapter
        .find_status(data, &mut |s: &Status| s.id == status.id)?
        .is_some()
      {
        return Ok(false);
      }
      adapter.push_front(data, Entry::Status(status.clone()))
    },
  );
  tracing::debug!(view = %key, status = %status.id, changed = report.changed, "streamed status");
  report
}

/// Move `conversation` to the head of every conversations view, replacing
/// any older copy.
fn upsert_conversation(cache: &ViewCache, conversation: Conversation) -> FanOut {
  cache.for_each_view(
    |key| key.category() == ViewCategory::Conversations,
    |_, adapter, data| {
      adapter.retain_entries(
        data,
        &mut |entry: &Entry| !matches!(entry, Entry::Conversation(c) if c.id == conversation.id),
      )?;
      adapter.push_front(data, Entry::Conversation(conversation.clone()))
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{Page, ViewData};

  fn status(id: &str) -> Status {
    Status {
      id: id.to_string(),
      ..Default::default()
    }
  }

  fn ids(cache: &ViewCache, key: &ViewKey) -> Vec<String> {
    cache
      .get(key)
      .unwrap()
      .entries()
      .into_iter()
      .map(|e| e.id().to_string())
      .collect()
  }

  #[test]
  fn test_update_prepends_once() {
    let cache = ViewCache::new();
    let home = ViewKey::timeline(Timeline::Home);
    let local = ViewKey::timeline(Timeline::Local);
    cache.set(home.clone(), ViewData::statuses([status("1")]));
    cache.set(local.clone(), ViewData::statuses([status("1")]));

    let event = StreamEvent::Update {
      timeline: Timeline::Home,
      status: status("2"),
    };
    assert_eq!(ingest(&cache, event.clone()).changed, 1);
    assert_eq!(ingest(&cache, event).changed, 0);

    assert_eq!(ids(&cache, &home), vec!["2", "1"]);
    assert_eq!(ids(&cache, &local), vec!["1"]);
  }

  #[test]
  fn test_update_into_empty_view_creates_first_page() {
    let cache = ViewCache::new();
    let home = ViewKey::timeline(Timeline::Home);
    cache.set(home.clone(), ViewData::Paginated(vec![]));

    ingest(
      &cache,
      StreamEvent::Update {
        timeline: Timeline::Home,
        status: status("1"),
      },
    );

    assert_eq!(ids(&cache, &home), vec!["1"]);
  }

  #[test]
  fn test_status_update_and_delete() {
    let cache = ViewCache::new();
    cache.set(ViewKey::Bookmarks, ViewData::statuses([status("1"), status("2")]));

    let edited = Status {
      content: "edited".to_string(),
      ..status("1")
    };
    ingest(&cache, StreamEvent::StatusUpdate(edited.clone()));
    let data = cache.get(&ViewKey::Bookmarks).unwrap();
    assert_eq!(data.entries()[0].as_status(), Some(&edited));

    ingest(&cache, StreamEvent::Delete("2".to_string()));
    assert_eq!(ids(&cache, &ViewKey::Bookmarks), vec!["1"]);
  }

  #[test]
  fn test_conversation_moves_to_front() {
    let cache = ViewCache::new();
    let conversation = |id: &str, unread: bool| Conversation {
      id: id.to_string(),
      unread,
      ..Default::default()
    };
    cache.set(
      ViewKey::Conversations,
      ViewData::Paginated(vec![Page::new(vec![
        Entry::Conversation(conversation("a", false)),
        Entry::Conversation(conversation("b", false)),
      ])]),
    );

    ingest(&cache, StreamEvent::Conversation(conversation("b", true)));

    let data = cache.get(&ViewKey::Conversations).unwrap();
    let entries = data.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(*entries[0], Entry::Conversation(conversation("b", true)));
    assert_eq!(entries[1].id(), "a");
  }

  #[test]
  fn test_events_parse_from_json() {
    let event: StreamEvent = serde_json::from_str(
      r#"{"event":"update","payload":{"timeline":{"kind":"home"},"status":{"id":"9"}}}"#,
    )
    .unwrap();
    assert_eq!(
      event,
      StreamEvent::Update {
        timeline: Timeline::Home,
        status: status("9"),
      }
    );
  }
}
