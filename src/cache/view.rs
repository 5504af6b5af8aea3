//! Physical shapes a cached view can take.

use serde::{Deserialize, Serialize};

use crate::mastodon::{
  Account, Context, Conversation, NotificationPolicy, NotificationRequest, Relationship,
  SearchResults, Status, Tag,
};

/// Closed set of physical shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
  /// Ordered pages of entries
  Paginated,
  /// A bare ordered list of entries
  Flat,
  /// One entity or one composite object
  Singleton,
}

/// One item of a list-shaped view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
  Status(Status),
  Conversation(Conversation),
  NotificationRequest(NotificationRequest),
  Account(Account),
  Relationship(Relationship),
  Hashtag(Tag),
}

impl Entry {
  pub fn as_status(&self) -> Option<&Status> {
    match self {
      Self::Status(status) => Some(status),
      _ => None,
    }
  }

  /// Server id of the entity this entry holds.
  pub fn id(&self) -> &str {
    match self {
      Self::Status(s) => &s.id,
      Self::Conversation(c) => &c.id,
      Self::NotificationRequest(r) => &r.id,
      Self::Account(a) => &a.id,
      Self::Relationship(r) => &r.id,
      Self::Hashtag(t) => &t.name,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursors {
  #[serde(default)]
  pub next: Option<String>,
  #[serde(default)]
  pub prev: Option<String>,
}

/// A page as the pagination layer delivers it: either wrapped with cursors,
/// or a bare array (legacy trending responses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Page {
  Keyed {
    items: Vec<Entry>,
    #[serde(default)]
    cursors: Cursors,
  },
  Bare(Vec<Entry>),
}

impl Page {
  pub fn new(items: Vec<Entry>) -> Self {
    Self::Keyed {
      items,
      cursors: Cursors::default(),
    }
  }

  pub fn items(&self) -> &[Entry] {
    match self {
      Self::Keyed { items, .. } => items,
      Self::Bare(items) => items,
    }
  }

  pub fn items_mut(&mut self) -> &mut Vec<Entry> {
    match self {
      Self::Keyed { items, .. } => items,
      Self::Bare(items) => items,
    }
  }
}

/// Content of a singleton view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Singleton {
  Status(Status),
  Context(Context),
  Search(SearchResults),
  Policy(NotificationPolicy),
}

/// Everything one view holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum ViewData {
  Paginated(Vec<Page>),
  Flat(Vec<Entry>),
  Singleton(Singleton),
}

impl ViewData {
  pub fn shape(&self) -> Shape {
    match self {
      Self::Paginated(_) => Shape::Paginated,
      Self::Flat(_) => Shape::Flat,
      Self::Singleton(_) => Shape::Singleton,
    }
  }

  /// A one-page paginated view of statuses.
  pub fn statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
    Self::Paginated(vec![Page::new(
      statuses.into_iter().map(Entry::Status).collect(),
    )])
  }

  /// A flat list of statuses.
  pub fn flat_statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
    Self::Flat(statuses.into_iter().map(Entry::Status).collect())
  }

  pub fn status(status: Status) -> Self {
    Self::Singleton(Singleton::Status(status))
  }

  /// Every entry, across pages, in order. Singletons have none.
  pub fn entries(&self) -> Vec<&Entry> {
    match self {
      Self::Paginated(pages) => pages.iter().flat_map(|p| p.items()).collect(),
      Self::Flat(entries) => entries.iter().collect(),
      Self::Singleton(_) => Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_accepts_keyed_and_bare_shapes() {
    let keyed: Page =
      serde_json::from_str(r#"{"items":[{"status":{"id":"1"}}],"cursors":{"next":"abc"}}"#)
        .unwrap();
    let bare: Page = serde_json::from_str(r#"[{"status":{"id":"2"}}]"#).unwrap();

    assert!(matches!(keyed, Page::Keyed { .. }));
    assert_eq!(keyed.items()[0].id(), "1");
    assert!(matches!(bare, Page::Bare(_)));
    assert_eq!(bare.items()[0].id(), "2");
  }

  #[test]
  fn test_entries_flattens_pages() {
    let data = ViewData::Paginated(vec![
      Page::new(vec![Entry::Status(Status {
        id: "1".to_string(),
        ..Default::default()
      })]),
      Page::Bare(vec![Entry::Status(Status {
        id: "2".to_string(),
        ..Default::default()
      })]),
    ]);

    let ids: Vec<&str> = data.entries().into_iter().map(Entry::id).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert!(ViewData::status(Status::default()).entries().is_empty());
  }
}
