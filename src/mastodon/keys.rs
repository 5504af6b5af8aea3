//! View keys: how each cached slice of server data is addressed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::cache::Shape;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timeline {
  Home,
  Local,
  Federated,
  Hashtag { tag: String },
  List { id: String },
}

/// Which tab of an account's profile a status list belongs to.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccountFilter {
  #[default]
  Posts,
  WithReplies,
  Media,
}

/// Which tab of the infinite search a list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
  Statuses,
  Accounts,
  Hashtags,
}

// ============================================================================
// Keys
// ============================================================================

/// Address of one view: a category plus its parameters.
///
/// Ordering is derived, so iteration over a category is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ViewKey {
  /// A single status opened on its own
  StatusDetail { id: String },
  /// Ancestors and descendants of a status
  Context { id: String },
  Timeline { timeline: Timeline },
  Bookmarks,
  AccountStatuses {
    account_id: String,
    #[serde(default)]
    filter: AccountFilter,
  },
  PinnedStatuses { account_id: String },
  Trending,
  /// One tab of the infinite search
  Search { query: String, kind: SearchKind },
  /// The non-paginated search across every result type
  SearchAll { query: String },
  Conversations,
  NotificationRequests,
  NotificationPolicy,
  Notifications,
  /// A relationship batch, keyed by the exact id list that was requested
  Relationships { ids: Vec<String> },
}

/// A view key with its parameters erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewCategory {
  StatusDetail,
  Context,
  Timeline,
  Bookmarks,
  AccountStatuses,
  PinnedStatuses,
  Trending,
  Search,
  SearchAll,
  Conversations,
  NotificationRequests,
  NotificationPolicy,
  Notifications,
  Relationships,
}

impl ViewCategory {
  /// The physical shape every view of this category holds.
  pub fn shape(self) -> Shape {
    match self {
      Self::StatusDetail | Self::Context | Self::SearchAll | Self::NotificationPolicy => {
        Shape::Singleton
      }
      Self::PinnedStatuses | Self::Relationships => Shape::Flat,
      Self::Timeline
      | Self::Bookmarks
      | Self::AccountStatuses
      | Self::Trending
      | Self::Search
      | Self::Conversations
      | Self::NotificationRequests
      | Self::Notifications => Shape::Paginated,
    }
  }
}

impl ViewKey {
  pub fn category(&self) -> ViewCategory {
    match self {
      Self::StatusDetail { .. } => ViewCategory::StatusDetail,
      Self::Context { .. } => ViewCategory::Context,
      Self::Timeline { .. } => ViewCategory::Timeline,
      Self::Bookmarks => ViewCategory::Bookmarks,
      Self::AccountStatuses { .. } => ViewCategory::AccountStatuses,
      Self::PinnedStatuses { .. } => ViewCategory::PinnedStatuses,
      Self::Trending => ViewCategory::Trending,
      Self::Search { .. } => ViewCategory::Search,
      Self::SearchAll { .. } => ViewCategory::SearchAll,
      Self::Conversations => ViewCategory::Conversations,
      Self::NotificationRequests => ViewCategory::NotificationRequests,
      Self::NotificationPolicy => ViewCategory::NotificationPolicy,
      Self::Notifications => ViewCategory::Notifications,
      Self::Relationships { .. } => ViewCategory::Relationships,
    }
  }

  pub fn shape(&self) -> Shape {
    self.category().shape()
  }

  pub fn timeline(timeline: Timeline) -> Self {
    Self::Timeline { timeline }
  }

  pub fn detail(id: impl Into<String>) -> Self {
    Self::StatusDetail { id: id.into() }
  }

  /// Stable, fixed-length key for persistent storage.
  ///
  /// Distinct keys always hash differently: every parameter is hashed
  /// verbatim and length-prefixed.
  pub fn cache_hash(&self) -> String {
    let parts: Vec<String> = match self {
      Self::StatusDetail { id } => vec!["status".into(), id.clone()],
      Self::Context { id } => vec!["context".into(), id.clone()],
      Self::Timeline { timeline } => match timeline {
        Timeline::Home => vec!["timeline".into(), "home".into()],
        Timeline::Local => vec!["timeline".into(), "local".into()],
        Timeline::Federated => vec!["timeline".into(), "federated".into()],
        Timeline::Hashtag { tag } => vec!["timeline".into(), "tag".into(), tag.clone()],
        Timeline::List { id } => vec!["timeline".into(), "list".into(), id.clone()],
      },
      Self::Bookmarks => vec!["bookmarks".into()],
      Self::AccountStatuses { account_id, filter } => vec![
        "account_statuses".into(),
        account_id.clone(),
        format!("{:?}", filter),
      ],
      Self::PinnedStatuses { account_id } => vec!["pinned".into(), account_id.clone()],
      Self::Trending => vec!["trending".into()],
      Self::Search { query, kind } => vec!["search".into(), format!("{:?}", kind), query.clone()],
      Self::SearchAll { query } => vec!["search_all".into(), query.clone()],
      Self::Conversations => vec!["conversations".into()],
      Self::NotificationRequests => vec!["notification_requests".into()],
      Self::NotificationPolicy => vec!["notification_policy".into()],
      Self::Notifications => vec!["notifications".into()],
      Self::Relationships { ids } => std::iter::once("relationships".to_string())
        .chain(ids.iter().cloned())
        .collect(),
    };

    let mut hasher = Sha256::new();
    for part in &parts {
      hasher.update(format!("{}:", part.len()).as_bytes());
      hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for ViewKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::StatusDetail { id } => write!(f, "status {}", id),
      Self::Context { id } => write!(f, "context of {}", id),
      Self::Timeline { timeline } => match timeline {
        Timeline::Home => write!(f, "home timeline"),
        Timeline::Local => write!(f, "local timeline"),
        Timeline::Federated => write!(f, "federated timeline"),
        Timeline::Hashtag { tag } => write!(f, "#{} timeline", tag),
        Timeline::List { id } => write!(f, "list {} timeline", id),
      },
      Self::Bookmarks => write!(f, "bookmarks"),
      Self::AccountStatuses { account_id, filter } => {
        write!(f, "account {} statuses ({:?})", account_id, filter)
      }
      Self::PinnedStatuses { account_id } => write!(f, "account {} pinned", account_id),
      Self::Trending => write!(f, "trending"),
      Self::Search { query, kind } => write!(f, "search {:?}: {}", kind, query),
      Self::SearchAll { query } => write!(f, "search: {}", query),
      Self::Conversations => write!(f, "conversations"),
      Self::NotificationRequests => write!(f, "notification requests"),
      Self::NotificationPolicy => write!(f, "notification policy"),
      Self::Notifications => write!(f, "notifications"),
      Self::Relationships { ids } => write!(f, "relationships [{}]", ids.join(", ")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_hash_is_stable_and_distinct() {
    let home = ViewKey::timeline(Timeline::Home);
    let local = ViewKey::timeline(Timeline::Local);

    assert_eq!(home.cache_hash(), home.clone().cache_hash());
    assert_ne!(home.cache_hash(), local.cache_hash());
    assert_eq!(home.cache_hash().len(), 64);
  }

  #[test]
  fn test_cache_hash_separates_keys_that_look_alike() {
    let pairs = [
      (
        ViewKey::SearchAll {
          query: "Rust".to_string(),
        },
        ViewKey::SearchAll {
          query: "rust".to_string(),
        },
      ),
      (
        ViewKey::timeline(Timeline::Hashtag {
          tag: "Rust".to_string(),
        }),
        ViewKey::timeline(Timeline::Hashtag {
          tag: "rust ".to_string(),
        }),
      ),
      (
        ViewKey::Relationships {
          ids: vec!["1,2".to_string()],
        },
        ViewKey::Relationships {
          ids: vec!["1".to_string(), "2".to_string()],
        },
      ),
      (
        ViewKey::Relationships {
          ids: vec!["1:2".to_string()],
        },
        ViewKey::Relationships {
          ids: vec!["1".to_string(), "2".to_string()],
        },
      ),
      (
        ViewKey::timeline(Timeline::List {
          id: "home".to_string(),
        }),
        ViewKey::timeline(Timeline::Home),
      ),
    ];

    for (a, b) in pairs {
      assert_ne!(a.cache_hash(), b.cache_hash(), "{} vs {}", a, b);
    }
  }

  #[test]
  fn test_categories_declare_shapes() {
    assert_eq!(ViewKey::detail("1").shape(), Shape::Singleton);
    assert_eq!(
      ViewKey::PinnedStatuses {
        account_id: "a".to_string()
      }
      .shape(),
      Shape::Flat
    );
    assert_eq!(ViewKey::Trending.shape(), Shape::Paginated);
    assert_eq!(
      ViewKey::SearchAll {
        query: "q".to_string()
      }
      .shape(),
      Shape::Singleton
    );
  }

  #[test]
  fn test_key_deserializes_from_yaml() {
    let key: ViewKey = serde_yaml::from_str(
      "category: account_statuses\naccount_id: \"12\"\n",
    )
    .unwrap();
    assert_eq!(
      key,
      ViewKey::AccountStatuses {
        account_id: "12".to_string(),
        filter: AccountFilter::Posts,
      }
    );

    let key: ViewKey =
      serde_yaml::from_str("category: timeline\ntimeline:\n  kind: hashtag\n  tag: rust\n").unwrap();
    assert_eq!(
      key,
      ViewKey::timeline(Timeline::Hashtag {
        tag: "rust".to_string()
      })
    );
  }
}
