//! Server entities as the client caches them.
//!
//! Only the fields the sync engine reads or writes are modelled; anything
//! else the server sends is dropped on deserialization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
  pub id: String,
  #[serde(default)]
  pub acct: String,
  #[serde(default)]
  pub display_name: String,
}

/// A post. A status with `reblog` set is a wrapper whose real content is
/// the inner status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
  pub id: String,
  #[serde(default)]
  pub account: Account,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub in_reply_to_id: Option<String>,
  #[serde(default)]
  pub reblog: Option<Box<Status>>,
  #[serde(default)]
  pub favourites_count: u64,
  #[serde(default)]
  pub reblogs_count: u64,
  #[serde(default)]
  pub replies_count: u64,
  #[serde(default)]
  pub favourited: bool,
  #[serde(default)]
  pub reblogged: bool,
  #[serde(default)]
  pub bookmarked: bool,
  #[serde(default)]
  pub muted: bool,
  #[serde(default)]
  pub pinned: bool,
  #[serde(default)]
  pub poll: Option<Poll>,
}

impl Status {
  /// True when this status is `id` or wraps `id` as its reblog.
  pub fn targets(&self, id: &str) -> bool {
    self.id == id || self.reblog.as_ref().is_some_and(|inner| inner.id == id)
  }

  /// The copy of `id` carried by this status, unwrapping reblogs.
  pub fn resolve(&self, id: &str) -> Option<&Status> {
    if self.id == id {
      return Some(self);
    }
    self.reblog.as_deref().filter(|inner| inner.id == id)
  }

  /// True when this status or its reblog carries poll `poll_id`.
  pub fn carries_poll(&self, poll_id: &str) -> bool {
    let own = self.poll.as_ref().is_some_and(|p| p.id == poll_id);
    own || self.reblog.as_ref().is_some_and(|inner| inner.carries_poll(poll_id))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PollOption {
  pub title: String,
  #[serde(default)]
  pub votes_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Poll {
  pub id: String,
  #[serde(default)]
  pub expired: bool,
  #[serde(default)]
  pub multiple: bool,
  #[serde(default)]
  pub votes_count: u64,
  #[serde(default)]
  pub voters_count: Option<u64>,
  #[serde(default)]
  pub voted: Option<bool>,
  #[serde(default)]
  pub own_votes: Vec<usize>,
  #[serde(default)]
  pub options: Vec<PollOption>,
}

/// A direct-message thread.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conversation {
  pub id: String,
  #[serde(default)]
  pub unread: bool,
  #[serde(default)]
  pub accounts: Vec<Account>,
  #[serde(default)]
  pub last_status: Option<Status>,
}

/// A filtered-notifications request from one account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
  pub id: String,
  #[serde(default)]
  pub account: Account,
  #[serde(default)]
  pub notifications_count: u64,
}

/// How the current user relates to the account `id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relationship {
  pub id: String,
  #[serde(default)]
  pub following: bool,
  #[serde(default)]
  pub followed_by: bool,
  #[serde(default)]
  pub blocking: bool,
  #[serde(default)]
  pub muting: bool,
  #[serde(default)]
  pub requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
  pub name: String,
}

/// The thread around a status, split at that status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Context {
  #[serde(default)]
  pub ancestors: Vec<Status>,
  #[serde(default)]
  pub descendants: Vec<Status>,
}

/// Result of the non-paginated "all" search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResults {
  #[serde(default)]
  pub accounts: Vec<Account>,
  #[serde(default)]
  pub statuses: Vec<Status>,
  #[serde(default)]
  pub hashtags: Vec<Tag>,
}

/// Counters summarising filtered notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPolicy {
  #[serde(default)]
  pub pending_requests_count: u64,
  #[serde(default)]
  pub pending_notifications_count: u64,
}
