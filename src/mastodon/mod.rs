//! Mastodon entities, view keys and the transport seam.

pub mod api;
pub mod keys;
pub mod types;

pub use api::{Endpoint, Reply, Transport, TransportError};
pub use keys::{AccountFilter, SearchKind, Timeline, ViewCategory, ViewKey};
pub use types::{
  Account, Context, Conversation, NotificationPolicy, NotificationRequest, Poll, PollOption,
  Relationship, SearchResults, Status, Tag,
};
