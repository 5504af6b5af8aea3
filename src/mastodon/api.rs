//! The transport seam: one endpoint per mutation, answered with the
//! authoritative entity.
//!
//! The engine never speaks HTTP itself. Hosts implement [`Transport`] on top
//! of whatever client they already use.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::{Conversation, Poll, Relationship, Status};

/// A mutation request the server is asked to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "endpoint", rename_all = "snake_case")]
pub enum Endpoint {
  Favourite { id: String },
  Unfavourite { id: String },
  Reblog { id: String },
  Unreblog { id: String },
  Bookmark { id: String },
  Unbookmark { id: String },
  Pin { id: String },
  Unpin { id: String },
  MuteConversation { id: String },
  UnmuteConversation { id: String },
  DeleteStatus { id: String },
  VotePoll { id: String, choices: Vec<usize> },
  Follow { account_id: String },
  Unfollow { account_id: String },
  Block { account_id: String },
  Unblock { account_id: String },
  Mute { account_id: String },
  Unmute { account_id: String },
  AuthorizeFollowRequest { account_id: String },
  RejectFollowRequest { account_id: String },
  AcceptNotificationRequests { ids: Vec<String> },
  DismissNotificationRequests { ids: Vec<String> },
  ReadConversation { id: String },
  Report {
    account_id: String,
    status_ids: Vec<String>,
    comment: String,
  },
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Favourite { id } => write!(f, "POST /api/v1/statuses/{}/favourite", id),
      Self::Unfavourite { id } => write!(f, "POST /api/v1/statuses/{}/unfavourite", id),
      Self::Reblog { id } => write!(f, "POST /api/v1/statuses/{}/reblog", id),
      Self::Unreblog { id } => write!(f, "POST /api/v1/statuses/{}/unreblog", id),
      Self::Bookmark { id } => write!(f, "POST /api/v1/statuses/{}/bookmark", id),
      Self::Unbookmark { id } => write!(f, "POST /api/v1/statuses/{}/unbookmark", id),
      Self::Pin { id } => write!(f, "POST /api/v1/statuses/{}/pin", id),
      Self::Unpin { id } => write!(f, "POST /api/v1/statuses/{}/unpin", id),
      Self::MuteConversation { id } => write!(f, "POST /api/v1/statuses/{}/mute", id),
      Self::UnmuteConversation { id } => write!(f, "POST /api/v1/statuses/{}/unmute", id),
      Self::DeleteStatus { id } => write!(f, "DELETE /api/v1/statuses/{}", id),
      Self::VotePoll { id, .. } => write!(f, "POST /api/v1/polls/{}/votes", id),
      Self::Follow { account_id } => write!(f, "POST /api/v1/accounts/{}/follow", account_id),
      Self::Unfollow { account_id } => write!(f, "POST /api/v1/accounts/{}/unfollow", account_id),
      Self::Block { account_id } => write!(f, "POST /api/v1/accounts/{}/block", account_id),
      Self::Unblock { account_id } => write!(f, "POST /api/v1/accounts/{}/unblock", account_id),
      Self::Mute { account_id } => write!(f, "POST /api/v1/accounts/{}/mute", account_id),
      Self::Unmute { account_id } => write!(f, "POST /api/v1/accounts/{}/unmute", account_id),
      Self::AuthorizeFollowRequest { account_id } => {
        write!(f, "POST /api/v1/follow_requests/{}/authorize", account_id)
      }
      Self::RejectFollowRequest { account_id } => {
        write!(f, "POST /api/v1/follow_requests/{}/reject", account_id)
      }
      Self::AcceptNotificationRequests { ids } => {
        write!(f, "POST /api/v1/notifications/requests/accept ({} ids)", ids.len())
      }
      Self::DismissNotificationRequests { ids } => {
        write!(f, "POST /api/v1/notifications/requests/dismiss ({} ids)", ids.len())
      }
      Self::ReadConversation { id } => write!(f, "POST /api/v1/conversations/{}/read", id),
      Self::Report { account_id, .. } => write!(f, "POST /api/v1/reports (account {})", account_id),
    }
  }
}

/// What the server answered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
  Status(Status),
  Poll(Poll),
  Relationship(Relationship),
  Conversation(Conversation),
  /// Acknowledgment with no payload (delete, report, bulk requests)
  Ack,
}

impl Reply {
  /// Short name of the payload kind, for error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Status(_) => "status",
      Self::Poll(_) => "poll",
      Self::Relationship(_) => "relationship",
      Self::Conversation(_) => "conversation",
      Self::Ack => "ack",
    }
  }
}

/// A failed call, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
  /// HTTP status, when the failure came from the server
  pub status: Option<u16>,
  pub message: String,
}

impl TransportError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      status: None,
      message: message.into(),
    }
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = Some(status);
    self
  }
}

/// Issues mutation requests against the server.
pub trait Transport: Send + Sync {
  fn execute(&self, endpoint: Endpoint) -> BoxFuture<'_, Result<Reply, TransportError>>;
}
