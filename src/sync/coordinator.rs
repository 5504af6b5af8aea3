//! Runs one user action end to end: cancel racing fetches, snapshot, apply
//! optimistically, call the server, then replace with the server's answer or
//! roll back.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

use crate::cache::{ViewCache, ViewData};
use crate::error::SyncError;
use crate::mastodon::{
  Conversation, Endpoint, Poll, Relationship, Reply, Status, Transport, ViewCategory, ViewKey,
};

use super::locator::{self, Snapshot};
use super::propagate::{self, on_status_surface};

// ============================================================================
// Actions
// ============================================================================

/// Reversible actions on a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
  Favourite,
  Unfavourite,
  Reblog,
  Unreblog,
  Bookmark,
  Unbookmark,
  Pin,
  Unpin,
  /// Mute notifications from the status's conversation
  Mute,
  Unmute,
}

impl StatusAction {
  pub fn endpoint(self, id: &str) -> Endpoint {
    let id = id.to_string();
    match self {
      Self::Favourite => Endpoint::Favourite { id },
      Self::Unfavourite => Endpoint::Unfavourite { id },
      Self::Reblog => Endpoint::Reblog { id },
      Self::Unreblog => Endpoint::Unreblog { id },
      Self::Bookmark => Endpoint::Bookmark { id },
      Self::Unbookmark => Endpoint::Unbookmark { id },
      Self::Pin => Endpoint::Pin { id },
      Self::Unpin => Endpoint::Unpin { id },
      Self::Mute => Endpoint::MuteConversation { id },
      Self::Unmute => Endpoint::UnmuteConversation { id },
    }
  }

  /// Local guess at the server's answer. Counters only move when the flag
  /// actually flips, and never drop below zero.
  pub fn optimistic(self, status: &Status) -> Status {
    let mut next = status.clone();
    match self {
      Self::Favourite if !next.favourited => {
        next.favourited = true;
        next.favourites_count += 1;
      }
      Self::Unfavourite => {
        if next.favourited {
          next.favourites_count = next.favourites_count.saturating_sub(1);
        }
        next.favourited = false;
      }
      Self::Reblog if !next.reblogged => {
        next.reblogged = true;
        next.reblogs_count += 1;
      }
      Self::Unreblog => {
        if next.reblogged {
          next.reblogs_count = next.reblogs_count.saturating_sub(1);
        }
        next.reblogged = false;
      }
      Self::Bookmark => next.bookmarked = true,
      Self::Unbookmark => next.bookmarked = false,
      Self::Pin => next.pinned = true,
      Self::Unpin => next.pinned = false,
      Self::Mute => next.muted = true,
      Self::Unmute => next.muted = false,
      Self::Favourite | Self::Reblog => {}
    }
    next
  }

  fn touches_pinned(self) -> bool {
    matches!(self, Self::Pin | Self::Unpin)
  }
}

/// Actions on the relationship with another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipAction {
  Follow,
  Unfollow,
  Block,
  Unblock,
  Mute,
  Unmute,
  AuthorizeFollowRequest,
  RejectFollowRequest,
}

impl RelationshipAction {
  pub fn endpoint(self, account_id: &str) -> Endpoint {
    let account_id = account_id.to_string();
    match self {
      Self::Follow => Endpoint::Follow { account_id },
      Self::Unfollow => Endpoint::Unfollow { account_id },
      Self::Block => Endpoint::Block { account_id },
      Self::Unblock => Endpoint::Unblock { account_id },
      Self::Mute => Endpoint::Mute { account_id },
      Self::Unmute => Endpoint::Unmute { account_id },
      Self::AuthorizeFollowRequest => Endpoint::AuthorizeFollowRequest { account_id },
      Self::RejectFollowRequest => Endpoint::RejectFollowRequest { account_id },
    }
  }
}

/// What to do with a batch of notification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
  Accept,
  Dismiss,
}

// ============================================================================
// Phases
// ============================================================================

/// Where one mutation attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
  Idle,
  Mutating,
  AwaitingServer,
  Success,
  Error,
}

impl MutationPhase {
  pub fn can_advance_to(self, next: MutationPhase) -> bool {
    use MutationPhase::*;
    matches!(
      (self, next),
      (Idle, Mutating)
        | (Mutating, AwaitingServer)
        | (AwaitingServer, Success)
        | (AwaitingServer, Error)
        | (Success, Idle)
        | (Error, Idle)
    )
  }
}

/// Phase tracker for one invocation; logs every transition.
struct Attempt {
  phase: MutationPhase,
}

impl Attempt {
  fn start() -> Self {
    let mut attempt = Self {
      phase: MutationPhase::Idle,
    };
    attempt.advance(MutationPhase::Mutating);
    attempt
  }

  fn advance(&mut self, next: MutationPhase) {
    if !self.phase.can_advance_to(next) {
      tracing::warn!(from = ?self.phase, to = ?next, "unexpected mutation phase transition");
    }
    tracing::debug!(from = ?self.phase, to = ?next, "mutation phase");
    self.phase = next;
  }

  /// Record how the server call settled and return to idle.
  fn settle<T>(mut self, result: &Result<T, SyncError>) {
    self.advance(match result {
      Ok(_) => MutationPhase::Success,
      Err(_) => MutationPhase::Error,
    });
    self.advance(MutationPhase::Idle);
  }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Orchestrates mutations against a shared [`ViewCache`].
///
/// Collaborators are passed in explicitly; clones share both.
#[derive(Clone)]
pub struct Coordinator {
  cache: ViewCache,
  transport: Arc<dyn Transport>,
}

impl Coordinator {
  pub fn new(cache: ViewCache, transport: Arc<dyn Transport>) -> Self {
    Self { cache, transport }
  }

  pub fn cache(&self) -> &ViewCache {
    &self.cache
  }

  async fn call(&self, endpoint: Endpoint) -> Result<Reply, SyncError> {
    let label = endpoint.to_string();
    self
      .transport
      .execute(endpoint)
      .await
      .map_err(|source| SyncError::Server {
        endpoint: label,
        source,
      })
  }

  /// Favourite, reblog, bookmark, pin or mute a status (or undo one), with
  /// an optimistic local write that is replaced or rolled back at settle.
  ///
  /// Returns the authoritative status.
  pub async fn toggle(&self, action: StatusAction, id: &str) -> Result<Status, SyncError> {
    let span = tracing::debug_span!("toggle", ?action, status = id);
    async move {
      let mut attempt = Attempt::start();

      // Cancellation must land before the snapshot is read.
      self.cache.cancel(on_status_surface);
      let snapshot = locator::find(&self.cache, id);
      if snapshot.is_missing() {
        tracing::debug!("no cached copy to snapshot");
      }

      propagate::apply(&self.cache, id, |status| action.optimistic(status));

      attempt.advance(MutationPhase::AwaitingServer);
      let endpoint = action.endpoint(id);
      let label = endpoint.to_string();
      let result = self
        .call(endpoint)
        .await
        .and_then(|reply| authoritative_status(reply, id, &label));

      match &result {
        Ok(status) => {
          self.cache.set(ViewKey::detail(id), ViewData::status(status.clone()));
          propagate::replace(&self.cache, status);
          if action.touches_pinned() {
            let account_id = status.account.id.clone();
            self.cache.invalidate(|key| {
              matches!(key, ViewKey::PinnedStatuses { account_id: a } if *a == account_id)
            });
          }
        }
        Err(err) => match snapshot.captured() {
          Some(previous) => {
            tracing::info!(error = %err, "rolling back optimistic update");
            propagate::replace(&self.cache, previous);
          }
          None => {
            tracing::info!(error = %err, "mutation failed with nothing to roll back");
          }
        },
      }

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Delete a status. Nothing changes locally until the server confirms.
  pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
    let span = tracing::debug_span!("delete", status = id);
    async move {
      let mut attempt = Attempt::start();
      attempt.advance(MutationPhase::AwaitingServer);

      let result = self
        .call(Endpoint::DeleteStatus { id: id.to_string() })
        .await
        .map(|_| ());

      if result.is_ok() {
        // Fetches started before the delete may still carry the status.
        self.cache.cancel(on_status_surface);
        propagate::remove(&self.cache, id);
      }

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Vote in a poll. The poll is only updated from the server's answer; a
  /// failed vote invalidates status lists so they refetch.
  pub async fn vote(&self, poll_id: &str, choices: Vec<usize>) -> Result<Poll, SyncError> {
    let span = tracing::debug_span!("vote", poll = poll_id);
    async move {
      let mut attempt = Attempt::start();
      attempt.advance(MutationPhase::AwaitingServer);

      let endpoint = Endpoint::VotePoll {
        id: poll_id.to_string(),
        choices,
      };
      let label = endpoint.to_string();
      let result = self.call(endpoint).await.and_then(|reply| match reply {
        Reply::Poll(poll) => Ok(poll),
        other => Err(unexpected(&label, &other)),
      });

      match &result {
        Ok(poll) => {
          propagate::apply_poll(&self.cache, poll);
        }
        Err(err) => {
          tracing::info!(error = %err, "vote failed, invalidating status lists");
          propagate::invalidate_status_lists(&self.cache);
        }
      }

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Follow, block, mute (and their inverses) or answer a follow request.
  ///
  /// Relationship batches are keyed by arbitrary id lists and cannot be
  /// patched, so every batch that includes the account is invalidated.
  pub async fn relationship(
    &self,
    action: RelationshipAction,
    account_id: &str,
  ) -> Result<Relationship, SyncError> {
    let span = tracing::debug_span!("relationship", ?action, account = account_id);
    async move {
      let mut attempt = Attempt::start();
      attempt.advance(MutationPhase::AwaitingServer);

      let endpoint = action.endpoint(account_id);
      let label = endpoint.to_string();
      let result = self.call(endpoint).await.and_then(|reply| match reply {
        Reply::Relationship(relationship) => Ok(relationship),
        other => Err(unexpected(&label, &other)),
      });

      if result.is_ok() {
        let count = self.cache.invalidate(|key| match key {
          ViewKey::Relationships { ids } => ids.iter().any(|id| id == account_id),
          _ => false,
        });
        tracing::debug!(count, "invalidated relationship batches");
      }

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Accept or dismiss notification requests in bulk.
  ///
  /// They leave the requests list immediately; the list is restored if the
  /// server refuses. Summary views are invalidated either way.
  pub async fn resolve_requests(
    &self,
    action: RequestAction,
    ids: &[String],
  ) -> Result<(), SyncError> {
    let span = tracing::debug_span!("resolve_requests", ?action, count = ids.len());
    async move {
      let mut attempt = Attempt::start();
      let is_requests = |key: &ViewKey| key.category() == ViewCategory::NotificationRequests;

      self.cache.cancel(is_requests);
      let key = ViewKey::NotificationRequests;
      let snapshot: Snapshot<ViewData> = self.cache.get(&key).into();

      propagate::remove_entries(&self.cache, ViewCategory::NotificationRequests, ids);

      attempt.advance(MutationPhase::AwaitingServer);
      let endpoint = match action {
        RequestAction::Accept => Endpoint::AcceptNotificationRequests { ids: ids.to_vec() },
        RequestAction::Dismiss => Endpoint::DismissNotificationRequests { ids: ids.to_vec() },
      };
      let result = self.call(endpoint).await.map(|_| ());

      if let (Err(err), Snapshot::Captured(previous)) = (&result, snapshot) {
        tracing::info!(error = %err, "restoring notification requests");
        self.cache.set(key, previous);
      }
      self.cache.invalidate(|key| {
        matches!(
          key.category(),
          ViewCategory::NotificationPolicy | ViewCategory::Notifications
        )
      });

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Mark a conversation read, optimistically.
  pub async fn mark_conversation_read(&self, id: &str) -> Result<Conversation, SyncError> {
    let span = tracing::debug_span!("mark_conversation_read", conversation = id);
    async move {
      let mut attempt = Attempt::start();

      self
        .cache
        .cancel(|key| key.category() == ViewCategory::Conversations);
      let snapshot = locator::find_conversation(&self.cache, id);

      propagate::apply_conversation(&self.cache, id, |c| Conversation {
        unread: false,
        ..c.clone()
      });

      attempt.advance(MutationPhase::AwaitingServer);
      let endpoint = Endpoint::ReadConversation { id: id.to_string() };
      let label = endpoint.to_string();
      let result = self.call(endpoint).await.and_then(|reply| match reply {
        Reply::Conversation(conversation) => Ok(conversation),
        other => Err(unexpected(&label, &other)),
      });

      match (&result, &snapshot) {
        (Ok(conversation), _) => {
          propagate::apply_conversation(&self.cache, id, |_| conversation.clone());
        }
        (Err(err), Snapshot::Captured(previous)) => {
          tracing::info!(error = %err, "rolling back conversation read");
          propagate::apply_conversation(&self.cache, id, |_| previous.clone());
        }
        (Err(_), Snapshot::Missing) => {}
      }

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }

  /// Report an account. A one-shot acknowledgment; the cache is not touched.
  pub async fn report(
    &self,
    account_id: &str,
    status_ids: Vec<String>,
    comment: String,
  ) -> Result<(), SyncError> {
    let span = tracing::debug_span!("report", account = account_id, statuses = status_ids.len());
    async move {
      let mut attempt = Attempt::start();
      attempt.advance(MutationPhase::AwaitingServer);

      let result = self
        .call(Endpoint::Report {
          account_id: account_id.to_string(),
          status_ids,
          comment,
        })
        .await
        .map(|_| ());

      attempt.settle(&result);
      result
    }
    .instrument(span)
    .await
  }
}

fn unexpected(endpoint: &str, reply: &Reply) -> SyncError {
  SyncError::UnexpectedReply {
    endpoint: endpoint.to_string(),
    reply: reply.kind(),
  }
}

/// The copy of `id` in a status reply. Reblogging answers with the new
/// wrapper, so the target is unwrapped.
fn authoritative_status(reply: Reply, id: &str, endpoint: &str) -> Result<Status, SyncError> {
  match reply {
    Reply::Status(status) => match status.resolve(id) {
      Some(target) => Ok(target.clone()),
      None => Err(SyncError::UnexpectedReply {
        endpoint: endpoint.to_string(),
        reply: "unrelated status",
      }),
    },
    other => Err(unexpected(endpoint, &other)),
  }
}
