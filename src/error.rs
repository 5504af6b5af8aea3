//! Errors surfaced by the sync engine.

use thiserror::Error;

use crate::cache::Shape;
use crate::mastodon::TransportError;

#[derive(Debug, Error)]
pub enum SyncError {
  /// The server call failed; revertible actions have already been rolled back.
  #[error("{endpoint} failed: {source}")]
  Server {
    endpoint: String,
    #[source]
    source: TransportError,
  },

  /// The server answered with a payload the action cannot use.
  #[error("{endpoint} answered with unexpected {reply} payload")]
  UnexpectedReply {
    endpoint: String,
    reply: &'static str,
  },

  /// A view's data does not have the shape its key declares.
  #[error("view {key} holds {found:?} data, expected {expected:?}")]
  ShapeMismatch {
    key: String,
    expected: Shape,
    found: Shape,
  },
}

impl SyncError {
  /// True when the failure came from the network or the server.
  pub fn is_server(&self) -> bool {
    matches!(self, Self::Server { .. } | Self::UnexpectedReply { .. })
  }
}
