//! UI-facing mutation triggers.
//!
//! A `Mutation<T>` wraps one coordinator operation so an event loop can
//! fire it and pick up the settled result on a later tick, without awaiting.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = coordinator.clone();
//! let mut favourite = Mutation::new("favourite", move || {
//!     let coordinator = coordinator.clone();
//!     async move { coordinator.toggle(StatusAction::Favourite, "42").await }
//! });
//!
//! favourite.mutate();
//!
//! // In event loop tick
//! if favourite.poll() {
//!     // Settled; re-read the affected views
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;

use crate::error::SyncError;

/// The state of a mutation trigger
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
  /// Not fired yet, or reset
  Idle,
  /// Waiting for the coordinator to settle
  Pending,
  /// Settled with the server's answer
  Success(T),
  /// Settled with an error; optimistic writes were already rolled back
  Error(String),
}

impl<T> MutationState<T> {
  pub fn is_pending(&self) -> bool {
    matches!(self, MutationState::Pending)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      MutationState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type RunnerFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync>;

/// A named, re-fireable mutation.
pub struct Mutation<T> {
  name: &'static str,
  state: MutationState<T>,
  runner: RunnerFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, SyncError>>>,
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new<F, Fut>(name: &'static str, runner: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
  {
    Self {
      name,
      state: MutationState::Idle,
      runner: Box::new(move || Box::pin(runner())),
      receiver: None,
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn state(&self) -> &MutationState<T> {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    self.state.is_pending()
  }

  /// Fire the mutation. The optimistic write happens as soon as the
  /// spawned task runs; the result arrives through [`Mutation::poll`].
  ///
  /// Firing again while pending starts a second, independent invocation
  /// whose result replaces the first.
  pub fn mutate(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;

    let future = (self.runner)();
    let name = self.name();
    tokio::spawn(async move {
      let result = future.await;
      if let Err(err) = &result {
        tracing::debug!(mutation = name, error = %err, "mutation failed");
      }
      // Receiver may have been dropped by reset()
      let _ = tx.send(result);
    });
  }

  /// Pick up a settled result. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = MutationState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = MutationState::Error(error.to_string());
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = MutationState::Error("Mutation task was dropped".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Forget the last result. A pending invocation still settles in the
  /// cache, but its result is no longer reported here.
  pub fn reset(&mut self) {
    self.receiver = None;
    self.state = MutationState::Idle;
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mutation<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("name", &self.name)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mastodon::TransportError;
  use std::time::Duration;

  #[tokio::test]
  async fn test_mutation_success() {
    let mut mutation = Mutation::new("count", || async { Ok(3u64) });
    assert_eq!(mutation.state(), &MutationState::Idle);

    mutation.mutate();
    assert!(mutation.is_pending());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(mutation.poll());
    assert_eq!(mutation.state().data(), Some(&3));
    assert!(!mutation.poll());
  }

  #[tokio::test]
  async fn test_mutation_error_carries_message() {
    let mut mutation: Mutation<()> = Mutation::new("favourite", || async {
      Err(SyncError::Server {
        endpoint: "POST /api/v1/statuses/1/favourite".to_string(),
        source: TransportError::new("rate limited"),
      })
    });

    assert_eq!(mutation.name(), "favourite");
    assert!(format!("{:?}", mutation).contains("favourite"));

    mutation.mutate();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(mutation.poll());
    let error = mutation.state().error().unwrap();
    assert!(error.contains("favourite"), "{error}");
  }

  #[tokio::test]
  async fn test_reset_drops_pending_result() {
    let mut mutation = Mutation::new("slow", || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok(1u8)
    });

    mutation.mutate();
    mutation.reset();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!mutation.poll());
    assert_eq!(mutation.state(), &MutationState::Idle);
  }
}
