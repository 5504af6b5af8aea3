//! Scripted replay: seed views, run mutations against canned server
//! replies, and report what the cache looks like afterwards.
//!
//! Scripts are YAML:
//!
//! ```yaml
//! views:
//!   - key: { category: bookmarks }
//!     data:
//!       shape: paginated
//!       data:
//!         - items:
//!             - status: { id: "42", favourites_count: 3 }
//! steps:
//!   - action: toggle
//!     kind: favourite
//!     id: "42"
//!     reply:
//!       ok:
//!         status: { id: "42", favourited: true, favourites_count: 4 }
//! ```

use color_eyre::{eyre::eyre, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{ViewCache, ViewData};
use crate::mastodon::{Endpoint, Reply, Transport, TransportError, ViewKey};
use crate::sync::{
  ingest, Coordinator, RelationshipAction, RequestAction, StatusAction, StreamEvent,
};

// ============================================================================
// Transport
// ============================================================================

/// Transport that answers from a queue of canned replies, in order.
#[derive(Default)]
pub struct ScriptedTransport {
  replies: Mutex<VecDeque<Result<Reply, TransportError>>>,
  calls: Mutex<Vec<Endpoint>>,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a successful reply.
  pub fn reply(self, reply: Reply) -> Self {
    self.push(Ok(reply));
    self
  }

  /// Queue a failure.
  pub fn fail(self, message: &str) -> Self {
    self.push(Err(TransportError::new(message)));
    self
  }

  pub fn push(&self, reply: Result<Reply, TransportError>) {
    self
      .replies
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push_back(reply);
  }

  /// Every endpoint called so far, in order.
  pub fn calls(&self) -> Vec<Endpoint> {
    self
      .calls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl Transport for ScriptedTransport {
  fn execute(&self, endpoint: Endpoint) -> BoxFuture<'_, Result<Reply, TransportError>> {
    let reply = self
      .replies
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .pop_front()
      .unwrap_or_else(|| Err(TransportError::new(format!("no scripted reply for {endpoint}"))));
    self
      .calls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(endpoint);
    future::ready(reply).boxed()
  }
}

// ============================================================================
// Script
// ============================================================================

/// A view present before the first step.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedView {
  pub key: ViewKey,
  pub data: ViewData,
}

/// What the server answers to one step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedReply {
  Ok(Reply),
  Error {
    message: String,
    #[serde(default)]
    status: Option<u16>,
  },
}

impl From<ScriptedReply> for Result<Reply, TransportError> {
  fn from(reply: ScriptedReply) -> Self {
    match reply {
      ScriptedReply::Ok(reply) => Ok(reply),
      ScriptedReply::Error { message, status } => {
        let error = TransportError::new(message);
        Err(match status {
          Some(status) => error.with_status(status),
          None => error,
        })
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
  Toggle {
    kind: StatusAction,
    id: String,
  },
  Delete {
    id: String,
  },
  Vote {
    poll_id: String,
    choices: Vec<usize>,
  },
  Relationship {
    kind: RelationshipAction,
    account_id: String,
  },
  ResolveRequests {
    kind: RequestAction,
    ids: Vec<String>,
  },
  MarkConversationRead {
    id: String,
  },
  Report {
    account_id: String,
    #[serde(default)]
    status_ids: Vec<String>,
    #[serde(default)]
    comment: String,
  },
  /// A streamed event; no server call
  Stream {
    event: StreamEvent,
  },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
  #[serde(flatten)]
  pub action: Action,
  #[serde(default)]
  pub reply: Option<ScriptedReply>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
  #[serde(default)]
  pub views: Vec<SeedView>,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl Script {
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read script {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("{}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse script: {}", e))
  }
}

// ============================================================================
// Replay
// ============================================================================

/// How one step settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
  Settled { value: serde_json::Value },
  Failed { error: String },
  /// A streamed event; `changed` views were touched
  Ingested { changed: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
  pub step: usize,
  pub action: Action,
  #[serde(flatten)]
  pub result: StepResult,
}

/// Runs scripts against one cache.
pub struct Replay {
  coordinator: Coordinator,
  transport: Arc<ScriptedTransport>,
}

impl Replay {
  pub fn new(cache: ViewCache) -> Self {
    let transport = Arc::new(ScriptedTransport::new());
    Self {
      coordinator: Coordinator::new(cache, transport.clone()),
      transport,
    }
  }

  pub fn cache(&self) -> &ViewCache {
    self.coordinator.cache()
  }

  /// Seed the script's views, then run its steps in order.
  pub async fn run(&self, script: &Script) -> Result<Vec<Outcome>> {
    for view in &script.views {
      self.cache().set(view.key.clone(), view.data.clone());
    }
    tracing::info!(views = script.views.len(), steps = script.steps.len(), "replaying script");

    let mut outcomes = Vec::with_capacity(script.steps.len());
    for (step, Step { action, reply }) in script.steps.iter().enumerate() {
      if let Some(reply) = reply {
        self.transport.push(reply.clone().into());
      }
      let result = self.dispatch(action).await?;
      outcomes.push(Outcome {
        step,
        action: action.clone(),
        result,
      });
    }
    Ok(outcomes)
  }

  async fn dispatch(&self, action: &Action) -> Result<StepResult> {
    let coordinator = &self.coordinator;
    let settled = match action.clone() {
      Action::Toggle { kind, id } => settle(coordinator.toggle(kind, &id).await)?,
      Action::Delete { id } => settle(coordinator.delete(&id).await)?,
      Action::Vote { poll_id, choices } => settle(coordinator.vote(&poll_id, choices).await)?,
      Action::Relationship { kind, account_id } => {
        settle(coordinator.relationship(kind, &account_id).await)?
      }
      Action::ResolveRequests { kind, ids } => {
        settle(coordinator.resolve_requests(kind, &ids).await)?
      }
      Action::MarkConversationRead { id } => {
        settle(coordinator.mark_conversation_read(&id).await)?
      }
      Action::Report {
        account_id,
        status_ids,
        comment,
      } => settle(coordinator.report(&account_id, status_ids, comment).await)?,
      Action::Stream { event } => StepResult::Ingested {
        changed: ingest(self.cache(), event).changed,
      },
    };
    Ok(settled)
  }
}

fn settle<T: Serialize, E: std::fmt::Display>(result: std::result::Result<T, E>) -> Result<StepResult> {
  Ok(match result {
    Ok(value) => StepResult::Settled {
      value: serde_json::to_value(value).map_err(|e| eyre!("Failed to serialize result: {}", e))?,
    },
    Err(err) => StepResult::Failed {
      error: err.to_string(),
    },
  })
}

/// Every cached view as JSON, for printing after a replay.
pub fn dump(cache: &ViewCache) -> Result<serde_json::Value> {
  let views = cache
    .keys()
    .into_iter()
    .filter_map(|key| {
      let data = cache.get(&key)?;
      Some(serde_json::json!({
        "key": key.to_string(),
        "stale": cache.is_stale(&key),
        "data": data,
      }))
    })
    .collect::<Vec<_>>();
  serde_json::to_value(views).map_err(|e| eyre!("Failed to serialize cache: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mastodon::Status;

  const SCRIPT: &str = r#"
views:
  - key: { category: bookmarks }
    data:
      shape: paginated
      data:
        - items:
            - status: { id: "42", favourites_count: 3 }
            - status: { id: "7" }
steps:
  - action: toggle
    kind: favourite
    id: "42"
    reply:
      ok:
        status: { id: "42", favourited: true, favourites_count: 4 }
  - action: toggle
    kind: bookmark
    id: "42"
    reply:
      error: { message: "rate limited", status: 429 }
  - action: delete
    id: "7"
    reply:
      ok: ack
  - action: stream
    event:
      event: update
      payload:
        timeline: { kind: home }
        status: { id: "8" }
"#;

  fn bookmarked(cache: &ViewCache) -> Vec<Status> {
    cache
      .get(&ViewKey::Bookmarks)
      .unwrap()
      .entries()
      .into_iter()
      .filter_map(|e| e.as_status().cloned())
      .collect()
  }

  #[test]
  fn test_parse_script() {
    let script = Script::parse(SCRIPT).unwrap();
    assert_eq!(script.views.len(), 1);
    assert_eq!(script.steps.len(), 4);
    assert_eq!(
      script.steps[0].action,
      Action::Toggle {
        kind: StatusAction::Favourite,
        id: "42".to_string(),
      }
    );
    assert_eq!(
      script.steps[1].reply,
      Some(ScriptedReply::Error {
        message: "rate limited".to_string(),
        status: Some(429),
      })
    );
    assert!(script.steps[3].reply.is_none());
  }

  #[tokio::test]
  async fn test_replay_settles_each_step() {
    let script = Script::parse(SCRIPT).unwrap();
    let replay = Replay::new(ViewCache::new());

    let outcomes = replay.run(&script).await.unwrap();

    assert!(matches!(outcomes[0].result, StepResult::Settled { .. }));
    assert!(
      matches!(&outcomes[1].result, StepResult::Failed { error } if error.contains("rate limited"))
    );
    assert!(matches!(outcomes[2].result, StepResult::Settled { .. }));
    // No home timeline is cached, so nothing to prepend to.
    assert_eq!(outcomes[3].result, StepResult::Ingested { changed: 0 });

    let statuses = bookmarked(replay.cache());
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].favourited);
    assert!(!statuses[0].bookmarked);
    assert_eq!(statuses[0].favourites_count, 4);
  }

  #[tokio::test]
  async fn test_missing_reply_fails_the_step() {
    let script = Script::parse(
      r#"
steps:
  - action: vote
    poll_id: "p"
    choices: [0]
"#,
    )
    .unwrap();
    let replay = Replay::new(ViewCache::new());

    let outcomes = replay.run(&script).await.unwrap();

    assert!(
      matches!(&outcomes[0].result, StepResult::Failed { error } if error.contains("no scripted reply"))
    );
  }

  #[test]
  fn test_scripted_transport_records_calls() {
    let transport = ScriptedTransport::new().reply(Reply::Ack);
    let reply = futures::executor::block_on(transport.execute(Endpoint::DeleteStatus {
      id: "1".to_string(),
    }));

    assert_eq!(reply, Ok(Reply::Ack));
    assert_eq!(
      transport.calls(),
      vec![Endpoint::DeleteStatus {
        id: "1".to_string()
      }]
    );
  }

  #[test]
  fn test_dump_lists_views() {
    let cache = ViewCache::new();
    cache.set(ViewKey::Bookmarks, ViewData::Paginated(vec![]));

    let dumped = dump(&cache).unwrap();
    assert_eq!(dumped.as_array().unwrap().len(), 1);
    assert_eq!(dumped[0]["stale"], false);
  }
}
