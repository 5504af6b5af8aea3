//! Cross-view consistency for mutations and streamed events.

pub mod coordinator;
pub mod live;
pub mod locator;
pub mod propagate;

pub use coordinator::{Coordinator, MutationPhase, RelationshipAction, RequestAction, StatusAction};
pub use live::{ingest, StreamEvent};
pub use locator::Snapshot;
pub use propagate::Removal;
