pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod mastodon;
pub mod mutation;
pub mod replay;
pub mod sync;

pub use error::SyncError;
