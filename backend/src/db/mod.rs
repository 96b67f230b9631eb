//! Persistence layer: snapshot stores, snapshot encoding and configuration.
//!
//! The scheduler treats persistence as a best-effort recovery aid. Loading
//! happens once at startup and saving after every successful mutation; the
//! manager logs and swallows any [`PersistenceError`] these produce.

pub mod config;
pub mod error;
pub mod snapshot;
pub mod stores;

pub use config::{SchedulerConfig, SchedulerSettings};
pub use error::{ErrorContext, PersistenceError, PersistenceResult};
pub use stores::{FileStateStore, MemoryStateStore, StateStore};
