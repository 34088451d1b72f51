//! The sync engine (C3) and derivation pass (C4), §4.3.
//!
//! Pulls each entity kind from an upstream in cursor order, replaces the
//! mirror rows and their junctions batch by batch, retires ids the
//! upstream no longer reports, and then runs the cross-kind derivations
//! (inherited tags, inherited scalars, counts) that only make sense once
//! every kind for an instance has landed.

mod batch;
mod cleanup;
mod derive;
mod error;
mod progress;
mod service;
#[cfg(test)]
mod tests;
mod validate;

pub const LOG_TARGET: &str = "stashcache::sync";

pub use batch::{process_batch, BatchOutcome};
pub use cleanup::{cleanup_deleted, CleanupOutcome};
pub use derive::run_derivations;
pub use error::{SyncError, SyncResult};
pub use progress::{CancelToken, ProgressSink, SyncEvent};
pub use service::{SyncMode, SyncService};
