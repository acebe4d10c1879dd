//! # airsync-sync
//!
//! Dataset decoding, transactional registry writes and run orchestration.
//!
//! Call [`run`] to reconcile an OurAirports dataset against the registry, or
//! [`diff_at`] to preview the result as a unified diff.

pub mod diff;
pub mod error;
pub mod journal;
pub mod pipeline;
pub mod source;
pub mod writer;

pub use diff::{diff_at, DiffResult, TableDiff};
pub use error::SyncError;
pub use journal::{DecisionCounts, FailedRecord, Journal};
pub use pipeline::{run, ErrorPolicy, RunOptions, RunSummary};
pub use source::{RecordSource, SourceRecord};
pub use writer::{ExecutionMode, Operation, RegistryWriter, WriteResult};
