//! # airsync-reconcile
//!
//! Matching of external airport records against the registry.
//!
//! Build a [`RegistryIndex`] once from the registry snapshot, wrap it in a
//! [`Reconciler`], then call [`Reconciler::reconcile`] for every external
//! record in input order. Each call returns an [`AuditRecord`] holding the
//! [`MutationIntent`]s the persistence layer must carry out.

pub mod audit;
pub mod error;
pub mod index;
pub mod intent;
pub mod reconciler;

pub use audit::{AuditRecord, Decision, IgnoreReason};
pub use error::ReconcileError;
pub use index::{CountryNameIndex, RegistryIndex};
pub use intent::{MutationIntent, UpdateFields, AIRPORT_KIND, SOURCE_TAG};
pub use reconciler::Reconciler;
