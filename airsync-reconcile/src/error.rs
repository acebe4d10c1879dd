//! Error types for airsync-reconcile.

use thiserror::Error;

/// Data errors that fail a single external record.
///
/// Ignoring a record is not an error; these are only raised for records the
/// reconciler would otherwise write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The record's ISO country code is not in the country table.
    #[error("{ident}: unknown country code '{code}'")]
    UnknownCountry { ident: String, code: String },

    /// The record has a blank longitude or latitude.
    #[error("{ident}: missing coordinates")]
    MissingCoordinates { ident: String },
}

impl ReconcileError {
    /// Operational identifier of the failed record.
    pub fn ident(&self) -> &str {
        match self {
            ReconcileError::UnknownCountry { ident, .. }
            | ReconcileError::MissingCoordinates { ident } => ident,
        }
    }
}
