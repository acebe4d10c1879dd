//! Structured audit trail: one [`AuditRecord`] per reconciled record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::MutationIntent;

/// Why a record produced no intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Classified `closed` upstream.
    Closed,
    /// Unmatched, and not a medium/large airport with an ICAO-shaped ident.
    NotEligible,
}

/// Terminal action chosen for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Decision {
    Ignore(IgnoreReason),
    /// Matched by operational code and updated in place.
    UpdateExisting,
    /// Matched by commercial code; its operational code was replaced.
    RecodeExisting,
    /// Matched by operational code; the commercial code was taken from
    /// another entry, whose flights now point at the match.
    TransferAndMerge,
    InsertNew,
}

impl Decision {
    /// Stable label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Ignore(_) => "ignore",
            Decision::UpdateExisting => "update",
            Decision::RecodeExisting => "recode",
            Decision::TransferAndMerge => "transfer",
            Decision::InsertNew => "insert",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Ignore(IgnoreReason::Closed) => write!(f, "ignore (closed)"),
            Decision::Ignore(IgnoreReason::NotEligible) => write!(f, "ignore (not eligible)"),
            other => f.write_str(other.label()),
        }
    }
}

/// Decision plus everything needed to explain it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ident: String,
    pub name: String,
    pub decision: Decision,
    /// Commercial code after sanitation and FAA LID fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commercial_code: Option<String>,
    #[serde(default)]
    pub intents: Vec<MutationIntent>,
    /// Fields the intents changed in the index, in application order.
    #[serde(default)]
    pub changed_fields: Vec<String>,
    /// Human-readable matching notes.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl AuditRecord {
    /// `true` when applying the intents changed nothing.
    pub fn is_noop(&self) -> bool {
        self.changed_fields.is_empty()
    }
}
