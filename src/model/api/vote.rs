use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::api::id::ApiId;

/// A recorded vote in the admin listing, joined with voter, candidate and
/// position details. Unjoinable references are labelled rather than dropped,
/// so the listing always accounts for every row.
#[derive(Debug, Clone, Serialize)]
pub struct VoteRecord {
    pub id: ApiId,
    pub voter_name: String,
    pub voter_code: String,
    pub candidate_name: String,
    pub position_title: String,
    pub created_at: DateTime<Utc>,
}

/// Label for references whose target has since been deleted.
pub const UNKNOWN_REFERENCE: &str = "(deleted)";

/// Outcome of wiping all votes for a fresh election run.
#[derive(Serialize)]
pub struct ResetOutcome {
    pub votes_deleted: u64,
    pub voters_reset: u64,
}
