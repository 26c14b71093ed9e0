use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::candidate::Candidate, mongodb::Id};

/// A candidate as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub position_id: Id,
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
}

/// Editable candidate fields, for updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateUpdate {
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
}

/// A candidate as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub position_id: ApiId,
    pub name: String,
    pub gender: Option<String>,
    pub party: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            position_id: candidate.candidate.position_id.into(),
            name: candidate.candidate.name,
            gender: candidate.candidate.gender,
            party: candidate.candidate.party,
        }
    }
}

/// A candidate in the admin listing, joined with its position and vote count.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    #[serde(flatten)]
    pub candidate: CandidateDescription,
    pub position_title: String,
    pub votes: u64,
}
