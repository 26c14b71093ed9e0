use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;
use crate::model::db::{candidate::Candidate, position::Position};
use crate::model::mongodb::{serde_string_map, Id};
use crate::session::{BallotCandidate, BallotPosition, BallotSession, SessionState};

/// Request body for opening a ballot session.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub voter_code: String,
}

/// Request body for recording a selection on the current position.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub position_id: Id,
    pub candidate_id: Id,
}

/// A snapshot of a ballot session, returned after every session operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub voter_name: String,
    pub state: SessionState,
    /// Index of the position currently on screen.
    pub step: usize,
    pub position_count: usize,
    pub remaining_seconds: u32,
    pub time_warning: bool,
    #[serde(with = "serde_string_map")]
    pub selections: HashMap<ApiId, ApiId>,
    pub positions: Vec<BallotPositionView>,
}

impl SessionView {
    pub fn new(session_id: &str, session: &BallotSession) -> Self {
        Self {
            session_id: session_id.to_string(),
            voter_name: session.voter_name().to_string(),
            state: session.state(),
            step: session.step(),
            position_count: session.positions().len(),
            remaining_seconds: session.remaining_seconds(),
            time_warning: session.in_warning_window(),
            selections: session
                .selections()
                .iter()
                .map(|(position, candidate)| ((*position).into(), (*candidate).into()))
                .collect(),
            positions: session.positions().iter().map(Into::into).collect(),
        }
    }
}

/// A position as rendered on the ballot screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotPositionView {
    pub id: ApiId,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub candidates: Vec<BallotCandidateView>,
}

impl From<&BallotPosition> for BallotPositionView {
    fn from(position: &BallotPosition) -> Self {
        Self {
            id: position.id.into(),
            title: position.title.clone(),
            description: position.description.clone(),
            category: position.category.clone(),
            candidates: position.candidates.iter().map(Into::into).collect(),
        }
    }
}

/// A candidate as rendered on the ballot screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotCandidateView {
    pub id: ApiId,
    pub name: String,
    pub gender: Option<String>,
    pub party: Option<String>,
}

impl From<&BallotCandidate> for BallotCandidateView {
    fn from(candidate: &BallotCandidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name.clone(),
            gender: candidate.gender.clone(),
            party: candidate.party.clone(),
        }
    }
}

impl From<Candidate> for BallotCandidate {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            gender: candidate.candidate.gender,
            party: candidate.candidate.party,
        }
    }
}

/// Assemble ballot positions from positions (in ballot order) and their
/// candidates. Candidates keep their fetch order within each position.
pub fn to_ballot_positions(
    positions: Vec<Position>,
    candidates: Vec<Candidate>,
) -> Vec<BallotPosition> {
    let mut by_position: HashMap<Id, Vec<BallotCandidate>> = HashMap::new();
    for candidate in candidates {
        by_position
            .entry(candidate.position_id)
            .or_default()
            .push(candidate.into());
    }

    positions
        .into_iter()
        .map(|position| {
            let category = position.category_label().to_string();
            BallotPosition {
                id: position.id,
                title: position.position.title,
                description: position.position.description,
                category,
                candidates: by_position.remove(&position.id).unwrap_or_default(),
            }
        })
        .collect()
}
