use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::candidate::CandidateSpec, mongodb::Id};

/// Party label used when a candidate does not declare one.
pub const INDEPENDENT_PARTY: &str = "Independent";

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub position_id: Id,
    pub name: String,
    pub gender: Option<String>,
    pub party: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CandidateCore {
    /// The party to display and aggregate under.
    pub fn party_label(&self) -> &str {
        self.party.as_deref().unwrap_or(INDEPENDENT_PARTY)
    }
}

/// A candidate ready for insertion into the database.
pub type NewCandidate = CandidateCore;

impl From<CandidateSpec> for NewCandidate {
    fn from(spec: CandidateSpec) -> Self {
        Self {
            position_id: spec.position_id,
            name: spec.name,
            gender: spec.gender,
            party: spec.party,
            created_at: Utc::now(),
        }
    }
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidate {
        pub fn example(position_id: Id, name: &str, party: Option<&str>) -> Self {
            Self {
                id: Id::new(),
                candidate: CandidateCore {
                    position_id,
                    name: name.to_string(),
                    gender: None,
                    party: party.map(str::to_string),
                    created_at: Utc::now(),
                },
            }
        }
    }
}
