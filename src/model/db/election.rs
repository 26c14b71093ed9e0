use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::election::ElectionSpec, mongodb::Id};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    /// At most one election is active at any time; ballot sessions and results
    /// are always drawn from the active one.
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An election ready for insertion into the database.
pub type NewElection = ElectionCore;

impl From<ElectionSpec> for NewElection {
    /// New elections are created inactive; an admin activates them explicitly.
    fn from(spec: ElectionSpec) -> Self {
        Self {
            title: spec.title,
            description: spec.description,
            start_date: spec.start_date,
            end_date: spec.end_date,
            is_active: false,
            created_at: Utc::now(),
        }
    }
}

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_elections_start_inactive() {
        let election = NewElection::from(ElectionSpec::example());
        assert!(!election.is_active);
        assert_eq!("Student Council Election 2026", election.title);
    }
}
