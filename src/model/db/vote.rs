use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core vote data, as stored in the database.
///
/// One document per (voter, position); the unique index on that pair is the
/// backstop for the session layer's single-vote guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub candidate_id: Id,
    pub position_id: Id,
    pub election_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(voter_id: Id, candidate_id: Id, position_id: Id, election_id: Id) -> Self {
        Self {
            voter_id,
            candidate_id,
            position_id,
            election_id,
            created_at: Utc::now(),
        }
    }
}

/// A vote ready for insertion into the database.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Vote {
        pub fn example(candidate_id: Id, position_id: Id) -> Self {
            Self {
                id: Id::new(),
                vote: VoteCore::new(Id::new(), candidate_id, position_id, Id::new()),
            }
        }

        /// A vote cast at the given whole hour (UTC) on an arbitrary day.
        pub fn example_at_hour(candidate_id: Id, position_id: Id, hour: u32) -> Self {
            use chrono::TimeZone;

            let mut vote = Self::example(candidate_id, position_id);
            vote.vote.created_at = Utc
                .with_ymd_and_hms(2026, 3, 14, hour, 30, 0)
                .single()
                .unwrap();
            vote
        }
    }
}
