use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_option_chrono_datetime, Id};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The login code handed to the voter, unique across the roll.
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    /// Flipped in the same transaction that records the voter's ballot.
    pub has_voted: bool,
    #[serde(default, with = "serde_option_chrono_datetime")]
    pub voted_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a new voter who has not yet voted.
    pub fn new(code: String, name: String, email: Option<String>) -> Self {
        Self {
            code,
            name,
            email,
            has_voted: false,
            voted_at: None,
            created_at: Utc::now(),
        }
    }
}

/// A voter ready for insertion into the database.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Voter {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                voter: VoterCore::example(),
            }
        }
    }

    impl VoterCore {
        pub fn example() -> Self {
            Self::new(
                "V1234".to_string(),
                "Jamie Smith".to_string(),
                Some("jamie.smith@example.school".to_string()),
            )
        }
    }
}
