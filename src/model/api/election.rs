use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::election::Election};

/// An election as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// An election as returned to clients, with JSON-friendly datetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.election.title,
            description: election.election.description,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            is_active: election.election.is_active,
            created_at: election.election.created_at,
        }
    }
}

#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionSpec {
        pub fn example() -> Self {
            Self {
                title: "Student Council Election 2026".to_string(),
                description: Some("Annual student council election".to_string()),
                start_date: Utc::now(),
                end_date: Utc::now() + Duration::days(3),
            }
        }
    }
}
