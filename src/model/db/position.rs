use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::position::PositionSpec, mongodb::Id};

/// Category label used when a position does not declare one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Core position data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCore {
    pub election_id: Id,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Positions are presented to voters in ascending `order_index`.
    pub order_index: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PositionCore {
    /// The category to display and aggregate under.
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

/// A position ready for insertion into the database.
pub type NewPosition = PositionCore;

impl NewPosition {
    pub fn new(election_id: Id, spec: PositionSpec) -> Self {
        Self {
            election_id,
            title: spec.title,
            description: spec.description,
            category: spec.category,
            order_index: spec.order_index,
            created_at: Utc::now(),
        }
    }
}

/// A position from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub position: PositionCore,
}

impl Deref for Position {
    type Target = PositionCore;

    fn deref(&self) -> &Self::Target {
        &self.position
    }
}

impl DerefMut for Position {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.position
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Position {
        pub fn example(election_id: Id, title: &str, order_index: u32) -> Self {
            Self {
                id: Id::new(),
                position: PositionCore {
                    election_id,
                    title: title.to_string(),
                    description: None,
                    category: Some("Leadership".to_string()),
                    order_index,
                    created_at: Utc::now(),
                },
            }
        }
    }
}
