use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::position::Position};

/// A position as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub order_index: u32,
}

/// A position as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub order_index: u32,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        Self {
            id: position.id.into(),
            election_id: position.position.election_id.into(),
            title: position.position.title,
            description: position.position.description,
            category: position.position.category,
            order_index: position.position.order_index,
        }
    }
}
