use serde::{Deserialize, Serialize};

use super::auth::{AdminRole, AdminSession, Capability};

/// Raw admin credentials, received on login. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// What the current session is allowed to do, for client-side UI gating.
/// The server re-checks capabilities on every request regardless.
#[derive(Serialize)]
pub struct SessionInfo {
    pub username: String,
    pub role: AdminRole,
    pub capabilities: Vec<Capability>,
}

impl From<&AdminSession> for SessionInfo {
    fn from(session: &AdminSession) -> Self {
        Self {
            username: session.username.clone(),
            role: session.role,
            capabilities: session.role.capabilities().iter().collect(),
        }
    }
}
