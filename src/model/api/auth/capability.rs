use serde::Serialize;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// A single action class an authenticated admin may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read results, analytics and reports.
    ViewResults,
    /// Create and modify elections, positions and candidates; reset the election.
    ManageElection,
    /// Manage the voter roll and recorded votes.
    ManageVoters,
}

impl Capability {
    const ALL: [Capability; 3] = [
        Capability::ViewResults,
        Capability::ManageElection,
        Capability::ManageVoters,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::ViewResults => 1,
            Self::ManageElection => 1 << 1,
            Self::ManageVoters => 1 << 2,
        }
    }
}

/// The set of capabilities granted to a session.
///
/// Handlers check against this set, never against roles directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// The contained capabilities, for serialization to clients.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

/// The role of an admin account, stored on the account and embedded in
/// session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum AdminRole {
    /// Read-only access to results, analytics and reports.
    Viewer = 0,
    /// Full control over elections, voters and votes.
    SuperAdmin = 1,
}

impl AdminRole {
    /// The capability set this role grants.
    pub const fn capabilities(self) -> CapabilitySet {
        match self {
            Self::Viewer => CapabilitySet::empty().with(Capability::ViewResults),
            Self::SuperAdmin => CapabilitySet::empty()
                .with(Capability::ViewResults)
                .with(Capability::ManageElection)
                .with(Capability::ManageVoters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_has_all_capabilities() {
        let capabilities = AdminRole::SuperAdmin.capabilities();
        for capability in Capability::ALL {
            assert!(capabilities.contains(capability));
        }
    }

    #[test]
    fn viewer_can_only_view() {
        let capabilities = AdminRole::Viewer.capabilities();
        assert!(capabilities.contains(Capability::ViewResults));
        assert!(!capabilities.contains(Capability::ManageElection));
        assert!(!capabilities.contains(Capability::ManageVoters));
    }

    #[test]
    fn iter_yields_exactly_the_contained_capabilities() {
        let set = CapabilitySet::empty()
            .with(Capability::ViewResults)
            .with(Capability::ManageVoters);
        let listed: Vec<_> = set.iter().collect();
        assert_eq!(
            listed,
            vec![Capability::ViewResults, Capability::ManageVoters]
        );
    }
}
