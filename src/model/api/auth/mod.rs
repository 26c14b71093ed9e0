mod capability;
mod token;

pub use capability::{AdminRole, Capability, CapabilitySet};
pub use token::{AdminSession, SESSION_COOKIE};
