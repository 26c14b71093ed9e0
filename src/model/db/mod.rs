//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod admin;
pub use admin::{ensure_admin_exists, Admin, NewAdmin};

pub mod candidate;
pub use candidate::{Candidate, NewCandidate};

pub mod election;
pub use election::{Election, NewElection};

pub mod position;
pub use position::{NewPosition, Position};

pub mod vote;
pub use vote::{NewVote, Vote};

pub mod voter;
pub use voter::{NewVoter, Voter};
