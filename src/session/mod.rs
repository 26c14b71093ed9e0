//! In-memory ballot sessions: the state machine itself and the registry that
//! tracks, times and sweeps live sessions.

mod machine;
mod registry;

pub use machine::{
    BallotCandidate, BallotPosition, BallotSession, SessionError, SessionState, TickAlert,
    BALLOT_TIME_LIMIT_SECS, TIME_WARNING_SECS,
};
pub use registry::{ActiveSessions, SessionFairing};
