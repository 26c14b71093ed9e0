use std::collections::HashMap;
use std::sync::Arc;

use rand::{distributions::Alphanumeric, thread_rng, Rng};
use rocket::{
    fairing::{self, Fairing, Info, Kind},
    tokio::{
        self,
        sync::Mutex,
        time::{interval, Duration},
    },
    Build, Orbit, Rocket,
};

use super::machine::{BallotSession, TickAlert};

/// Length of session identifiers.
const SESSION_ID_LENGTH: usize = 32;

/// How many ticks a finished session lingers before being swept, so clients
/// can still fetch the final state of their session.
const FINISHED_SESSION_RETENTION_TICKS: u32 = 300;

/// All live ballot sessions, keyed by session ID.
///
/// Every session mutation happens under this lock, which serialises
/// concurrent requests against the same session.
#[derive(Clone, Default)]
pub struct ActiveSessions {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
}

struct Slot {
    session: BallotSession,
    /// Ticks spent in a terminal state.
    finished_for: u32,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under a fresh unguessable ID, dropping any other
    /// session belonging to the same voter.
    pub async fn insert(&self, session: BallotSession) -> String {
        let session_id = generate_session_id();
        let voter_id = session.voter_id();

        let mut sessions = self.inner.lock().await;
        sessions.retain(|_, slot| slot.session.voter_id() != voter_id);
        sessions.insert(
            session_id.clone(),
            Slot {
                session,
                finished_for: 0,
            },
        );
        session_id
    }

    /// Run `f` on the session with the given ID, if it exists.
    pub async fn with_session<F, R>(&self, session_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut BallotSession) -> R,
    {
        let mut sessions = self.inner.lock().await;
        sessions.get_mut(session_id).map(|slot| f(&mut slot.session))
    }

    /// Advance every live timer by one second and sweep out sessions that
    /// finished long enough ago.
    pub async fn tick_all(&self) {
        let mut sessions = self.inner.lock().await;
        for slot in sessions.values_mut() {
            if slot.session.is_terminal() {
                slot.finished_for += 1;
                continue;
            }
            match slot.session.tick() {
                Some(TickAlert::Warning) => {
                    info!(
                        "Ballot session for voter {:?} has {} seconds left",
                        slot.session.voter_id(),
                        slot.session.remaining_seconds()
                    );
                }
                Some(TickAlert::Expired) => {
                    warn!(
                        "Ballot session for voter {:?} timed out before submission",
                        slot.session.voter_id()
                    );
                }
                None => {}
            }
        }
        sessions
            .retain(|_, slot| !slot.session.is_terminal() || slot.finished_for < FINISHED_SESSION_RETENTION_TICKS);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Manages the session registry and drives its one-second ticker.
pub struct SessionFairing;

#[rocket::async_trait]
impl Fairing for SessionFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot session registry",
            kind: Kind::Ignite | Kind::Liftoff,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> fairing::Result {
        Ok(rocket.manage(ActiveSessions::new()))
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        // Unwrap is safe as we managed the registry on ignite.
        let sessions = rocket.state::<ActiveSessions>().unwrap().clone();
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(1));
            loop {
                timer.tick().await;
                sessions.tick_all().await;
            }
        });
        info!("Ballot session ticker running");
    }
}

#[cfg(test)]
mod tests {
    use crate::model::mongodb::Id;
    use crate::session::machine::{BallotCandidate, BallotPosition, SessionState};

    use super::*;

    fn ballot() -> Vec<BallotPosition> {
        vec![BallotPosition {
            id: Id::new(),
            title: "Head Prefect".to_string(),
            description: None,
            category: "Leadership".to_string(),
            candidates: vec![BallotCandidate {
                id: Id::new(),
                name: "Amara Okafor".to_string(),
                gender: None,
                party: None,
            }],
        }]
    }

    fn session_for(voter_id: Id) -> BallotSession {
        BallotSession::new(voter_id, "Jamie Smith".to_string(), Id::new(), ballot())
    }

    #[rocket::async_test]
    async fn session_ids_are_long_and_unique() {
        let first = generate_session_id();
        let second = generate_session_id();
        assert_eq!(SESSION_ID_LENGTH, first.len());
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[rocket::async_test]
    async fn inserted_sessions_are_reachable_by_id() {
        let sessions = ActiveSessions::new();
        let id = sessions.insert(session_for(Id::new())).await;

        let state = sessions
            .with_session(&id, |session| session.state())
            .await
            .unwrap();
        assert_eq!(SessionState::InProgress, state);

        assert!(sessions.with_session("missing", |_| ()).await.is_none());
    }

    #[rocket::async_test]
    async fn a_new_session_replaces_the_voters_previous_one() {
        let sessions = ActiveSessions::new();
        let voter_id = Id::new();

        let first = sessions.insert(session_for(voter_id)).await;
        let second = sessions.insert(session_for(voter_id)).await;

        assert!(sessions.with_session(&first, |_| ()).await.is_none());
        assert!(sessions.with_session(&second, |_| ()).await.is_some());
        assert_eq!(1, sessions.len().await);
    }

    #[rocket::async_test]
    async fn sessions_for_different_voters_coexist() {
        let sessions = ActiveSessions::new();
        sessions.insert(session_for(Id::new())).await;
        sessions.insert(session_for(Id::new())).await;
        assert_eq!(2, sessions.len().await);
    }

    #[rocket::async_test]
    async fn tick_all_times_out_and_eventually_sweeps_sessions() {
        let sessions = ActiveSessions::new();
        let id = sessions.insert(session_for(Id::new())).await;

        for _ in 0..crate::session::machine::BALLOT_TIME_LIMIT_SECS {
            sessions.tick_all().await;
        }
        let state = sessions
            .with_session(&id, |session| session.state())
            .await
            .unwrap();
        assert_eq!(SessionState::TimedOut, state);

        // The finished session lingers for a while, then gets swept.
        for _ in 0..FINISHED_SESSION_RETENTION_TICKS {
            sessions.tick_all().await;
        }
        assert!(sessions.with_session(&id, |_| ()).await.is_none());
        assert_eq!(0, sessions.len().await);
    }
}
