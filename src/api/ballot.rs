use mongodb::bson::{doc, DateTime};
use mongodb::Client;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::ballot::{to_ballot_positions, SelectionRequest, SessionView, StartSessionRequest},
    db::{
        candidate::Candidate,
        election::Election,
        position::Position,
        vote::{NewVote, VoteCore},
        voter::Voter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};
use crate::session::{ActiveSessions, BallotSession, SessionError, SessionState};

use super::common::{active_election, candidates_for_positions, positions_in_ballot_order};

pub fn routes() -> Vec<Route> {
    routes![
        start_session,
        session_state,
        record_selection,
        next_position,
        previous_position,
        submit_ballot,
    ]
}

/// Open a ballot session for the voter with the given code.
///
/// Starting a new session silently replaces any other live session for the
/// same voter, e.g. one abandoned on a different booth.
#[post("/voter/sessions", data = "<request>", format = "json")]
pub async fn start_session(
    request: Json<StartSessionRequest>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    sessions: &State<ActiveSessions>,
) -> Result<Json<SessionView>> {
    let code = request.voter_code.trim();
    let voter = voters
        .find_one(doc! { "code": code }, None)
        .await?
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No voter found with that code.".to_string(),
            )
        })?;
    if voter.has_voted {
        return Err(Error::Status(
            Status::Forbidden,
            "This voter has already cast their ballot.".to_string(),
        ));
    }

    let election = active_election(&elections).await?;
    let ballot_positions = positions_in_ballot_order(&positions, election.id).await?;
    let ballot_candidates = candidates_for_positions(&candidates, &ballot_positions).await?;
    let ballot = to_ballot_positions(ballot_positions, ballot_candidates);

    let voter_id = voter.id;
    let session = BallotSession::new(voter_id, voter.voter.name.clone(), election.id, ballot);
    let session_id = sessions.insert(session).await;
    info!("Opened ballot session for voter {:?}", voter_id);

    let view = sessions
        .with_session(&session_id, |session| {
            SessionView::new(&session_id, session)
        })
        .await
        .ok_or_else(|| session_not_found(&session_id))?;
    Ok(Json(view))
}

/// The current state of a session, including the live timer.
#[get("/voter/sessions/<session_id>")]
pub async fn session_state(
    session_id: &str,
    sessions: &State<ActiveSessions>,
) -> Result<Json<SessionView>> {
    let view = sessions
        .with_session(session_id, |session| SessionView::new(session_id, session))
        .await
        .ok_or_else(|| session_not_found(session_id))?;
    Ok(Json(view))
}

#[post(
    "/voter/sessions/<session_id>/selection",
    data = "<request>",
    format = "json"
)]
pub async fn record_selection(
    session_id: &str,
    request: Json<SelectionRequest>,
    sessions: &State<ActiveSessions>,
) -> Result<Json<SessionView>> {
    let view = apply_session_op(sessions, session_id, |session| {
        session.select(request.position_id, request.candidate_id)
    })
    .await?;
    Ok(Json(view))
}

#[post("/voter/sessions/<session_id>/next")]
pub async fn next_position(
    session_id: &str,
    sessions: &State<ActiveSessions>,
) -> Result<Json<SessionView>> {
    let view = apply_session_op(sessions, session_id, BallotSession::next).await?;
    Ok(Json(view))
}

#[post("/voter/sessions/<session_id>/previous")]
pub async fn previous_position(
    session_id: &str,
    sessions: &State<ActiveSessions>,
) -> Result<Json<SessionView>> {
    let view = apply_session_op(sessions, session_id, BallotSession::previous).await?;
    Ok(Json(view))
}

/// Submit the completed ballot.
///
/// The session is locked while the votes are written, so the timer keeps
/// running but the voter cannot edit their choices. If the write fails the
/// session reopens with selections intact; repeating a successful submit
/// returns the recorded session unchanged.
#[post("/voter/sessions/<session_id>/submit")]
pub async fn submit_ballot(
    session_id: &str,
    sessions: &State<ActiveSessions>,
    db_client: &State<Client>,
    voters: Coll<Voter>,
    new_votes: Coll<NewVote>,
) -> Result<Json<SessionView>> {
    // Lock the session and snapshot what to record.
    let submission = sessions
        .with_session(session_id, |session| {
            if session.state() == SessionState::Submitted {
                return Ok(Submission::AlreadyRecorded(SessionView::new(
                    session_id, session,
                )));
            }
            session.begin_submission()?;
            Ok::<_, SessionError>(Submission::Proceed {
                voter_id: session.voter_id(),
                election_id: session.election_id(),
                batch: session.vote_batch(),
            })
        })
        .await
        .ok_or_else(|| session_not_found(session_id))?;

    let (voter_id, election_id, batch) = match submission? {
        Submission::AlreadyRecorded(view) => return Ok(Json(view)),
        Submission::Proceed {
            voter_id,
            election_id,
            batch,
        } => (voter_id, election_id, batch),
    };

    // Write the ballot without holding the session lock.
    let outcome =
        record_ballot(db_client, &voters, &new_votes, voter_id, election_id, &batch).await;

    // Settle the session according to the outcome. A session that timed out
    // mid-write stays timed out either way.
    let view = sessions
        .with_session(session_id, |session| {
            match &outcome {
                Ok(()) => session.complete_submission(),
                Err(_) => session.fail_submission(),
            }
            SessionView::new(session_id, session)
        })
        .await
        .ok_or_else(|| session_not_found(session_id))?;

    outcome?;
    info!("Recorded ballot for voter {:?}", voter_id);
    Ok(Json(view))
}

enum Submission {
    AlreadyRecorded(SessionView),
    Proceed {
        voter_id: Id,
        election_id: Id,
        batch: Vec<(Id, Id)>,
    },
}

fn session_not_found(session_id: &str) -> Error {
    Error::not_found(format!("Ballot session '{}'", session_id))
}

/// Apply one session operation and return the refreshed view.
async fn apply_session_op<F>(
    sessions: &ActiveSessions,
    session_id: &str,
    op: F,
) -> Result<SessionView>
where
    F: FnOnce(&mut BallotSession) -> std::result::Result<(), SessionError>,
{
    let result = sessions
        .with_session(session_id, |session| {
            op(session)?;
            Ok::<_, SessionError>(SessionView::new(session_id, session))
        })
        .await
        .ok_or_else(|| session_not_found(session_id))?;
    Ok(result?)
}

/// Insert the vote batch and mark the voter as having voted, atomically.
///
/// On any failure the early return drops the DB session, which aborts the
/// transaction and discards whatever was written.
async fn record_ballot(
    db_client: &Client,
    voters: &Coll<Voter>,
    new_votes: &Coll<NewVote>,
    voter_id: Id,
    election_id: Id,
    batch: &[(Id, Id)],
) -> Result<()> {
    let mut db_session = db_client.start_session(None).await?;
    db_session.start_transaction(None).await?;

    let votes = batch
        .iter()
        .map(|&(position_id, candidate_id)| {
            VoteCore::new(voter_id, candidate_id, position_id, election_id)
        })
        .collect::<Vec<_>>();

    new_votes
        .insert_many_with_session(&votes, None, &mut db_session)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::Status(
                    Status::Conflict,
                    "A vote has already been recorded for this voter on one of these positions."
                        .to_string(),
                )
            } else {
                err.into()
            }
        })?;

    let marked = voters
        .update_one_with_session(
            doc! { "_id": *voter_id, "has_voted": false },
            doc! { "$set": { "has_voted": true, "voted_at": DateTime::now() } },
            None,
            &mut db_session,
        )
        .await?;
    if marked.modified_count != 1 {
        return Err(Error::Status(
            Status::Conflict,
            "This voter's ballot has already been recorded.".to_string(),
        ));
    }

    db_session.commit_transaction().await?;
    Ok(())
}
