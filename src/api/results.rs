use std::collections::HashMap;

use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AdminSession, Capability},
        results::{AnalyticsReport, ElectionReport, ElectionResults, ElectionSummary},
    },
    db::{
        candidate::Candidate, election::Election, position::Position, vote::Vote, voter::Voter,
    },
    mongodb::{Coll, Id},
};
use crate::tally::{self, PositionResult, Turnout};

use super::common::{
    active_election, candidates_for_positions, positions_in_ballot_order, roll_turnout,
    votes_for_election,
};

pub fn routes() -> Vec<Route> {
    routes![
        election_results,
        results_summary,
        results_analytics,
        results_report,
    ]
}

/// Results for the active election. Public: the school publishes the outcome
/// on a shared screen once polling closes.
#[get("/results")]
pub async fn election_results(
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
) -> Result<Json<ElectionResults>> {
    let election = active_election(&elections).await?;
    let tally = tally_election(&election, &positions, &candidates, &votes, &voters).await?;

    Ok(Json(ElectionResults {
        election: election.into(),
        turnout: tally.turnout,
        total_votes: tally.total_votes,
        positions: tally.positions,
    }))
}

/// Headline numbers for the admin dashboard.
#[get("/results/summary")]
pub async fn results_summary(
    session: AdminSession,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
) -> Result<Json<ElectionSummary>> {
    session.require(Capability::ViewResults)?;

    let election = active_election(&elections).await?;
    let tally = tally_election(&election, &positions, &candidates, &votes, &voters).await?;

    Ok(Json(ElectionSummary {
        election: election.into(),
        turnout: tally.turnout,
        total_votes: tally.total_votes,
        total_positions: tally.total_positions,
        total_candidates: tally.total_candidates,
        positions: tally.positions,
    }))
}

/// Voting-activity breakdowns: per position, per party and per hour.
#[get("/results/analytics")]
pub async fn results_analytics(
    session: AdminSession,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
) -> Result<Json<AnalyticsReport>> {
    session.require(Capability::ViewResults)?;

    let election = active_election(&elections).await?;
    let ballot_positions = positions_in_ballot_order(&positions, election.id).await?;
    let ballot_candidates = candidates_for_positions(&candidates, &ballot_positions).await?;
    let all_votes = votes_for_election(&votes, election.id).await?;
    let turnout = roll_turnout(&voters).await?;

    Ok(Json(AnalyticsReport {
        election: election.into(),
        turnout,
        total_votes: all_votes.len() as u64,
        votes_by_position: tally::votes_by_position(
            &ballot_positions,
            &ballot_candidates,
            &all_votes,
        ),
        votes_by_party: tally::votes_by_party(&ballot_candidates, &all_votes),
        votes_by_hour: tally::votes_by_hour(&all_votes),
    }))
}

/// Printable end-of-election report.
#[get("/results/report")]
pub async fn results_report(
    session: AdminSession,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
) -> Result<Json<ElectionReport>> {
    session.require(Capability::ViewResults)?;

    let election = active_election(&elections).await?;
    let tally = tally_election(&election, &positions, &candidates, &votes, &voters).await?;

    Ok(Json(ElectionReport {
        election: election.into(),
        generated_at: Utc::now(),
        turnout: tally.turnout,
        total_votes: tally.total_votes,
        positions: tally.positions,
    }))
}

struct TalliedElection {
    turnout: Turnout,
    total_votes: u64,
    total_positions: u64,
    total_candidates: u64,
    positions: Vec<PositionResult>,
}

/// Fetch an election's ballot and votes once and tally every position.
async fn tally_election(
    election: &Election,
    positions: &Coll<Position>,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
    voters: &Coll<Voter>,
) -> Result<TalliedElection> {
    let ballot_positions = positions_in_ballot_order(positions, election.id).await?;
    let ballot_candidates = candidates_for_positions(candidates, &ballot_positions).await?;
    let all_votes = votes_for_election(votes, election.id).await?;
    let turnout = roll_turnout(voters).await?;

    let total_votes = all_votes.len() as u64;
    let total_positions = ballot_positions.len() as u64;
    let total_candidates = ballot_candidates.len() as u64;

    let mut candidates_by_position: HashMap<Id, Vec<Candidate>> = HashMap::new();
    for candidate in ballot_candidates {
        candidates_by_position
            .entry(candidate.position_id)
            .or_default()
            .push(candidate);
    }
    let mut votes_by_position: HashMap<Id, Vec<Vote>> = HashMap::new();
    for vote in all_votes {
        votes_by_position
            .entry(vote.position_id)
            .or_default()
            .push(vote);
    }

    let results = ballot_positions
        .iter()
        .map(|position| {
            tally::position_result(
                position,
                candidates_by_position
                    .get(&position.id)
                    .map_or(&[][..], Vec::as_slice),
                votes_by_position
                    .get(&position.id)
                    .map_or(&[][..], Vec::as_slice),
            )
        })
        .collect();

    Ok(TalliedElection {
        turnout,
        total_votes,
        total_positions,
        total_candidates,
        positions: results,
    })
}
