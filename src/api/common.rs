use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    db::{candidate::Candidate, election::Election, position::Position, vote::Vote, voter::Voter},
    mongodb::{Coll, Id},
};
use crate::tally::{self, Turnout};

/// Return the active election, or 404 if polling is closed.
pub async fn active_election(elections: &Coll<Election>) -> Result<Election> {
    elections
        .find_one(doc! { "is_active": true }, None)
        .await?
        .ok_or_else(|| {
            Error::Status(
                Status::NotFound,
                "No election is currently active.".to_string(),
            )
        })
}

/// Return the election with the given ID, or 404.
pub async fn election_by_id(elections: &Coll<Election>, election_id: Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))
}

/// An election's positions in ballot order.
///
/// `created_at` breaks `order_index` ties so the ballot order is stable
/// across requests.
pub async fn positions_in_ballot_order(
    positions: &Coll<Position>,
    election_id: Id,
) -> Result<Vec<Position>> {
    let filter = doc! { "election_id": *election_id };
    let options = FindOptions::builder()
        .sort(doc! { "order_index": 1, "created_at": 1 })
        .build();
    Ok(positions.find(filter, options).await?.try_collect().await?)
}

/// All candidates standing for the given positions, sorted by name.
pub async fn candidates_for_positions(
    candidates: &Coll<Candidate>,
    positions: &[Position],
) -> Result<Vec<Candidate>> {
    let position_ids = positions.iter().map(|p| *p.id).collect::<Vec<_>>();
    let filter = doc! { "position_id": { "$in": position_ids } };
    let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
    Ok(candidates.find(filter, options).await?.try_collect().await?)
}

/// Every vote recorded for the given election, including votes whose
/// position or candidate has since been deleted.
pub async fn votes_for_election(votes: &Coll<Vote>, election_id: Id) -> Result<Vec<Vote>> {
    let filter = doc! { "election_id": *election_id };
    Ok(votes.find(filter, None).await?.try_collect().await?)
}

/// Turnout across the whole voter roll.
pub async fn roll_turnout(voters: &Coll<Voter>) -> Result<Turnout> {
    let eligible = voters.count_documents(None, None).await?;
    let voted = voters
        .count_documents(doc! { "has_voted": true }, None)
        .await?;
    Ok(tally::turnout(eligible, voted))
}
