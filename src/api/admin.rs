use std::collections::{HashMap, HashSet};

use mongodb::{
    bson::{doc, Bson, DateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AdminSession, Capability},
            candidate::{CandidateDescription, CandidateSpec, CandidateSummary, CandidateUpdate},
            election::{ElectionDescription, ElectionSpec},
            pagination::{Paginated, Pagination},
            position::{PositionDescription, PositionSpec},
            vote::{ResetOutcome, VoteRecord, UNKNOWN_REFERENCE},
            voter::{validate_import, ImportOutcome, VoterDescription, VoterSpec},
        },
        db::{
            candidate::{Candidate, NewCandidate},
            election::{Election, NewElection},
            position::{NewPosition, Position},
            vote::Vote,
            voter::{NewVoter, Voter},
        },
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

use super::common::{
    active_election, candidates_for_positions, election_by_id, positions_in_ballot_order,
    votes_for_election,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_elections,
        create_election,
        modify_election,
        activate_election,
        deactivate_election,
        get_positions,
        create_position,
        modify_position,
        delete_position,
        get_candidates,
        create_candidate,
        modify_candidate,
        delete_candidate,
        get_voters,
        create_voter,
        import_voters,
        delete_voter,
        get_votes,
        delete_vote,
        reset_votes,
    ]
}

#[get("/admin/elections")]
async fn get_elections(
    session: AdminSession,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    session.require(Capability::ViewResults)?;

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let election_list: Vec<Election> = elections.find(None, options).await?.try_collect().await?;
    Ok(Json(election_list.into_iter().map(Into::into).collect()))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    session: AdminSession,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    session.require(Capability::ManageElection)?;
    validate_dates(&spec)?;

    // Create and insert the election.
    let election: NewElection = spec.0.into();
    let new_id: Id = new_elections
        .insert_one(&election, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    // Retrieve the full election information including ID.
    let election = elections.find_one(new_id.as_doc(), None).await?.unwrap();
    info!("Created election {:?}", new_id);
    Ok(Json(election.into()))
}

#[put("/admin/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    session: AdminSession,
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    session.require(Capability::ManageElection)?;
    validate_dates(&spec)?;

    // `is_active` and `created_at` are deliberately not editable here.
    let update = doc! {
        "$set": {
            "title": &spec.title,
            "description": spec.description.clone(),
            "start_date": DateTime::from_chrono(spec.start_date),
            "end_date": DateTime::from_chrono(spec.end_date),
        }
    };
    let election = elections
        .find_one_and_update(election_id.as_doc(), update, return_updated())
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(election.into()))
}

/// Make the given election the active one.
///
/// Runs in a transaction so that a concurrent activation cannot leave two
/// elections active at once.
#[post("/admin/elections/<election_id>/activate")]
async fn activate_election(
    session: AdminSession,
    election_id: Id,
    elections: Coll<Election>,
    db_client: &State<Client>,
) -> Result<Json<ElectionDescription>> {
    session.require(Capability::ManageElection)?;

    let election = {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        elections
            .update_many_with_session(
                doc! { "is_active": true },
                doc! { "$set": { "is_active": false } },
                None,
                &mut db_session,
            )
            .await?;

        let election = elections
            .find_one_and_update_with_session(
                election_id.as_doc(),
                doc! { "$set": { "is_active": true } },
                return_updated(),
                &mut db_session,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

        db_session.commit_transaction().await?;
        election
    };

    info!("Activated election {:?}", election_id);
    Ok(Json(election.into()))
}

#[post("/admin/elections/<election_id>/deactivate")]
async fn deactivate_election(
    session: AdminSession,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    session.require(Capability::ManageElection)?;

    let election = elections
        .find_one_and_update(
            election_id.as_doc(),
            doc! { "$set": { "is_active": false } },
            return_updated(),
        )
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    info!("Deactivated election {:?}", election_id);
    Ok(Json(election.into()))
}

#[get("/admin/positions?<election_id>")]
async fn get_positions(
    session: AdminSession,
    election_id: Option<Id>,
    elections: Coll<Election>,
    positions: Coll<Position>,
) -> Result<Json<Vec<PositionDescription>>> {
    session.require(Capability::ViewResults)?;

    let election_id = resolve_election_id(election_id, &elections).await?;
    let position_list = positions_in_ballot_order(&positions, election_id).await?;
    Ok(Json(position_list.into_iter().map(Into::into).collect()))
}

#[post("/admin/positions?<election_id>", data = "<spec>", format = "json")]
async fn create_position(
    session: AdminSession,
    election_id: Option<Id>,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    new_positions: Coll<NewPosition>,
    positions: Coll<Position>,
) -> Result<Json<PositionDescription>> {
    session.require(Capability::ManageElection)?;

    // The election must exist for the position to hang off.
    let election_id = match election_id {
        Some(id) => election_by_id(&elections, id).await?.id,
        None => active_election(&elections).await?.id,
    };

    let position = NewPosition::new(election_id, spec.0);
    let new_id: Id = new_positions
        .insert_one(&position, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    let position = positions.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(position.into()))
}

#[put("/admin/positions/<position_id>", data = "<spec>", format = "json")]
async fn modify_position(
    session: AdminSession,
    position_id: Id,
    spec: Json<PositionSpec>,
    positions: Coll<Position>,
) -> Result<Json<PositionDescription>> {
    session.require(Capability::ManageElection)?;

    let update = doc! {
        "$set": {
            "title": &spec.title,
            "description": spec.description.clone(),
            "category": spec.category.clone(),
            "order_index": spec.order_index,
        }
    };
    let position = positions
        .find_one_and_update(position_id.as_doc(), update, return_updated())
        .await?
        .ok_or_else(|| Error::not_found(format!("Position {}", position_id)))?;
    Ok(Json(position.into()))
}

/// Delete a position along with its candidates and votes.
#[delete("/admin/positions/<position_id>")]
async fn delete_position(
    session: AdminSession,
    position_id: Id,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    session.require(Capability::ManageElection)?;

    // Atomically delete the position and all associated data.
    {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        let result = positions
            .delete_one_with_session(position_id.as_doc(), None, &mut db_session)
            .await?;
        if result.deleted_count == 0 {
            return Err(Error::not_found(format!("Position {}", position_id)));
        }

        let filter = doc! {
            "position_id": *position_id,
        };
        candidates
            .delete_many_with_session(filter.clone(), None, &mut db_session)
            .await?;
        votes
            .delete_many_with_session(filter, None, &mut db_session)
            .await?;

        db_session.commit_transaction().await?;
    }

    warn!("Deleted position {:?} with its candidates and votes", position_id);
    Ok(())
}

#[get("/admin/candidates?<election_id>")]
async fn get_candidates(
    session: AdminSession,
    election_id: Option<Id>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<Vec<CandidateSummary>>> {
    session.require(Capability::ViewResults)?;

    let election_id = resolve_election_id(election_id, &elections).await?;
    let position_list = positions_in_ballot_order(&positions, election_id).await?;
    let candidate_list = candidates_for_positions(&candidates, &position_list).await?;
    let vote_list = votes_for_election(&votes, election_id).await?;

    let titles: HashMap<Id, &str> = position_list
        .iter()
        .map(|position| (position.id, position.title.as_str()))
        .collect();
    let mut counts: HashMap<Id, u64> = HashMap::new();
    for vote in &vote_list {
        *counts.entry(vote.candidate_id).or_insert(0) += 1;
    }

    let summaries = candidate_list
        .into_iter()
        .map(|candidate| {
            let position_title = titles
                .get(&candidate.position_id)
                .copied()
                .unwrap_or(UNKNOWN_REFERENCE)
                .to_string();
            let votes = counts.get(&candidate.id).copied().unwrap_or(0);
            CandidateSummary {
                candidate: candidate.into(),
                position_title,
                votes,
            }
        })
        .collect();
    Ok(Json(summaries))
}

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    session: AdminSession,
    spec: Json<CandidateSpec>,
    positions: Coll<Position>,
    new_candidates: Coll<NewCandidate>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    session.require(Capability::ManageElection)?;

    // The position must exist for the candidate to stand for.
    positions
        .find_one(spec.position_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position {}", spec.position_id)))?;

    let candidate: NewCandidate = spec.0.into();
    let new_id: Id = new_candidates
        .insert_one(&candidate, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    let candidate = candidates.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(candidate.into()))
}

#[put("/admin/candidates/<candidate_id>", data = "<update>", format = "json")]
async fn modify_candidate(
    session: AdminSession,
    candidate_id: Id,
    update: Json<CandidateUpdate>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    session.require(Capability::ManageElection)?;

    let update = doc! {
        "$set": {
            "name": &update.name,
            "gender": update.gender.clone(),
            "party": update.party.clone(),
        }
    };
    let candidate = candidates
        .find_one_and_update(candidate_id.as_doc(), update, return_updated())
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {}", candidate_id)))?;
    Ok(Json(candidate.into()))
}

/// Delete a candidate. Votes already cast for them are kept: they still count
/// towards position totals as votes for a deleted candidate.
#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    session: AdminSession,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<()> {
    session.require(Capability::ManageElection)?;

    let result = candidates.delete_one(candidate_id.as_doc(), None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Candidate {}", candidate_id)))
    } else {
        Ok(())
    }
}

#[get("/admin/voters")]
async fn get_voters(
    session: AdminSession,
    pagination: Pagination,
    voters: Coll<Voter>,
) -> Result<Json<Paginated<VoterDescription>>> {
    session.require(Capability::ManageVoters)?;

    let total = voters.count_documents(None, None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "code": 1 })
        .skip(pagination.skip())
        .limit(pagination.page_size() as i64)
        .build();
    let page: Vec<Voter> = voters.find(None, options).await?.try_collect().await?;

    let items = page.into_iter().map(Into::into).collect();
    Ok(Json(pagination.paginate(items, total)))
}

#[post("/admin/voters", data = "<spec>", format = "json")]
async fn create_voter(
    session: AdminSession,
    spec: Json<VoterSpec>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
) -> Result<Json<VoterDescription>> {
    session.require(Capability::ManageVoters)?;

    let mut batch = prepare_voters(vec![spec.0], &voters).await?;
    // Unwrap safe: a valid single-spec batch yields exactly one voter.
    let voter = batch.pop().unwrap();

    let new_id: Id = new_voters
        .insert_one(&voter, None)
        .await
        .map_err(duplicate_code_conflict)?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into();

    let voter = voters.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(voter.into()))
}

/// Import a batch of voters. All-or-nothing: if any row is invalid the whole
/// batch is rejected with per-row reasons.
#[post("/admin/voters/import", data = "<specs>", format = "json")]
async fn import_voters(
    session: AdminSession,
    specs: Json<Vec<VoterSpec>>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
) -> Result<Json<ImportOutcome>> {
    session.require(Capability::ManageVoters)?;

    if specs.is_empty() {
        return Err(Error::Status(
            Status::BadRequest,
            "The import contains no voters.".to_string(),
        ));
    }

    let batch = prepare_voters(specs.0, &voters).await?;
    let inserted = new_voters
        .insert_many(&batch, None)
        .await
        .map_err(duplicate_code_conflict)?;

    info!("Imported {} voters", inserted.inserted_ids.len());
    Ok(Json(ImportOutcome {
        imported: inserted.inserted_ids.len(),
    }))
}

/// Delete a voter along with any votes they have cast.
#[delete("/admin/voters/<voter_id>")]
async fn delete_voter(
    session: AdminSession,
    voter_id: Id,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    session.require(Capability::ManageVoters)?;

    {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        let result = voters
            .delete_one_with_session(voter_id.as_doc(), None, &mut db_session)
            .await?;
        if result.deleted_count == 0 {
            return Err(Error::not_found(format!("Voter {}", voter_id)));
        }

        votes
            .delete_many_with_session(doc! { "voter_id": *voter_id }, None, &mut db_session)
            .await?;

        db_session.commit_transaction().await?;
    }

    warn!("Deleted voter {:?} with their votes", voter_id);
    Ok(())
}

#[get("/admin/votes")]
async fn get_votes(
    session: AdminSession,
    pagination: Pagination,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    positions: Coll<Position>,
) -> Result<Json<Paginated<VoteRecord>>> {
    session.require(Capability::ManageVoters)?;

    let total = votes.count_documents(None, None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": 1 })
        .skip(pagination.skip())
        .limit(pagination.page_size() as i64)
        .build();
    let page: Vec<Vote> = votes.find(None, options).await?.try_collect().await?;

    let records = join_vote_records(&page, &voters, &candidates, &positions).await?;
    Ok(Json(pagination.paginate(records, total)))
}

/// Delete a single vote, e.g. one recorded by mistake during a trial run.
/// The voter stays marked as having voted.
#[delete("/admin/votes/<vote_id>")]
async fn delete_vote(session: AdminSession, vote_id: Id, votes: Coll<Vote>) -> Result<()> {
    session.require(Capability::ManageVoters)?;

    let result = votes.delete_one(vote_id.as_doc(), None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Vote {}", vote_id)))
    } else {
        warn!("Deleted vote {:?}", vote_id);
        Ok(())
    }
}

/// Wipe every vote and reset the whole roll to not-voted, ready for a fresh
/// run. Elections, positions and candidates are kept.
#[post("/admin/reset")]
async fn reset_votes(
    session: AdminSession,
    votes: Coll<Vote>,
    voters: Coll<Voter>,
    db_client: &State<Client>,
) -> Result<Json<ResetOutcome>> {
    session.require(Capability::ManageElection)?;

    let outcome = {
        let mut db_session = db_client.start_session(None).await?;
        db_session.start_transaction(None).await?;

        let deleted = votes
            .delete_many_with_session(doc! {}, None, &mut db_session)
            .await?;
        let reset = voters
            .update_many_with_session(
                doc! {},
                doc! { "$set": { "has_voted": false, "voted_at": Bson::Null } },
                None,
                &mut db_session,
            )
            .await?;

        db_session.commit_transaction().await?;
        ResetOutcome {
            votes_deleted: deleted.deleted_count,
            voters_reset: reset.modified_count,
        }
    };

    warn!(
        "Reset all voting data: {} votes deleted, {} voters reset",
        outcome.votes_deleted, outcome.voters_reset
    );
    Ok(Json(outcome))
}

/// Options to return the post-update document from `find_one_and_update`.
fn return_updated() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn validate_dates(spec: &ElectionSpec) -> Result<()> {
    if spec.end_date <= spec.start_date {
        return Err(Error::Status(
            Status::BadRequest,
            "The election must end after it starts.".to_string(),
        ));
    }
    Ok(())
}

/// The given election ID, or the active election's if none was given.
async fn resolve_election_id(
    election_id: Option<Id>,
    elections: &Coll<Election>,
) -> Result<Id> {
    match election_id {
        Some(id) => Ok(id),
        None => Ok(active_election(elections).await?.id),
    }
}

/// Validate voter specs against the codes already on the roll, mapping
/// rejections to a 422 listing every bad row.
async fn prepare_voters(specs: Vec<VoterSpec>, voters: &Coll<Voter>) -> Result<Vec<NewVoter>> {
    let existing_codes: HashSet<String> = voters
        .distinct("code", None, None)
        .await?
        .into_iter()
        .filter_map(|code| code.as_str().map(str::to_string))
        .collect();

    validate_import(specs, existing_codes).map_err(|rejections| {
        let reasons = rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Error::Status(Status::UnprocessableEntity, reasons)
    })
}

/// A duplicate login code lost a race against a concurrent import; anything
/// else is passed through as a DB error.
fn duplicate_code_conflict(err: mongodb::error::Error) -> Error {
    if is_duplicate_key_error(&err) {
        Error::Status(
            Status::Conflict,
            "A voter with one of these codes was created concurrently.".to_string(),
        )
    } else {
        err.into()
    }
}

/// Join vote rows with their voter, candidate and position for the listing.
async fn join_vote_records(
    page: &[Vote],
    voters: &Coll<Voter>,
    candidates: &Coll<Candidate>,
    positions: &Coll<Position>,
) -> Result<Vec<VoteRecord>> {
    let voter_ids: Vec<_> = page.iter().map(|vote| *vote.voter_id).collect();
    let candidate_ids: Vec<_> = page.iter().map(|vote| *vote.candidate_id).collect();
    let position_ids: Vec<_> = page.iter().map(|vote| *vote.position_id).collect();

    let voter_list: Vec<Voter> = voters
        .find(doc! { "_id": { "$in": voter_ids } }, None)
        .await?
        .try_collect()
        .await?;
    let candidate_list: Vec<Candidate> = candidates
        .find(doc! { "_id": { "$in": candidate_ids } }, None)
        .await?
        .try_collect()
        .await?;
    let position_list: Vec<Position> = positions
        .find(doc! { "_id": { "$in": position_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let voters_by_id: HashMap<Id, &Voter> = voter_list.iter().map(|v| (v.id, v)).collect();
    let candidates_by_id: HashMap<Id, &Candidate> =
        candidate_list.iter().map(|c| (c.id, c)).collect();
    let positions_by_id: HashMap<Id, &Position> =
        position_list.iter().map(|p| (p.id, p)).collect();

    let records = page
        .iter()
        .map(|vote| {
            let voter = voters_by_id.get(&vote.voter_id);
            VoteRecord {
                id: vote.id.into(),
                voter_name: voter
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| UNKNOWN_REFERENCE.to_string()),
                voter_code: voter
                    .map(|v| v.code.clone())
                    .unwrap_or_else(|| UNKNOWN_REFERENCE.to_string()),
                candidate_name: candidates_by_id
                    .get(&vote.candidate_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNKNOWN_REFERENCE.to_string()),
                position_title: positions_by_id
                    .get(&vote.position_id)
                    .map(|p| p.title.clone())
                    .unwrap_or_else(|| UNKNOWN_REFERENCE.to_string()),
                created_at: vote.created_at,
            }
        })
        .collect();
    Ok(records)
}
