use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    position::{NewPosition, Position},
    vote::{NewVote, Vote},
    voter::{NewVoter, Voter},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Position collections
const POSITIONS: &str = "positions";
impl MongoCollection for Position {
    const NAME: &'static str = POSITIONS;
}
impl MongoCollection for NewPosition {
    const NAME: &'static str = POSITIONS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Voter collections
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection: login codes must be unique.
    let voter_index = IndexModel::builder()
        .keys(doc! {"code": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Vote collection: at most one vote per voter per position, enforced even if
    // two sessions for the same voter race each other to submission.
    let vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "position_id": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    Ok(())
}
