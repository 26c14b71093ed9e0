//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Datetimes are serialised as RFC 3339 strings rather than BSON datetimes.
//! - IDs are serialised as plain strings via [`id::ApiId`].

pub mod admin;
pub mod auth;
pub mod ballot;
pub mod candidate;
pub mod election;
pub mod id;
pub mod pagination;
pub mod position;
pub mod results;
pub mod vote;
pub mod voter;
