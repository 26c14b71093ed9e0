//! All data structures, whether DB-, API- or internal-facing.

pub mod api;
pub mod db;
pub mod mongodb;
