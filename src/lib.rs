#[macro_use]
extern crate rocket;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;
pub mod tally;

pub use config::Config;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::session::SessionFairing;

/// Assemble the server: every fairing attached and every route mounted.
/// Config loading, the database connection and the ballot session ticker
/// live in fairings, so their failures surface at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(SessionFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}
