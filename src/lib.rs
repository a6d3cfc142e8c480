#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod contention;
pub mod error;
pub mod logging;
pub mod model;
pub mod vote;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use contention::PostLocks;
use logging::LoggerFairing;

/// Build the server: mount every route and attach the fairings that
/// load the config and connect to the database.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(PostLocks::default())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}
