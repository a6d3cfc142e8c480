use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, MongoCollection};

/// A counter object used to implement auto-increment IDs.
/// There is one counter per collection, named after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    /// The highest value handed out so far.
    pub last: u32,
}

impl Counter {
    /// Atomically reserve `count` consecutive IDs for documents of type `T`,
    /// returning the first of them. IDs start at 1.
    ///
    /// Reservations are never rolled back, so an aborted insert leaves a gap.
    pub async fn reserve<T: MongoCollection>(counters: &Coll<Counter>, count: u32) -> Result<u32> {
        if count == 0 {
            return Err(Error::Status(
                Status::InternalServerError,
                format!("Reserved zero IDs from counter {}", T::NAME),
            ));
        }
        let update = doc! {
            "$inc": { "last": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": T::NAME }, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to upsert counter {}", T::NAME),
                )
            })?;
        Ok(counter.last - (count - 1))
    }

    /// Reserve a single ID for a document of type `T`.
    pub async fn next<T: MongoCollection>(counters: &Coll<Counter>) -> Result<u32> {
        Self::reserve::<T>(counters, 1).await
    }
}
