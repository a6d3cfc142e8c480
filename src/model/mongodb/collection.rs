use std::ops::Deref;

use mongodb::{
    bson::{doc, Bson, Document},
    error::Error as DbError,
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{Comment, Like, PollOption, Post, User, VoteRecord};

use super::counter::Counter;

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

/// A filter matching the document with the given integer ID.
pub fn id_filter(id: u32) -> Document {
    doc! { "_id": Bson::from(id) }
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Post {
    const NAME: &'static str = "posts";
}

impl MongoCollection for PollOption {
    const NAME: &'static str = "options";
}

impl MongoCollection for VoteRecord {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Comment {
    const NAME: &'static str = "comments";
}

impl MongoCollection for Like {
    const NAME: &'static str = "likes";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Usernames are the login key.
    let user_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // One vote per user per post, enforced by the storage layer.
    let vote_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "post_id": 1})
        .options(unique.clone())
        .build();
    Coll::<VoteRecord>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // One like per user per post.
    let like_index = IndexModel::builder()
        .keys(doc! {"post_id": 1, "user_id": 1})
        .options(unique)
        .build();
    Coll::<Like>::from_db(db)
        .create_index(like_index, None)
        .await?;

    // Lookups by owning post.
    let option_index = IndexModel::builder()
        .keys(doc! {"post_id": 1, "position": 1})
        .build();
    Coll::<PollOption>::from_db(db)
        .create_index(option_index, None)
        .await?;
    let comment_index = IndexModel::builder()
        .keys(doc! {"post_id": 1, "created_at": -1})
        .build();
    Coll::<Comment>::from_db(db)
        .create_index(comment_index, None)
        .await?;

    Ok(())
}
