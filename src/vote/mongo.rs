use std::time::Duration;

use mongodb::{
    bson::doc,
    options::{Acknowledgment, ReadConcern, TransactionOptions, WriteConcern},
    Client, ClientSession, Database,
};
use rocket::{
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::config::Config;
use crate::contention::PostLocks;
use crate::model::{
    common::{OptionId, PostId, UserId},
    db::{PollOption, Post, VoteRecord},
    mongodb::{id_filter, Coll},
};

use super::{StoreError, VoteStore, VotingService};

/// Vote storage backed by MongoDB. Commits run as multi-document transactions,
/// so the database must be a replica set.
pub struct MongoVoteStore {
    client: Client,
    posts: Coll<Post>,
    options: Coll<PollOption>,
    votes: Coll<VoteRecord>,
    max_commit_time: Duration,
}

impl MongoVoteStore {
    pub fn new(client: Client, db: &Database, max_commit_time: Duration) -> Self {
        Self {
            client,
            posts: Coll::from_db(db),
            options: Coll::from_db(db),
            votes: Coll::from_db(db),
            max_commit_time,
        }
    }

    /// The writes making up one vote. The caller owns the transaction.
    async fn write_vote(
        &self,
        vote: &VoteRecord,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        // The unique (user_id, post_id) index rejects a second vote here.
        self.votes
            .insert_one_with_session(vote, None, session)
            .await?;

        let filter = doc! {
            "_id": vote.option_id,
            "post_id": vote.post_id,
        };
        let update = doc! {
            "$inc": { "tally": 1 }
        };
        let result = self
            .options
            .update_one_with_session(filter, update, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::OptionMissing);
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteStore for MongoVoteStore {
    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.find_one(id_filter(post_id), None).await?)
    }

    async fn find_option(&self, option_id: OptionId) -> Result<Option<PollOption>, StoreError> {
        Ok(self.options.find_one(id_filter(option_id), None).await?)
    }

    async fn find_vote(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let filter = doc! {
            "user_id": user_id,
            "post_id": post_id,
        };
        Ok(self.votes.find_one(filter, None).await?)
    }

    async fn commit_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .max_commit_time(self.max_commit_time)
            .build();
        session.start_transaction(options).await?;

        match self.write_vote(vote, &mut session).await {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    debug!("Failed to abort vote transaction: {abort}");
                }
                Err(e)
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VotingService<MongoVoteStore> {
    type Error = ();

    /// Build a service over the managed database connection.
    ///
    /// Panics iff the database, config or post locks are not managed by
    /// [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        let config = req.guard::<&State<Config>>().await.unwrap();
        let locks = req.guard::<&State<PostLocks>>().await.unwrap();
        let timeout = config.vote_commit_timeout();
        let store = MongoVoteStore::new(client.inner().clone(), db, timeout);
        Outcome::Success(VotingService::new(store, timeout, locks.inner().clone()))
    }
}
