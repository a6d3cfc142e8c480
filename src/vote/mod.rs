//! Vote casting: validation against the poll's window and options, duplicate
//! prevention, and an atomic commit of the vote record with its tally.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::tokio::time::{sleep, timeout};
use thiserror::Error;

use crate::contention::{retry_backoff, PostLocks};
use crate::model::{
    common::{OptionId, PostId, UserId},
    db::VoteRecord,
};

mod memory;
mod mongo;
mod store;

pub use memory::MemoryVoteStore;
pub use mongo::MongoVoteStore;
pub use store::{StoreError, VoteStore};


/// How many times a commit is attempted before giving up.
const COMMIT_ATTEMPTS: u32 = 2;

/// Which part of a vote referred to something that doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Post,
    Option,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "Post"),
            Self::Option => write!(f, "Option"),
        }
    }
}

/// Why a vote was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("Voting is not open for this post")]
    OutOfWindow,
    #[error("You have already voted in this post")]
    DuplicateVote,
    #[error("The vote could not be recorded, please try again")]
    Transient,
}

/// Casts votes against some [`VoteStore`].
pub struct VotingService<S> {
    store: S,
    commit_timeout: Duration,
    locks: PostLocks,
}

impl<S: VoteStore> VotingService<S> {
    /// `commit_timeout` bounds each commit attempt separately. Commits to the
    /// same post through services sharing `locks` never overlap.
    pub fn new(store: S, commit_timeout: Duration, locks: PostLocks) -> Self {
        Self {
            store,
            commit_timeout,
            locks,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cast a vote for `option_id` in `post_id` on behalf of `user_id`, now.
    pub async fn cast_vote(
        &self,
        post_id: PostId,
        option_id: OptionId,
        user_id: UserId,
    ) -> Result<VoteRecord, VoteError> {
        self.cast_vote_at(post_id, option_id, user_id, Utc::now())
            .await
    }

    /// Cast a vote as if the current time were `now`.
    ///
    /// Checks run in a fixed order, and the first failure is reported: the
    /// post must exist, the option must belong to it, voting must be open, and
    /// the user must not have voted in the post yet. On success the vote record
    /// and the option's incremented tally become visible together.
    pub async fn cast_vote_at(
        &self,
        post_id: PostId,
        option_id: OptionId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<VoteRecord, VoteError> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(VoteError::NotFound(Missing::Post))?;

        // An option of some other post is as good as missing.
        self.store
            .find_option(option_id)
            .await?
            .filter(|option| option.post_id == post_id)
            .ok_or(VoteError::NotFound(Missing::Option))?;

        if !post.is_open_at(now) {
            return Err(VoteError::OutOfWindow);
        }

        // Fast path only; the store's uniqueness constraint is what decides a race.
        if self.store.find_vote(user_id, post_id).await?.is_some() {
            return Err(VoteError::DuplicateVote);
        }

        let vote = VoteRecord {
            user_id,
            post_id,
            option_id,
            cast_at: now,
        };
        self.commit(&vote).await?;
        info!("User {user_id} voted for option {option_id} in post {post_id}");
        Ok(vote)
    }

    /// Commit the vote, retrying once after a conflict or timeout.
    async fn commit(&self, vote: &VoteRecord) -> Result<(), VoteError> {
        let _turn = self.locks.lock(vote.post_id).await;
        for attempt in 1..=COMMIT_ATTEMPTS {
            if attempt > 1 {
                sleep(retry_backoff()).await;
            }
            match timeout(self.commit_timeout, self.store.commit_vote(vote)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(StoreError::Conflict(why))) => {
                    warn!(
                        "Vote by user {} in post {} conflicted on attempt {attempt}: {why}",
                        vote.user_id, vote.post_id
                    );
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(
                        "Vote by user {} in post {} timed out on attempt {attempt}",
                        vote.user_id, vote.post_id
                    );
                }
            }
        }
        error!(
            "Gave up on vote by user {} in post {} after {COMMIT_ATTEMPTS} attempts",
            vote.user_id, vote.post_id
        );
        Err(VoteError::Transient)
    }
}
