use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::model::{
    common::{OptionId, PostId, UserId},
    db::{PollOption, Post, VoteRecord},
    mongodb::{is_duplicate_key_error, is_write_conflict},
};

use super::{Missing, VoteError};

/// Storage failures, classified by what the caller should do about them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The user already has a vote in this post.
    #[error("Vote already recorded")]
    Duplicate,
    /// The option disappeared between validation and commit.
    #[error("Option no longer exists")]
    OptionMissing,
    /// Lost a race with a concurrent writer; the operation may be retried.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if is_duplicate_key_error(&err) {
            Self::Duplicate
        } else if is_write_conflict(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Db(err)
        }
    }
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::DuplicateVote,
            StoreError::OptionMissing => Self::NotFound(Missing::Option),
            StoreError::Conflict(_) => Self::Transient,
            StoreError::Db(e) => {
                error!("Vote storage failed: {e}");
                Self::Transient
            }
        }
    }
}

/// Persistent storage for polls and votes.
///
/// Implementations must make [`VoteStore::commit_vote`] atomic: either the
/// vote record is stored and the option's tally is incremented by one, or
/// neither happens. At most one vote may ever exist per `(user, post)` pair.
#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, StoreError>;

    async fn find_option(&self, option_id: OptionId) -> Result<Option<PollOption>, StoreError>;

    async fn find_vote(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// Store the vote and increment its option's tally as one unit.
    async fn commit_vote(&self, vote: &VoteRecord) -> Result<(), StoreError>;
}
