use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Mutex, MutexGuard,
};

use crate::model::{
    common::{OptionId, PostId, UserId},
    db::{PollOption, Post, VoteRecord},
};

use super::{StoreError, VoteStore};

#[derive(Default)]
struct Ledger {
    posts: HashMap<PostId, Post>,
    options: HashMap<OptionId, PollOption>,
    votes: HashMap<(UserId, PostId), VoteRecord>,
}

/// Vote storage held in process memory. Every commit runs under one lock,
/// which makes it trivially atomic.
#[derive(Default)]
pub struct MemoryVoteStore {
    ledger: Mutex<Ledger>,
    /// Number of upcoming commits that will fail with a conflict.
    pending_conflicts: AtomicU32,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        // A panic while holding the lock can't leave a half-applied commit.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a post together with its options.
    pub fn insert_post(&self, post: Post, options: Vec<PollOption>) {
        let mut ledger = self.ledger();
        for option in options {
            ledger.options.insert(option.id, option);
        }
        ledger.posts.insert(post.id, post);
    }

    /// Remove an option, as if its post had been edited concurrently.
    pub fn remove_option(&self, option_id: OptionId) -> Option<PollOption> {
        self.ledger().options.remove(&option_id)
    }

    /// The current tally of an option, if it exists.
    pub fn tally(&self, option_id: OptionId) -> Option<u32> {
        self.ledger().options.get(&option_id).map(|o| o.tally)
    }

    /// How many votes have been recorded in a post.
    pub fn vote_count(&self, post_id: PostId) -> usize {
        self.ledger()
            .votes
            .values()
            .filter(|vote| vote.post_id == post_id)
            .count()
    }

    /// Make the next `count` commits fail with a conflict, without side effects.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryVoteStore {
    async fn find_post(&self, post_id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.ledger().posts.get(&post_id).cloned())
    }

    async fn find_option(&self, option_id: OptionId) -> Result<Option<PollOption>, StoreError> {
        Ok(self.ledger().options.get(&option_id).cloned())
    }

    async fn find_vote(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self.ledger().votes.get(&(user_id, post_id)).cloned())
    }

    async fn commit_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        if self.take_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        let mut ledger = self.ledger();
        let key = (vote.user_id, vote.post_id);
        if ledger.votes.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        let option = ledger
            .options
            .get_mut(&vote.option_id)
            .filter(|option| option.post_id == vote.post_id)
            .ok_or(StoreError::OptionMissing)?;
        option.tally += 1;
        ledger.votes.insert(key, vote.clone());
        Ok(())
    }
}
