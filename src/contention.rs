//! Serialising writers that touch the same post.
//!
//! MongoDB aborts a transaction as soon as it writes a document that another
//! open transaction has already written, instead of waiting for it. Votes,
//! likes and comments all update a counter on their post (or one of its
//! options), so concurrent writers on one post would mostly abort each other.
//! Queueing them per post inside this process keeps the database from ever
//! seeing that contention, and a short randomised pause spreads out retries
//! when it does happen (e.g. between several server processes).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::common::PostId;

/// Once this many posts have locks, idle ones are dropped on the next lookup.
const PRUNE_THRESHOLD: usize = 1024;

/// Bounds of the random pause before retrying a conflicted write, in ms.
const RETRY_BACKOFF_MS: Range<u64> = 20..60;

/// One async lock per post, shared by every request handler.
#[derive(Debug, Clone, Default)]
pub struct PostLocks {
    locks: Arc<Mutex<HashMap<PostId, Arc<AsyncMutex<()>>>>>,
}

impl PostLocks {
    /// Wait until no other writer in this process holds the lock for `post_id`,
    /// then hold it until the guard is dropped.
    pub async fn lock(&self, post_id: PostId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.table();
            if locks.len() >= PRUNE_THRESHOLD {
                // Held and awaited locks have a second reference.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(post_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// How many posts currently have a lock entry.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<PostId, Arc<AsyncMutex<()>>>> {
        // The table is only ever mutated by single calls that cannot panic halfway.
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A random pause to take before retrying a write that lost a race.
pub fn retry_backoff() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(RETRY_BACKOFF_MS))
}
