use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{OptionId, PostId, UserId};

/// Core post (poll) data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PostCore {
    /// Foreign key of the user who created the post.
    pub owner_id: UserId,
    pub title: String,
    pub content: String,
    /// Voting opens at this instant, inclusive.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub opens_at: DateTime<Utc>,
    /// Voting closes at this instant, inclusive.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub closes_at: DateTime<Utc>,
    /// Denormalised count of likes, maintained with the `likes` collection.
    pub like_count: u32,
    /// Denormalised count of comments, maintained with the `comments` collection.
    pub comment_count: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PostCore {
    /// Is voting allowed at the given instant?
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now <= self.closes_at
    }
}

/// A post from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    #[serde(flatten)]
    pub post: PostCore,
}

impl Deref for Post {
    type Target = PostCore;

    fn deref(&self) -> &Self::Target {
        &self.post
    }
}

/// One selectable answer of a poll, carrying its running tally.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "_id")]
    pub id: OptionId,
    /// Foreign key of the owning post.
    pub post_id: PostId,
    pub label: String,
    /// Zero-based index in the order the options were submitted.
    pub position: u32,
    /// Number of votes cast for this option.
    pub tally: u32,
}
