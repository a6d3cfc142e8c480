use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{OptionId, PostId, UserId},
    db::{PollOption, Post, PostCore},
};

/// A new post, as submitted by its creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSpec {
    pub title: String,
    pub content: String,
    /// Voting opens at this instant.
    pub start_date: DateTime<Utc>,
    /// Voting closes at this instant.
    pub end_date: DateTime<Utc>,
    /// Poll options, in display order.
    pub options: Vec<OptionSpec>,
}

/// A new poll option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    pub content: String,
}

impl PostSpec {
    /// Reject blank text, empty option lists, and inverted voting windows.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(Error::bad_request("Title and content must not be blank"));
        }
        if self.options.is_empty() {
            return Err(Error::bad_request("A post needs at least one option"));
        }
        if self.options.iter().any(|o| o.content.trim().is_empty()) {
            return Err(Error::bad_request("Options must not be blank"));
        }
        if self.start_date > self.end_date {
            return Err(Error::bad_request("Voting cannot close before it opens"));
        }
        Ok(())
    }

    /// Validate and convert into a post and its options, given the post ID and
    /// the first of a contiguous block of option IDs.
    pub fn into_post(
        self,
        id: PostId,
        owner_id: UserId,
        first_option: OptionId,
    ) -> Result<(Post, Vec<PollOption>)> {
        self.validate()?;
        let now = Utc::now();
        let options = self
            .options
            .into_iter()
            .zip(0..)
            .map(|(option, position)| PollOption {
                id: first_option + position,
                post_id: id,
                label: option.content,
                position,
                tally: 0,
            })
            .collect();
        let post = Post {
            id,
            post: PostCore {
                owner_id,
                title: self.title,
                content: self.content,
                opens_at: self.start_date,
                closes_at: self.end_date,
                like_count: 0,
                comment_count: 0,
                created_at: now,
                updated_at: now,
            },
        };
        Ok((post, options))
    }
}

/// An edit to a post's text. The window and options are fixed once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostUpdate {
    pub title: String,
    pub content: String,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(Error::bad_request("Title and content must not be blank"));
        }
        Ok(())
    }
}

/// A summary of a post, as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub like_count: u32,
    pub comment_count: u32,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.post.title,
            start_date: post.post.opens_at,
            end_date: post.post.closes_at,
            like_count: post.post.like_count,
            comment_count: post.post.comment_count,
        }
    }
}

/// An option with its current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub id: OptionId,
    pub content: String,
    pub tally: u32,
}

impl From<PollOption> for OptionDescription {
    fn from(option: PollOption) -> Self {
        Self {
            id: option.id,
            content: option.label,
            tally: option.tally,
        }
    }
}

/// The full view of a post, including its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDescription {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub like_count: u32,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub options: Vec<OptionDescription>,
}

impl PostDescription {
    /// Describe a post; `options` must be sorted by position.
    pub fn new(post: Post, options: Vec<PollOption>) -> Self {
        Self {
            id: post.id,
            user_id: post.post.owner_id,
            title: post.post.title,
            content: post.post.content,
            start_date: post.post.opens_at,
            end_date: post.post.closes_at,
            like_count: post.post.like_count,
            comment_count: post.post.comment_count,
            created_at: post.post.created_at,
            updated_at: post.post.updated_at,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}
