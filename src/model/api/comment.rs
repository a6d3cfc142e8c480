use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{CommentId, PostId, UserId},
    db::Comment,
};

/// The body of a new or edited comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentSpec {
    pub content: String,
}

impl CommentSpec {
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::bad_request("Comment content must not be blank"));
        }
        Ok(())
    }
}

/// A comment as shown to readers, with its author's nickname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDescription {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    /// `None` if the author's account no longer exists.
    pub nickname: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentDescription {
    pub fn new(comment: Comment, nickname: Option<String>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            nickname,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}
