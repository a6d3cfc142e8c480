use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::OptionId, db::VoteRecord};

/// A request to vote for one option of the post named in the URI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: OptionId,
}

/// Outcome of a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Accepted,
}

/// Response to a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub status: VoteStatus,
}

impl VoteReceipt {
    pub fn accepted() -> Self {
        Self {
            status: VoteStatus::Accepted,
        }
    }
}

/// The caller's own vote in a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnVote {
    pub option_id: OptionId,
    pub cast_at: DateTime<Utc>,
}

impl From<VoteRecord> for OwnVote {
    fn from(record: VoteRecord) -> Self {
        Self {
            option_id: record.option_id,
            cast_at: record.cast_at,
        }
    }
}
