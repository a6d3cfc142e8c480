use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{OptionId, PostId, UserId};

/// A permanent record binding one user to one chosen option within one post.
/// The `(user_id, post_id)` pair is unique across the collection.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub user_id: UserId,
    pub post_id: PostId,
    pub option_id: OptionId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}
