use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{PostId, UserId};

/// A user's like of a post. Present iff the post is currently liked by them.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Like {
    pub post_id: PostId,
    pub user_id: UserId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub liked_at: DateTime<Utc>,
}
