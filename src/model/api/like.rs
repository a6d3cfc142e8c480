use serde::{Deserialize, Serialize};

/// The caller's like state for a post after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    /// Whether the caller now likes the post.
    pub liked: bool,
    pub like_count: u32,
}
