//! Types shared between the DB and API representations.

/// Our user IDs are integers.
pub type UserId = u32;
/// Our post (poll) IDs are integers.
pub type PostId = u32;
/// Our poll option IDs are integers, unique across all posts.
pub type OptionId = u32;
/// Our comment IDs are integers.
pub type CommentId = u32;
