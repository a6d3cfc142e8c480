//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - Datetimes are serialised in MongoDB's own format.
//! - Field names are snake_case, as used in query filters.

mod comment;
pub use comment::Comment;

mod like;
pub use like::Like;

mod post;
pub use post::{PollOption, Post, PostCore};

mod user;
pub use user::{User, UserCore};

mod vote;
pub use vote::VoteRecord;
