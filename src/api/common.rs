use std::future::Future;

use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, tokio::time::sleep};

use crate::contention::retry_backoff;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::AuthToken,
    common::PostId,
    db::{PollOption, Post},
    mongodb::{id_filter, is_aborted_by_conflict, Coll},
};

/// Look up a post, failing with 404 if it doesn't exist.
pub async fn post_by_id(post_id: PostId, posts: &Coll<Post>) -> Result<Post> {
    posts
        .find_one(id_filter(post_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {post_id}")))
}

/// Look up a post the token's user owns. Someone else's post is a 403.
pub async fn owned_post_by_id(
    token: &AuthToken,
    post_id: PostId,
    posts: &Coll<Post>,
) -> Result<Post> {
    let post = post_by_id(post_id, posts).await?;
    if post.owner_id != token.id {
        return Err(Error::Status(
            Status::Forbidden,
            format!("Post {post_id} belongs to another user"),
        ));
    }
    Ok(post)
}

/// All options of a post, in submission order.
pub async fn options_for_post(post_id: PostId, options: &Coll<PollOption>) -> Result<Vec<PollOption>> {
    let in_order = FindOptions::builder().sort(doc! { "position": 1 }).build();
    let options = options
        .find(doc! { "post_id": post_id }, in_order)
        .await?
        .try_collect()
        .await?;
    Ok(options)
}

fn aborted_by_conflict(err: &Error) -> bool {
    matches!(err, Error::Db(e) if is_aborted_by_conflict(e))
}

/// Run a transactional write, and run it once more after a short pause if a
/// concurrent writer made the database abort it. A second abort is a 503.
///
/// `write` must start a fresh transaction each time it is called.
pub async fn retry_on_conflict<T, F, Fut>(what: &str, mut write: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match write().await {
        Err(e) if aborted_by_conflict(&e) => warn!("{what} conflicted, retrying: {e}"),
        done => return done,
    }
    sleep(retry_backoff()).await;
    write().await.map_err(|e| {
        if aborted_by_conflict(&e) {
            error!("{what} conflicted again, giving up: {e}");
            Error::Status(
                Status::ServiceUnavailable,
                "The post is busy, please try again".to_string(),
            )
        } else {
            e
        }
    })
}
