use chrono::Utc;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client,
};
use rocket::{http::Status, response::status::Custom, serde::json::Json, Route, State};

use crate::contention::PostLocks;
use crate::error::{Error, Result};
use crate::model::{
    api::{auth::AuthToken, like::LikeStatus},
    common::{PostId, UserId},
    db::{Like, Post},
    mongodb::{id_filter, Coll},
};

use super::common::{post_by_id, retry_on_conflict};

pub fn routes() -> Vec<Route> {
    routes![toggle_like]
}

/// Like the post, or take back an existing like.
#[post("/posts/<post_id>/likes")]
pub async fn toggle_like(
    token: AuthToken,
    post_id: PostId,
    posts: Coll<Post>,
    likes: Coll<Like>,
    db_client: &State<Client>,
    locks: &State<PostLocks>,
) -> Result<Custom<Json<LikeStatus>>> {
    post_by_id(post_id, &posts).await?;

    let _turn = locks.lock(post_id).await;
    let status = retry_on_conflict("Like toggle", || {
        toggle_in_transaction(post_id, token.id, &posts, &likes, db_client)
    })
    .await?;

    Ok(Custom(Status::Created, Json(status)))
}

/// Flip the user's like and the post's `like_count` together.
async fn toggle_in_transaction(
    post_id: PostId,
    user_id: UserId,
    posts: &Coll<Post>,
    likes: &Coll<Like>,
    db_client: &Client,
) -> Result<LikeStatus> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let own_like = doc! {
        "post_id": post_id,
        "user_id": user_id,
    };
    let removed = likes
        .delete_one_with_session(own_like, None, &mut session)
        .await?;
    let (liked, delta) = if removed.deleted_count > 0 {
        (false, -1)
    } else {
        let like = Like {
            post_id,
            user_id,
            liked_at: Utc::now(),
        };
        likes
            .insert_one_with_session(&like, None, &mut session)
            .await?;
        (true, 1)
    };

    let after = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let post = posts
        .find_one_and_update_with_session(
            id_filter(post_id),
            doc! { "$inc": { "like_count": delta } },
            after,
            &mut session,
        )
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {post_id}")))?;

    session.commit_transaction().await?;

    Ok(LikeStatus {
        liked,
        like_count: post.like_count,
    })
}
