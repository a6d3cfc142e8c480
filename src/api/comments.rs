use std::collections::HashMap;

use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client,
};
use rocket::{
    futures::TryStreamExt, http::Status, response::status::Custom, serde::json::Json, Route,
    State,
};

use crate::contention::PostLocks;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        comment::{CommentDescription, CommentSpec},
    },
    common::{CommentId, PostId, UserId},
    db::{Comment, Post, User},
    mongodb::{id_filter, Coll, Counter},
};

use super::common::{post_by_id, retry_on_conflict};

pub fn routes() -> Vec<Route> {
    routes![create_comment, list_comments, update_comment, delete_comment]
}

/// Look up a comment on the given post, written by the token's user.
async fn own_comment(
    token: &AuthToken,
    post_id: PostId,
    comment_id: CommentId,
    comments: &Coll<Comment>,
) -> Result<Comment> {
    let filter = doc! {
        "_id": comment_id,
        "post_id": post_id,
    };
    let comment = comments
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Comment {comment_id} on post {post_id}")))?;
    if comment.user_id != token.id {
        return Err(Error::Status(
            Status::Forbidden,
            format!("Comment {comment_id} was written by another user"),
        ));
    }
    Ok(comment)
}

async fn nickname_of(user_id: UserId, users: &Coll<User>) -> Result<Option<String>> {
    let user = users.find_one(id_filter(user_id), None).await?;
    Ok(user.map(|user| user.user.nickname))
}

#[post("/posts/<post_id>/comments", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
pub async fn create_comment(
    token: AuthToken,
    post_id: PostId,
    spec: Json<CommentSpec>,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    users: Coll<User>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
    locks: &State<PostLocks>,
) -> Result<Custom<Json<CommentDescription>>> {
    spec.validate()?;
    post_by_id(post_id, &posts).await?;

    let now = Utc::now();
    let comment = Comment {
        id: Counter::next::<Comment>(&counters).await?,
        post_id,
        user_id: token.id,
        content: spec.0.content,
        created_at: now,
        updated_at: now,
    };

    {
        let _turn = locks.lock(post_id).await;
        retry_on_conflict("Comment insert", || {
            insert_in_transaction(&comment, &posts, &comments, db_client)
        })
        .await?;
    }

    let nickname = nickname_of(token.id, &users).await?;
    Ok(Custom(
        Status::Created,
        Json(CommentDescription::new(comment, nickname)),
    ))
}

/// Store the comment and bump its post's `comment_count` together.
async fn insert_in_transaction(
    comment: &Comment,
    posts: &Coll<Post>,
    comments: &Coll<Comment>,
    db_client: &Client,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    comments
        .insert_one_with_session(comment, None, &mut session)
        .await?;
    let result = posts
        .update_one_with_session(
            id_filter(comment.post_id),
            doc! { "$inc": { "comment_count": 1 } },
            None,
            &mut session,
        )
        .await?;
    if result.matched_count == 0 {
        // The post was deleted since we looked; the transaction is dropped.
        return Err(Error::not_found(format!("Post {}", comment.post_id)));
    }

    session.commit_transaction().await?;
    Ok(())
}

#[get("/posts/<post_id>/comments")]
pub async fn list_comments(
    post_id: PostId,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    users: Coll<User>,
) -> Result<Json<Vec<CommentDescription>>> {
    post_by_id(post_id, &posts).await?;

    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build();
    let comments: Vec<Comment> = comments
        .find(doc! { "post_id": post_id }, newest_first)
        .await?
        .try_collect()
        .await?;

    // Fetch every author once.
    let mut author_ids = comments.iter().map(|c| c.user_id).collect::<Vec<_>>();
    author_ids.sort_unstable();
    author_ids.dedup();
    let nicknames: HashMap<UserId, String> = users
        .find(doc! { "_id": { "$in": author_ids } }, None)
        .await?
        .map_ok(|user| (user.id, user.user.nickname))
        .try_collect()
        .await?;

    let descriptions = comments
        .into_iter()
        .map(|comment| {
            let nickname = nicknames.get(&comment.user_id).cloned();
            CommentDescription::new(comment, nickname)
        })
        .collect();
    Ok(Json(descriptions))
}

#[put("/posts/<post_id>/comments/<comment_id>", data = "<spec>", format = "json")]
pub async fn update_comment(
    token: AuthToken,
    post_id: PostId,
    comment_id: CommentId,
    spec: Json<CommentSpec>,
    comments: Coll<Comment>,
    users: Coll<User>,
) -> Result<Json<CommentDescription>> {
    spec.validate()?;
    own_comment(&token, post_id, comment_id, &comments).await?;

    let changes = doc! {
        "$set": {
            "content": &spec.content,
            "updated_at": BsonDateTime::now(),
        }
    };
    let after = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let comment = comments
        .find_one_and_update(id_filter(comment_id), changes, after)
        .await?
        .ok_or_else(|| Error::not_found(format!("Comment {comment_id} on post {post_id}")))?;

    let nickname = nickname_of(token.id, &users).await?;
    Ok(Json(CommentDescription::new(comment, nickname)))
}

#[delete("/posts/<post_id>/comments/<comment_id>")]
pub async fn delete_comment(
    token: AuthToken,
    post_id: PostId,
    comment_id: CommentId,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    db_client: &State<Client>,
    locks: &State<PostLocks>,
) -> Result<()> {
    own_comment(&token, post_id, comment_id, &comments).await?;

    let _turn = locks.lock(post_id).await;
    retry_on_conflict("Comment delete", || {
        delete_in_transaction(post_id, comment_id, &posts, &comments, db_client)
    })
    .await
}

/// Remove the comment and drop its post's `comment_count` together.
async fn delete_in_transaction(
    post_id: PostId,
    comment_id: CommentId,
    posts: &Coll<Post>,
    comments: &Coll<Comment>,
    db_client: &Client,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = comments
        .delete_one_with_session(id_filter(comment_id), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!(
            "Comment {comment_id} on post {post_id}"
        )));
    }
    posts
        .update_one_with_session(
            id_filter(post_id),
            doc! { "$inc": { "comment_count": -1 } },
            None,
            &mut session,
        )
        .await?;

    session.commit_transaction().await?;
    Ok(())
}
