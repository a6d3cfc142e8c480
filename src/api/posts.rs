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
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::AuthToken,
        pagination::{Paginated, PaginationRequest},
        post::{PostDescription, PostSpec, PostSummary, PostUpdate},
    },
    common::PostId,
    db::{Comment, Like, PollOption, Post, VoteRecord},
    mongodb::{id_filter, Coll, Counter},
};

use super::common::{options_for_post, owned_post_by_id, post_by_id};

pub fn routes() -> Vec<Route> {
    routes![create_post, list_posts, get_post, update_post, delete_post]
}

#[post("/posts", data = "<spec>", format = "json")]
pub async fn create_post(
    request_id: &RequestId,
    token: AuthToken,
    spec: Json<PostSpec>,
    posts: Coll<Post>,
    options: Coll<PollOption>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<Custom<Json<PostDescription>>> {
    spec.validate()?;
    let option_count = u32::try_from(spec.options.len())
        .map_err(|_| Error::bad_request("Too many options"))?;

    // IDs are reserved outside the transaction; an abort just leaves a gap.
    let post_id = Counter::next::<Post>(&counters).await?;
    let first_option = Counter::reserve::<PollOption>(&counters, option_count).await?;
    let (post, new_options) = spec.0.into_post(post_id, token.id, first_option)?;

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        posts
            .insert_one_with_session(&post, None, &mut session)
            .await?;
        options
            .insert_many_with_session(&new_options, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }
    info!(
        "{request_id} user {} created post {post_id} with {option_count} options",
        token.id
    );

    Ok(Custom(
        Status::Created,
        Json(PostDescription::new(post, new_options)),
    ))
}

#[get("/posts?<pagination..>")]
pub async fn list_posts(
    pagination: PaginationRequest,
    posts: Coll<Post>,
) -> Result<Json<Paginated<PostSummary>>> {
    pagination.validate()?;

    // Newest first; IDs break ties between posts created in the same millisecond.
    let page_options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .skip(pagination.skip())
        .limit(i64::from(pagination.page_size()))
        .build();
    let page = posts
        .find(None, page_options)
        .await?
        .map_ok(PostSummary::from)
        .try_collect::<Vec<_>>()
        .await?;
    let total = posts.count_documents(None, None).await?;

    Ok(Json(pagination.to_paginated(total, page)))
}

#[get("/posts/<post_id>")]
pub async fn get_post(
    post_id: PostId,
    posts: Coll<Post>,
    options: Coll<PollOption>,
) -> Result<Json<PostDescription>> {
    let post = post_by_id(post_id, &posts).await?;
    let options = options_for_post(post_id, &options).await?;
    Ok(Json(PostDescription::new(post, options)))
}

#[put("/posts/<post_id>", data = "<update>", format = "json")]
pub async fn update_post(
    token: AuthToken,
    post_id: PostId,
    update: Json<PostUpdate>,
    posts: Coll<Post>,
    options: Coll<PollOption>,
) -> Result<Json<PostDescription>> {
    update.validate()?;
    owned_post_by_id(&token, post_id, &posts).await?;

    let changes = doc! {
        "$set": {
            "title": &update.title,
            "content": &update.content,
            "updated_at": BsonDateTime::now(),
        }
    };
    let after = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let post = posts
        .find_one_and_update(id_filter(post_id), changes, after)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {post_id}")))?;
    let options = options_for_post(post_id, &options).await?;

    Ok(Json(PostDescription::new(post, options)))
}

#[delete("/posts/<post_id>")]
#[allow(clippy::too_many_arguments)]
pub async fn delete_post(
    request_id: &RequestId,
    token: AuthToken,
    post_id: PostId,
    posts: Coll<Post>,
    options: Coll<PollOption>,
    votes: Coll<VoteRecord>,
    comments: Coll<Comment>,
    likes: Coll<Like>,
    db_client: &State<Client>,
    locks: &State<PostLocks>,
) -> Result<()> {
    owned_post_by_id(&token, post_id, &posts).await?;

    // Votes, likes and comments on this post wait until the cascade is done.
    let _turn = locks.lock(post_id).await;
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let result = posts
        .delete_one_with_session(id_filter(post_id), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        // Deleted concurrently; dropping the session aborts the transaction.
        return Err(Error::not_found(format!("Post {post_id}")));
    }
    let with_post = doc! { "post_id": post_id };
    options
        .delete_many_with_session(with_post.clone(), None, &mut session)
        .await?;
    votes
        .delete_many_with_session(with_post.clone(), None, &mut session)
        .await?;
    comments
        .delete_many_with_session(with_post.clone(), None, &mut session)
        .await?;
    likes
        .delete_many_with_session(with_post, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    info!("{request_id} user {} deleted post {post_id}", token.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mongodb::{bson::Document, Database};
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::model::{
        api::{auth::SignUpRequest, post::OptionSpec},
        mongodb::MongoCollection,
    };

    use super::super::common::testing::{create_post as create, switch_user};
    use super::*;

    #[backend_test(user)]
    async fn create_and_get(client: Client, db: Database) {
        let created = create(&client, &PostSpec::current_example()).await;
        assert_eq!(created.title, "Team lunch");
        assert_eq!(created.like_count, 0);
        assert_eq!(
            created
                .options
                .iter()
                .map(|o| (o.content.as_str(), o.tally))
                .collect::<Vec<_>>(),
            vec![("Noodles", 0), ("Tacos", 0)]
        );
        assert_eq!(count_matches::<PollOption>(&db, doc! {}).await, 2);

        let response = client.get(uri!(get_post(created.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let fetched: PostDescription = response.into_json().await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.user_id, created.user_id);
        assert_eq!(fetched.options, created.options);
        // Stored datetimes keep millisecond precision.
        assert_eq!(
            fetched.end_date.timestamp_millis(),
            created.end_date.timestamp_millis()
        );

        let response = client.get(uri!(get_post(created.id + 1))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(user)]
    async fn invalid_posts_are_rejected(client: Client, db: Database) {
        let mut inverted = PostSpec::current_example();
        inverted.end_date = inverted.start_date - Duration::hours(1);
        let mut no_options = PostSpec::current_example();
        no_options.options.clear();
        let mut blank_option = PostSpec::current_example();
        blank_option.options.push(OptionSpec {
            content: String::new(),
        });

        for spec in [inverted, no_options, blank_option] {
            let response = client
                .post(uri!(create_post))
                .header(ContentType::JSON)
                .body(json!(spec).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest);
        }
        assert_eq!(count_matches::<Post>(&db, doc! {}).await, 0);
        assert_eq!(count_matches::<PollOption>(&db, doc! {}).await, 0);
    }

    #[backend_test]
    async fn create_requires_login(client: Client, db: Database) {
        let response = client
            .post(uri!(create_post))
            .header(ContentType::JSON)
            .body(json!(PostSpec::current_example()).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(count_matches::<Post>(&db, doc! {}).await, 0);
    }

    #[backend_test(user)]
    async fn list_newest_first(client: Client) {
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut spec = PostSpec::current_example();
            spec.title = format!("Poll {i}");
            ids.push(create(&client, &spec).await.id);
        }
        ids.reverse();

        let response = client
            .get(uri!(list_posts(PaginationRequest::new(1, 3))))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let page: Paginated<PostSummary> = response.into_json().await.unwrap();
        assert_eq!(page.pagination.total, 5);
        assert_eq!(
            page.items.iter().map(|p| p.id).collect::<Vec<_>>(),
            ids[..3]
        );

        let response = client
            .get(uri!(list_posts(PaginationRequest::new(2, 3))))
            .dispatch()
            .await;
        let page: Paginated<PostSummary> = response.into_json().await.unwrap();
        assert_eq!(
            page.items.iter().map(|p| p.id).collect::<Vec<_>>(),
            ids[3..]
        );

        let response = client
            .get(uri!(list_posts(PaginationRequest::new(1, 101))))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test(user)]
    async fn only_the_owner_may_edit(client: Client, posts: Coll<Post>) {
        let created = create(&client, &PostSpec::current_example()).await;
        let update = PostUpdate {
            title: "Team dinner".to_string(),
            content: "Changed plans".to_string(),
        };

        let response = client
            .put(uri!(update_post(created.id)))
            .header(ContentType::JSON)
            .body(json!(update).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: PostDescription = response.into_json().await.unwrap();
        assert_eq!(updated.title, "Team dinner");
        assert_eq!(updated.content, "Changed plans");
        assert_eq!(updated.options, created.options);

        switch_user(&client, SignUpRequest::example2()).await;
        let response = client
            .put(uri!(update_post(created.id)))
            .header(ContentType::JSON)
            .body(json!(PostUpdate { title: "Mine now".to_string(), ..update }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.delete(uri!(delete_post(created.id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let stored = posts
            .find_one(id_filter(created.id), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Team dinner");
    }

    #[backend_test(user)]
    async fn delete_cascades(client: Client, db: Database) {
        let doomed = create(&client, &PostSpec::current_example()).await;
        let kept = create(&client, &PostSpec::current_example()).await;

        // Give the doomed post a vote, a comment and a like.
        let now = Utc::now();
        Coll::<VoteRecord>::from_db(&db)
            .insert_one(
                VoteRecord {
                    user_id: 1,
                    post_id: doomed.id,
                    option_id: doomed.options[0].id,
                    cast_at: now,
                },
                None,
            )
            .await
            .unwrap();
        Coll::<Comment>::from_db(&db)
            .insert_one(
                Comment {
                    id: 1,
                    post_id: doomed.id,
                    user_id: 1,
                    content: "Noodles!".to_string(),
                    created_at: now,
                    updated_at: now,
                },
                None,
            )
            .await
            .unwrap();
        Coll::<Like>::from_db(&db)
            .insert_one(
                Like {
                    post_id: doomed.id,
                    user_id: 1,
                    liked_at: now,
                },
                None,
            )
            .await
            .unwrap();

        let response = client.delete(uri!(delete_post(doomed.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let with_post = doc! { "post_id": doomed.id };
        assert_no_matches::<Post>(&db, id_filter(doomed.id)).await;
        assert_no_matches::<PollOption>(&db, with_post.clone()).await;
        assert_no_matches::<VoteRecord>(&db, with_post.clone()).await;
        assert_no_matches::<Comment>(&db, with_post.clone()).await;
        assert_no_matches::<Like>(&db, with_post).await;

        // Other posts are untouched.
        assert_eq!(count_matches::<Post>(&db, id_filter(kept.id)).await, 1);
        assert_eq!(
            count_matches::<PollOption>(&db, doc! { "post_id": kept.id }).await,
            2
        );

        let response = client.delete(uri!(delete_post(doomed.id))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    async fn count_matches<T: MongoCollection>(db: &Database, filter: Document) -> u64 {
        Coll::<T>::from_db(db)
            .count_documents(filter, None)
            .await
            .unwrap()
    }

    async fn assert_no_matches<T: MongoCollection>(db: &Database, filter: Document) {
        assert_eq!(count_matches::<T>(db, filter).await, 0);
    }
}
