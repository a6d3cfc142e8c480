use mongodb::bson::doc;
use rocket::{http::Status, response::status::Custom, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        vote::{OwnVote, VoteReceipt, VoteRequest},
    },
    common::PostId,
    db::VoteRecord,
    mongodb::Coll,
};
use crate::vote::{MongoVoteStore, VotingService};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, my_vote]
}

#[post("/posts/<post_id>/votes", data = "<request>", format = "json")]
pub async fn cast_vote(
    token: AuthToken,
    post_id: PostId,
    request: Json<VoteRequest>,
    voting: VotingService<MongoVoteStore>,
) -> Result<Custom<Json<VoteReceipt>>> {
    voting
        .cast_vote(post_id, request.option_id, token.id)
        .await?;
    Ok(Custom(Status::Created, Json(VoteReceipt::accepted())))
}

#[get("/posts/<post_id>/votes/mine")]
pub async fn my_vote(
    token: AuthToken,
    post_id: PostId,
    votes: Coll<VoteRecord>,
) -> Result<Json<OwnVote>> {
    let filter = doc! {
        "user_id": token.id,
        "post_id": post_id,
    };
    let vote = votes
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Your vote in post {post_id}")))?;
    Ok(Json(vote.into()))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
        tokio,
    };

    use crate::model::{
        api::{auth::SignUpRequest, post::PostSpec},
        db::PollOption,
        mongodb::id_filter,
    };
    use crate::contention::PostLocks;
    use crate::vote::VoteError;
    use crate::Config;

    use super::super::common::testing::{create_post, switch_user};
    use super::*;

    async fn vote<'c>(client: &'c Client, post_id: PostId, option_id: u32) -> LocalResponse<'c> {
        client
            .post(uri!(cast_vote(post_id)))
            .header(ContentType::JSON)
            .body(json!(VoteRequest { option_id }).to_string())
            .dispatch()
            .await
    }

    async fn tally(db: &Database, option_id: u32) -> u32 {
        Coll::<PollOption>::from_db(db)
            .find_one(id_filter(option_id), None)
            .await
            .unwrap()
            .unwrap()
            .tally
    }

    async fn error_message(response: LocalResponse<'_>) -> String {
        let body: Value = response.into_json().await.unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    #[backend_test(user)]
    async fn vote_then_vote_again(client: Client, db: Database) {
        let post = create_post(&client, &PostSpec::current_example()).await;
        let (first, second) = (post.options[0].id, post.options[1].id);

        let response = vote(&client, post.id, first).await;
        assert_eq!(response.status(), Status::Created);
        let receipt: Value = response.into_json().await.unwrap();
        assert_eq!(receipt, json!({ "status": "accepted" }));
        assert_eq!(tally(&db, first).await, 1);

        let response = vote(&client, post.id, second).await;
        assert_eq!(response.status(), Status::Conflict);
        assert_eq!(
            error_message(response).await,
            VoteError::DuplicateVote.to_string()
        );
        assert_eq!(tally(&db, first).await, 1);
        assert_eq!(tally(&db, second).await, 0);

        let response = client.get(uri!(my_vote(post.id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let mine: OwnVote = response.into_json().await.unwrap();
        assert_eq!(mine.option_id, first);
    }

    #[backend_test(user)]
    async fn votes_outside_the_window(client: Client, db: Database) {
        for spec in [PostSpec::future_example(), PostSpec::past_example()] {
            let post = create_post(&client, &spec).await;
            let response = vote(&client, post.id, post.options[0].id).await;
            assert_eq!(response.status(), Status::BadRequest);
            assert_eq!(tally(&db, post.options[0].id).await, 0);

            let response = client.get(uri!(my_vote(post.id))).dispatch().await;
            assert_eq!(response.status(), Status::NotFound);
        }
    }

    #[backend_test(user)]
    async fn unknown_targets(client: Client, votes: Coll<VoteRecord>) {
        let post = create_post(&client, &PostSpec::current_example()).await;
        let other = create_post(&client, &PostSpec::current_example()).await;

        let response = vote(&client, post.id + 100, post.options[0].id).await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(error_message(response).await, "Post not found");

        // An option of another post is not an option of this one.
        let response = vote(&client, post.id, other.options[0].id).await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(error_message(response).await, "Option not found");

        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn voting_requires_login(client: Client) {
        let response = vote(&client, 1, 1).await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(user)]
    async fn voters_are_independent(client: Client, db: Database) {
        let post = create_post(&client, &PostSpec::current_example()).await;
        let option = post.options[1].id;
        assert_eq!(vote(&client, post.id, option).await.status(), Status::Created);

        switch_user(&client, SignUpRequest::example2()).await;
        assert_eq!(vote(&client, post.id, option).await.status(), Status::Created);
        assert_eq!(tally(&db, option).await, 2);
    }

    /// A voting service like the one each request builds for itself.
    fn voting(client: &Client, db: &Database) -> VotingService<MongoVoteStore> {
        let rocket = client.rocket();
        let db_client = rocket.state::<mongodb::Client>().unwrap().clone();
        let config = rocket.state::<Config>().unwrap();
        let locks = rocket.state::<PostLocks>().unwrap().clone();
        let timeout = config.vote_commit_timeout();
        VotingService::new(MongoVoteStore::new(db_client, db, timeout), timeout, locks)
    }

    #[backend_test(user)]
    async fn concurrent_votes_are_all_counted(client: Client, db: Database) {
        let post = create_post(&client, &PostSpec::current_example()).await;
        let (post_id, option) = (post.id, post.options[0].id);

        // The service itself doesn't check that voters have accounts.
        let handles = (1000..1100)
            .map(|user_id| {
                let voting = voting(&client, &db);
                tokio::spawn(async move { voting.cast_vote(post_id, option, user_id).await })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(tally(&db, option).await, 100);
        let recorded = Coll::<VoteRecord>::from_db(&db)
            .count_documents(doc! { "post_id": post_id }, None)
            .await
            .unwrap();
        assert_eq!(recorded, 100);
    }

    #[backend_test(user)]
    async fn racing_votes_by_one_user_count_once(client: Client, db: Database) {
        let post = create_post(&client, &PostSpec::current_example()).await;
        let post_id = post.id;

        let handles = post
            .options
            .iter()
            .map(|option| {
                let (voting, option_id) = (voting(&client, &db), option.id);
                tokio::spawn(async move { voting.cast_vote(post_id, option_id, 1000).await })
            })
            .collect::<Vec<_>>();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results.iter().filter(|r| **r == Err(VoteError::DuplicateVote)).count(),
            post.options.len() - 1
        );
        let mut total = 0;
        for option in &post.options {
            total += tally(&db, option.id).await;
        }
        assert_eq!(total, 1);
    }
}
