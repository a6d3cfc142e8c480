use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::{
        api::auth::{AuthToken, LoginRequest, SignUpRequest, UserDescription, AUTH_TOKEN_COOKIE},
        db::User,
        mongodb::{is_duplicate_key_error, Coll, Counter},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![sign_up, log_in, log_out]
}

fn username_taken(username: &str) -> Error {
    Error::Status(
        Status::Conflict,
        format!("Username '{username}' is already taken"),
    )
}

#[post("/sign-up", data = "<request>", format = "json")]
pub async fn sign_up(
    request_id: &RequestId,
    request: Json<SignUpRequest>,
    users: Coll<User>,
    counters: Coll<Counter>,
) -> Result<Custom<Json<UserDescription>>> {
    request.validate()?;

    let with_username = doc! {
        "username": &request.user_name,
    };
    if users.find_one(with_username, None).await?.is_some() {
        return Err(username_taken(&request.user_name));
    }

    let id = Counter::next::<User>(&counters).await?;
    let user = request.0.into_user(id)?;
    // Two sign-ups can race past the check above; the unique index decides.
    if let Err(e) = users.insert_one(&user, None).await {
        return Err(if is_duplicate_key_error(&e) {
            username_taken(&user.username)
        } else {
            e.into()
        });
    }
    info!("{request_id} signed up user {id}");

    Ok(Custom(Status::Created, Json(user.into())))
}

#[post("/log-in", data = "<credentials>", format = "json")]
pub async fn log_in(
    cookies: &CookieJar<'_>,
    credentials: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let with_username = doc! {
        "username": &credentials.user_name,
    };
    let user = users
        .find_one(with_username, None)
        .await?
        .ok_or_else(|| Error::bad_request("No user found with the provided username"))?;
    if !user.verify_password(&credentials.password) {
        return Err(Error::Status(
            Status::Unauthorized,
            "Incorrect password".to_string(),
        ));
    }

    cookies.add(AuthToken::new(&user).into_cookie(config)?);

    Ok(Json(user.into()))
}

#[delete("/log-out")]
pub fn log_out(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
