use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::Database;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::UserId,
    db::User,
    mongodb::{id_filter, Coll},
};

/// Cookie holding the session JWT.
pub const AUTH_TOKEN_COOKIE: &str = "authorization";
/// The only accepted token type in an `Authorization` header.
pub const TOKEN_TYPE: &str = "Bearer";

/// An authentication token representing a specific user.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: UserId,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self { id: user.id }
    }

    /// Sign this token into a JWT that expires after the configured TTL.
    pub fn encode(self, config: &Config) -> Result<String, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Verify a JWT and extract the token from it.
    pub fn decode(jwt: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }

    /// Sign this token into a session cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let jwt = self.encode(config)?;
        Ok(Cookie::build(AUTH_TOKEN_COOKIE, jwt)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Get the raw JWT from the request: an `Authorization: Bearer <jwt>`
    /// header takes precedence over the session cookie.
    fn raw_token(req: &Request<'_>) -> Result<Option<String>, Error> {
        if let Some(header) = req.headers().get_one("Authorization") {
            return match header.split_once(' ') {
                Some((TOKEN_TYPE, jwt)) => Ok(Some(jwt.trim().to_string())),
                _ => Err(Error::Status(
                    Status::Unauthorized,
                    format!("Token type must be {TOKEN_TYPE}"),
                )),
            };
        }
        Ok(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string()))
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the request and check the user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let unauthorized = |why: &str| {
            Outcome::Failure((
                Status::Unauthorized,
                Error::Status(Status::Unauthorized, why.to_string()),
            ))
        };

        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let jwt = match Self::raw_token(req) {
            Ok(Some(jwt)) => jwt,
            Ok(None) => return unauthorized("Login required"),
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        let token = match Self::decode(&jwt, config) {
            Ok(token) => token,
            Err(Error::Jwt(e)) => {
                debug!("Rejected session token: {e}");
                return unauthorized("Invalid or expired token");
            }
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        // Check the user actually exists.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match Coll::<User>::from_db(db)
            .find_one(id_filter(token.id), None)
            .await
        {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => unauthorized("Token user does not exist"),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_survives_signing() {
        let config = Config::example();
        let jwt = AuthToken { id: 17 }.encode(&config).unwrap();
        assert_eq!(AuthToken::decode(&jwt, &config).unwrap(), AuthToken { id: 17 });
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let config = Config::example();
        let forged = jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                token: AuthToken { id: 1 },
                expire_at: Utc::now() + chrono::Duration::minutes(5),
            },
            &EncodingKey::from_secret(b"not the server secret"),
        )
        .unwrap();
        assert!(matches!(
            AuthToken::decode(&forged, &config),
            Err(Error::Jwt(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::example();
        let expired = jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                token: AuthToken { id: 1 },
                expire_at: Utc::now() - chrono::Duration::hours(1),
            },
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap();
        assert!(AuthToken::decode(&expired, &config).is_err());
    }
}
