use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::vote::VoteError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a 404 naming the missing resource.
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    /// Shorthand for a 400 with the given explanation.
    pub fn bad_request(why: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, why.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Vote(VoteError::NotFound(_)) => Status::NotFound,
            Self::Vote(VoteError::OutOfWindow) => Status::BadRequest,
            Self::Vote(VoteError::DuplicateVote) => Status::Conflict,
            Self::Vote(VoteError::Transient) => Status::ServiceUnavailable,
            Self::Status(status, _) => *status,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Internal details stay in the log.
        let message = if status.code >= 500 {
            error!("{self}");
            status.reason_lossy().to_string()
        } else {
            debug!("{self}");
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).respond_to(req)
    }
}
