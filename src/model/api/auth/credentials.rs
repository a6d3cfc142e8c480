use argon2::Config as Argon2Config;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::UserId,
    db::{User, UserCore},
};

pub const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=15;
pub const NICKNAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=15;
pub const PASSWORD_LENGTH: std::ops::RangeInclusive<usize> = 6..=20;

/// Raw sign-up details, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub user_name: String,
    pub nickname: String,
    pub password: String,
}

impl SignUpRequest {
    /// Check the username is short and alphanumeric, and the nickname and
    /// password have acceptable lengths.
    pub fn validate(&self) -> Result<()> {
        let username_len = self.user_name.chars().count();
        if !USERNAME_LENGTH.contains(&username_len)
            || !self.user_name.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::bad_request(
                "Username must be 3 to 15 letters or digits",
            ));
        }
        if !NICKNAME_LENGTH.contains(&self.nickname.chars().count()) {
            return Err(Error::bad_request(
                "Nickname must be 3 to 15 characters",
            ));
        }
        if !PASSWORD_LENGTH.contains(&self.password.chars().count()) {
            return Err(Error::bad_request(
                "Password must be 6 to 20 characters",
            ));
        }
        Ok(())
    }

    /// Validate and convert into a [`User`] with the given ID by hashing the password.
    pub fn into_user(self, id: UserId) -> Result<User> {
        self.validate()?;

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(self.password.as_bytes(), &salt, &Argon2Config::default())?;

        Ok(User {
            id,
            user: UserCore {
                username: self.user_name,
                nickname: self.nickname,
                password_hash,
                created_at: Utc::now(),
            },
        })
    }
}

/// Login details.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// The public view of a user; never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescription {
    pub id: UserId,
    pub user_name: String,
    pub nickname: String,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_name: user.user.username,
            nickname: user.user.nickname,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl SignUpRequest {
        pub fn example1() -> Self {
            Self {
                user_name: "alice112".into(),
                nickname: "Alice".into(),
                password: "pollster1".into(),
            }
        }

        pub fn example2() -> Self {
            Self {
                user_name: "bob".into(),
                nickname: "Bobby T".into(),
                password: "totallysecure".into(),
            }
        }
    }

    impl LoginRequest {
        pub fn example1() -> Self {
            let sign_up = SignUpRequest::example1();
            Self {
                user_name: sign_up.user_name,
                password: sign_up.password,
            }
        }
    }
}
