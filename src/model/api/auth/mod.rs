mod credentials;
mod token;

pub use credentials::{LoginRequest, SignUpRequest, UserDescription};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE, TOKEN_TYPE};
