//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod auth;
pub mod comment;
pub mod like;
pub mod pagination;
pub mod post;
pub mod vote;
