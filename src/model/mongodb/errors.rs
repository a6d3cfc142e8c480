//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// Return true if the given error is a duplicate key violation.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the given error means the transaction lost a race with
/// another writer and none of its writes were kept.
pub fn is_aborted_by_conflict(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
        || matches!(*err.kind, ErrorKind::Command(ref e) if e.code == WRITE_CONFLICT)
}

/// Return true if the given error means the transaction lost a race with
/// another writer, or its outcome is unknown, and may succeed if run again.
///
/// Only safe to retry on when a repeated commit is caught by a unique index.
pub fn is_write_conflict(err: &DbError) -> bool {
    is_aborted_by_conflict(err) || err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}

/// A write conflict error as the server reports it.
#[cfg(test)]
pub fn example_write_conflict() -> DbError {
    use mongodb::{bson::doc, error::CommandError};

    let command: CommandError = mongodb::bson::from_document(doc! {
        "code": WRITE_CONFLICT,
        "codeName": "WriteConflict",
        "errmsg": "WriteConflict error: this operation conflicted with another operation.",
    })
    .unwrap();
    ErrorKind::Command(command).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_conflicts_are_recognised() {
        let err = example_write_conflict();
        assert!(is_aborted_by_conflict(&err));
        assert!(is_write_conflict(&err));
        assert!(!is_duplicate_key_error(&err));
    }
}
