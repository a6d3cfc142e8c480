mod collection;
mod counter;
mod errors;

pub use collection::{ensure_indexes_exist, id_filter, Coll, MongoCollection};
pub use counter::Counter;
pub use errors::{is_aborted_by_conflict, is_duplicate_key_error, is_write_conflict};
#[cfg(test)]
pub use errors::example_write_conflict;
