//! Local profile database
//!
//! A single SQLite file in the root folder. Its only table is a key-value
//! store: one key per entity type, each value a JSON-encoded array of the
//! whole collection.

pub mod init;
pub mod local_storage;

pub use init::*;
pub use local_storage::*;
