//! UUID utilities
//!
//! Client-side identifiers are random v4 UUIDs rendered as lowercase
//! hyphenated strings.

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new UUIDv4 as a string id
pub fn generate_id() -> String {
    generate().to_string()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}
