//! Tag entity shared across posts.

use serde::{Deserialize, Serialize};

/// A tag. Names are globally unique and case-sensitive in storage;
/// filter matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}
