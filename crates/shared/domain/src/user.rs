//! User profile as exposed by the user service.
//!
//! The post service never mutates users; it holds author ids and fetches
//! profiles on demand.

use serde::{Deserialize, Serialize};

/// External user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
