//! Post domain entity and its data transfer objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{PostMedia, PostMediaInput};
use crate::tag::Tag;
use crate::user::User;

/// Post domain entity.
///
/// Timestamps are server-assigned; `None` means the stored value is not
/// valid (never the case for rows read back from the store, but preserved
/// on the wire where timestamps are optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate returned to callers: a post plus its author profile,
/// position-ordered media and tag list.
///
/// `author` is absent when the profile lookup was skipped or tolerated a
/// failure; `media` / `tags` are `None` when the post has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetailed {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<PostMedia>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// Input for the create use-case. Wire validation has already happened
/// when this DTO reaches the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostDTO {
    pub author_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media_items: Vec<PostMediaInput>,
}

/// Partial update for a post. `None` fields are left untouched;
/// `media_items: Some(vec![])` replaces the media set with nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePostDTO {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_items: Option<Vec<PostMediaInput>>,
}
