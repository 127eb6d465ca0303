//! Key/value caches with TTL.
//!
//! A thin redis client wrapper plus typed cache contracts for posts,
//! users and tags. A missing key is reported with the distinguished
//! `CacheMiss` error, never a transport failure.

use async_trait::async_trait;

use common::AppResult;
use domain::{PostDetailed, Tag, User};

mod client;
mod post_cache;
mod tag_cache;
mod user_cache;

pub use client::Cache;
pub use post_cache::RedisPostCache;
pub use tag_cache::RedisTagCache;
pub use user_cache::RedisUserCache;

#[cfg(test)]
use mockall::automock;

/// Cached post aggregates keyed by post id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostCache: Send + Sync {
    async fn get_post(&self, post_id: i64) -> AppResult<PostDetailed>;
    async fn set_post(&self, post: &PostDetailed) -> AppResult<()>;
    async fn delete_post(&self, post_id: i64) -> AppResult<()>;
}

/// Cached user profiles keyed by user id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get_user(&self, user_id: i64) -> AppResult<User>;
    async fn set_user(&self, user: &User) -> AppResult<()>;
    async fn delete_user(&self, user_id: i64) -> AppResult<()>;
}

/// Cached tags, both per-post lists and single entries by name.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TagCache: Send + Sync {
    async fn get_tags_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>>;
    async fn set_tags_by_post(&self, post_id: i64, tags: &[Tag]) -> AppResult<()>;
    async fn delete_tags_by_post(&self, post_id: i64) -> AppResult<()>;
    async fn get_tag(&self, name: &str) -> AppResult<Tag>;
    async fn set_tag(&self, tag: &Tag) -> AppResult<()>;
    async fn delete_tag(&self, name: &str) -> AppResult<()>;
}
