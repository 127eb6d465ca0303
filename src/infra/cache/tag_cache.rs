//! Redis-backed tag cache.

use async_trait::async_trait;

use common::AppResult;
use domain::Tag;

use super::{Cache, TagCache};
use crate::config::{CACHE_PREFIX_TAGS_BY_POST, CACHE_PREFIX_TAG_BY_NAME, TAG_CACHE_TTL_SECONDS};

pub struct RedisTagCache {
    client: Cache,
}

impl RedisTagCache {
    pub fn new(client: Cache) -> Self {
        Self { client }
    }

    fn post_key(post_id: i64) -> String {
        format!("{CACHE_PREFIX_TAGS_BY_POST}{post_id}")
    }

    fn name_key(name: &str) -> String {
        format!("{CACHE_PREFIX_TAG_BY_NAME}{name}")
    }
}

#[async_trait]
impl TagCache for RedisTagCache {
    async fn get_tags_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>> {
        self.client.get(&Self::post_key(post_id)).await
    }

    async fn set_tags_by_post(&self, post_id: i64, tags: &[Tag]) -> AppResult<()> {
        self.client
            .set_with_ttl(&Self::post_key(post_id), &tags, TAG_CACHE_TTL_SECONDS)
            .await
    }

    async fn delete_tags_by_post(&self, post_id: i64) -> AppResult<()> {
        self.client.delete(&Self::post_key(post_id)).await
    }

    async fn get_tag(&self, name: &str) -> AppResult<Tag> {
        self.client.get(&Self::name_key(name)).await
    }

    async fn set_tag(&self, tag: &Tag) -> AppResult<()> {
        self.client
            .set_with_ttl(&Self::name_key(&tag.name), tag, TAG_CACHE_TTL_SECONDS)
            .await
    }

    async fn delete_tag(&self, name: &str) -> AppResult<()> {
        self.client.delete(&Self::name_key(name)).await
    }
}
