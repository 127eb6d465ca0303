//! Redis-backed post cache.

use async_trait::async_trait;

use common::AppResult;
use domain::PostDetailed;

use super::{Cache, PostCache};
use crate::config::{CACHE_PREFIX_POST, POST_CACHE_TTL_SECONDS};

pub struct RedisPostCache {
    client: Cache,
}

impl RedisPostCache {
    pub fn new(client: Cache) -> Self {
        Self { client }
    }

    fn key(post_id: i64) -> String {
        format!("{CACHE_PREFIX_POST}{post_id}")
    }
}

#[async_trait]
impl PostCache for RedisPostCache {
    async fn get_post(&self, post_id: i64) -> AppResult<PostDetailed> {
        self.client.get(&Self::key(post_id)).await
    }

    async fn set_post(&self, post: &PostDetailed) -> AppResult<()> {
        self.client
            .set_with_ttl(&Self::key(post.post.id), post, POST_CACHE_TTL_SECONDS)
            .await
    }

    async fn delete_post(&self, post_id: i64) -> AppResult<()> {
        self.client.delete(&Self::key(post_id)).await
    }
}
