//! Redis-backed user cache.

use async_trait::async_trait;

use common::AppResult;
use domain::User;

use super::{Cache, UserCache};
use crate::config::{CACHE_PREFIX_USER, USER_CACHE_TTL_SECONDS};

pub struct RedisUserCache {
    client: Cache,
}

impl RedisUserCache {
    pub fn new(client: Cache) -> Self {
        Self { client }
    }

    fn key(user_id: i64) -> String {
        format!("{CACHE_PREFIX_USER}{user_id}")
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get_user(&self, user_id: i64) -> AppResult<User> {
        self.client.get(&Self::key(user_id)).await
    }

    async fn set_user(&self, user: &User) -> AppResult<()> {
        self.client
            .set_with_ttl(&Self::key(user.id), user, USER_CACHE_TTL_SECONDS)
            .await
    }

    async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        self.client.delete(&Self::key(user_id)).await
    }
}
