//! Read-through / write-invalidate cache decorator.
//!
//! Same contract as the core service. The underlying service stays
//! authoritative: every cache failure other than a miss is logged and
//! ignored.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use common::{AppError, AppResult};
use domain::{CreatePostDTO, PostDetailed, PostFilters, UpdatePostDTO};

use super::PostUseCases;
use crate::infra::cache::{PostCache, TagCache, UserCache};
use crate::infra::metrics::MetricsProvider;

pub struct PostServiceCacheDecorator {
    service: Arc<dyn PostUseCases>,
    user_cache: Arc<dyn UserCache>,
    post_cache: Arc<dyn PostCache>,
    tag_cache: Arc<dyn TagCache>,
    metrics: Arc<dyn MetricsProvider>,
}

impl PostServiceCacheDecorator {
    pub fn new(
        service: Arc<dyn PostUseCases>,
        user_cache: Arc<dyn UserCache>,
        post_cache: Arc<dyn PostCache>,
        tag_cache: Arc<dyn TagCache>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            service,
            user_cache,
            post_cache,
            tag_cache,
            metrics,
        }
    }

    async fn cache_post(&self, post: &PostDetailed) {
        let start = Instant::now();
        if let Err(e) = self.post_cache.set_post(post).await {
            warn!(error = %e, post_id = post.post.id, "failed to cache post");
        }
        self.metrics
            .record_cache_operation_duration("post_set", start.elapsed());
    }

    async fn cache_author(&self, post: &PostDetailed) {
        if let Some(author) = &post.author {
            let start = Instant::now();
            if let Err(e) = self.user_cache.set_user(author).await {
                warn!(error = %e, user_id = author.id, "failed to cache author");
            }
            self.metrics
                .record_cache_operation_duration("user_set", start.elapsed());
        }
    }

    async fn cache_tags(&self, post: &PostDetailed) {
        if let Some(tags) = &post.tags {
            let start = Instant::now();
            if let Err(e) = self.tag_cache.set_tags_by_post(post.post.id, tags).await {
                warn!(error = %e, post_id = post.post.id, "failed to cache post tags");
            }
            self.metrics
                .record_cache_operation_duration("tags_set", start.elapsed());
        }
    }

    async fn invalidate_post(&self, id: i64, operation: &str) {
        let start = Instant::now();
        if let Err(e) = self.post_cache.delete_post(id).await {
            warn!(error = %e, post_id = id, operation, "failed to invalidate post cache");
        }
        self.metrics
            .record_cache_operation_duration("post_delete", start.elapsed());

        if let Err(e) = self.tag_cache.delete_tags_by_post(id).await {
            warn!(error = %e, post_id = id, operation, "failed to invalidate tag cache");
        }
    }
}

#[async_trait]
impl PostUseCases for PostServiceCacheDecorator {
    async fn create_post(&self, post: CreatePostDTO) -> AppResult<PostDetailed> {
        debug!(author_id = post.author_id, "creating post with cache decorator");
        let author_id = post.author_id;

        let result = self.service.create_post(post).await?;

        // The author's cached view may include their posts elsewhere.
        if let Err(e) = self.user_cache.delete_user(author_id).await {
            warn!(error = %e, user_id = author_id, "failed to invalidate user cache after post creation");
        }

        self.cache_post(&result).await;
        self.cache_author(&result).await;

        Ok(result)
    }

    async fn get_post_by_id(&self, id: i64) -> AppResult<PostDetailed> {
        debug!(post_id = id, "getting post by id with cache decorator");

        let start = Instant::now();
        let cached = self.post_cache.get_post(id).await;
        self.metrics
            .record_cache_operation_duration("post_get", start.elapsed());

        match cached {
            Ok(post) => {
                debug!(post_id = id, "post found in cache");
                self.metrics.increment_cache_hits();
                return Ok(post);
            }
            Err(AppError::CacheMiss) => {
                self.metrics.increment_cache_misses();
            }
            Err(e) => {
                warn!(error = %e, post_id = id, "failed to get post from cache");
            }
        }

        debug!(post_id = id, "post cache miss, fetching from service");
        let post = self.service.get_post_by_id(id).await?;

        self.cache_post(&post).await;
        self.cache_author(&post).await;
        self.cache_tags(&post).await;

        Ok(post)
    }

    async fn list_posts(&self, filters: PostFilters) -> AppResult<(Vec<PostDetailed>, u64)> {
        debug!("listing posts with cache decorator");

        let (mut posts, total) = self.service.list_posts(filters).await?;

        let author_ids: HashSet<i64> = posts.iter().map(|p| p.post.author_id).collect();

        for author_id in author_ids {
            let start = Instant::now();
            let cached = self.user_cache.get_user(author_id).await;
            self.metrics
                .record_cache_operation_duration("user_get", start.elapsed());

            match cached {
                Ok(user) => {
                    debug!(author_id, "author found in cache");
                    for post in posts.iter_mut().filter(|p| p.post.author_id == author_id) {
                        post.author = Some(user.clone());
                    }
                }
                Err(_) => {
                    // Write through the author the inner service returned.
                    if let Some(author) = posts
                        .iter()
                        .find(|p| p.post.author_id == author_id)
                        .and_then(|p| p.author.as_ref())
                    {
                        let start = Instant::now();
                        if let Err(e) = self.user_cache.set_user(author).await {
                            warn!(error = %e, author_id, "failed to cache author from list");
                        }
                        self.metrics
                            .record_cache_operation_duration("user_set", start.elapsed());
                    }
                }
            }
        }

        Ok((posts, total))
    }

    async fn update_post(&self, user_id: i64, id: i64, post: UpdatePostDTO) -> AppResult<()> {
        debug!(post_id = id, user_id, "updating post with cache decorator");

        self.service.update_post(user_id, id, post).await?;

        self.invalidate_post(id, "update").await;

        Ok(())
    }

    async fn delete_post(&self, user_id: i64, id: i64) -> AppResult<()> {
        debug!(post_id = id, user_id, "deleting post with cache decorator");

        self.service.delete_post(user_id, id).await?;

        self.invalidate_post(id, "delete").await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::Sequence;

    use super::*;
    use crate::infra::cache::{MockPostCache, MockTagCache, MockUserCache};
    use crate::infra::metrics::NoopMetrics;
    use domain::{Post, Tag, User};

    fn test_detail(id: i64, author_id: i64) -> PostDetailed {
        PostDetailed {
            post: Post {
                id,
                author_id,
                title: "Test Post".to_string(),
                content: Some("Test content".to_string()),
                created_at: None,
                updated_at: None,
            },
            author: Some(User {
                id: author_id,
                username: "testuser".to_string(),
                name: None,
                avatar_url: None,
            }),
            media: Some(vec![]),
            tags: Some(vec![Tag {
                id: 1,
                name: "tag1".to_string(),
            }]),
        }
    }

    /// Inner service double that counts invocations.
    struct StubService {
        detail: PostDetailed,
        calls: AtomicUsize,
    }

    impl StubService {
        fn new(detail: PostDetailed) -> Self {
            Self {
                detail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PostUseCases for StubService {
        async fn create_post(&self, _post: CreatePostDTO) -> AppResult<PostDetailed> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detail.clone())
        }

        async fn get_post_by_id(&self, _id: i64) -> AppResult<PostDetailed> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detail.clone())
        }

        async fn list_posts(&self, _filters: PostFilters) -> AppResult<(Vec<PostDetailed>, u64)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((vec![self.detail.clone()], 1))
        }

        async fn update_post(
            &self,
            _user_id: i64,
            _id: i64,
            _post: UpdatePostDTO,
        ) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete_post(&self, _user_id: i64, _id: i64) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn decorator_with(
        service: Arc<StubService>,
        post_cache: MockPostCache,
        user_cache: MockUserCache,
        tag_cache: MockTagCache,
    ) -> PostServiceCacheDecorator {
        PostServiceCacheDecorator::new(
            service,
            Arc::new(user_cache),
            Arc::new(post_cache),
            Arc::new(tag_cache),
            Arc::new(NoopMetrics),
        )
    }

    #[tokio::test]
    async fn consecutive_reads_hit_cache_after_first_miss() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail.clone()));

        let mut post_cache = MockPostCache::new();
        let mut seq = Sequence::new();
        post_cache
            .expect_get_post()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AppError::CacheMiss));
        post_cache
            .expect_set_post()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let cached = detail.clone();
        post_cache
            .expect_get_post()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(cached.clone()));

        let mut user_cache = MockUserCache::new();
        user_cache.expect_set_user().times(1).returning(|_| Ok(()));
        let mut tag_cache = MockTagCache::new();
        tag_cache
            .expect_set_tags_by_post()
            .times(1)
            .returning(|_, _| Ok(()));

        let decorator = decorator_with(service.clone(), post_cache, user_cache, tag_cache);

        let first = decorator.get_post_by_id(1).await.unwrap();
        let second = decorator.get_post_by_id(1).await.unwrap();

        assert_eq!(first, second);
        // Only the miss reached the inner service.
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_transport_errors_fall_back_to_the_inner_service() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail.clone()));

        let mut post_cache = MockPostCache::new();
        post_cache
            .expect_get_post()
            .returning(|_| Err(AppError::Internal));
        post_cache.expect_set_post().returning(|_| Ok(()));
        let mut user_cache = MockUserCache::new();
        user_cache.expect_set_user().returning(|_| Ok(()));
        let mut tag_cache = MockTagCache::new();
        tag_cache
            .expect_set_tags_by_post()
            .returning(|_, _| Ok(()));

        let decorator = decorator_with(service.clone(), post_cache, user_cache, tag_cache);

        let result = decorator.get_post_by_id(1).await.unwrap();
        assert_eq!(result, detail);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_invalidates_author_and_writes_through() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail.clone()));

        let mut post_cache = MockPostCache::new();
        post_cache.expect_set_post().times(1).returning(|_| Ok(()));
        let mut user_cache = MockUserCache::new();
        user_cache
            .expect_delete_user()
            .times(1)
            .returning(|_| Ok(()));
        user_cache.expect_set_user().times(1).returning(|_| Ok(()));
        let mut tag_cache = MockTagCache::new();
        tag_cache.expect_set_tags_by_post().never();

        let decorator = decorator_with(service, post_cache, user_cache, tag_cache);

        let dto = CreatePostDTO {
            author_id: 2,
            title: "Test Post".to_string(),
            content: Some("Test content".to_string()),
            tags: vec![],
            media_items: vec![],
        };
        decorator.create_post(dto).await.unwrap();
    }

    #[tokio::test]
    async fn mutations_invalidate_the_post_entry() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail));

        let mut post_cache = MockPostCache::new();
        post_cache
            .expect_delete_post()
            .times(2)
            .returning(|_| Ok(()));
        let user_cache = MockUserCache::new();
        let mut tag_cache = MockTagCache::new();
        tag_cache
            .expect_delete_tags_by_post()
            .times(2)
            .returning(|_| Ok(()));

        let decorator = decorator_with(service, post_cache, user_cache, tag_cache);

        decorator
            .update_post(2, 1, UpdatePostDTO::default())
            .await
            .unwrap();
        decorator.delete_post(2, 1).await.unwrap();
    }

    #[tokio::test]
    async fn invalidation_failure_does_not_fail_the_operation() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail));

        let mut post_cache = MockPostCache::new();
        post_cache
            .expect_delete_post()
            .returning(|_| Err(AppError::Internal));
        let user_cache = MockUserCache::new();
        let mut tag_cache = MockTagCache::new();
        tag_cache
            .expect_delete_tags_by_post()
            .returning(|_| Err(AppError::Internal));

        let decorator = decorator_with(service, post_cache, user_cache, tag_cache);

        assert!(decorator.delete_post(2, 1).await.is_ok());
    }

    #[tokio::test]
    async fn list_substitutes_cached_authors() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail));

        let cached_author = User {
            id: 2,
            username: "cached".to_string(),
            name: None,
            avatar_url: None,
        };
        let mut user_cache = MockUserCache::new();
        let substituted = cached_author.clone();
        user_cache
            .expect_get_user()
            .times(1)
            .returning(move |_| Ok(substituted.clone()));

        let decorator = decorator_with(
            service,
            MockPostCache::new(),
            user_cache,
            MockTagCache::new(),
        );

        let (posts, total) = decorator.list_posts(PostFilters::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].author.as_ref().unwrap().username, "cached");
    }

    #[tokio::test]
    async fn list_writes_through_authors_on_cache_miss() {
        let detail = test_detail(1, 2);
        let service = Arc::new(StubService::new(detail));

        let mut user_cache = MockUserCache::new();
        user_cache
            .expect_get_user()
            .times(1)
            .returning(|_| Err(AppError::CacheMiss));
        user_cache.expect_set_user().times(1).returning(|_| Ok(()));

        let decorator = decorator_with(
            service,
            MockPostCache::new(),
            user_cache,
            MockTagCache::new(),
        );

        let (posts, _) = decorator.list_posts(PostFilters::default()).await.unwrap();
        assert_eq!(posts[0].author.as_ref().unwrap().username, "testuser");
    }
}
