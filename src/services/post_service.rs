//! Post service - the five post use-cases.
//!
//! Mutations run inside a unit-of-work transaction; reads go through the
//! pooled repositories. The author profile for a create is fetched before
//! the transaction opens, so a failed lookup never leaves one open.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use common::{AppError, AppResult};
use domain::{CreatePostDTO, PostDetailed, PostFilters, UpdatePostDTO};

use crate::clients::UserClient;
use crate::infra::unit_of_work::UnitOfWork;
use crate::repository::{MediaRepository, PostRepository, TagRepository};

/// The use-case contract exposed by the core and by the cache decorator.
#[async_trait]
pub trait PostUseCases: Send + Sync {
    async fn create_post(&self, post: CreatePostDTO) -> AppResult<PostDetailed>;
    async fn get_post_by_id(&self, id: i64) -> AppResult<PostDetailed>;
    async fn list_posts(&self, filters: PostFilters) -> AppResult<(Vec<PostDetailed>, u64)>;
    async fn update_post(&self, user_id: i64, id: i64, post: UpdatePostDTO) -> AppResult<()>;
    async fn delete_post(&self, user_id: i64, id: i64) -> AppResult<()>;
}

/// Use-case orchestrator over the repositories, the unit of work and the
/// user service client.
pub struct PostService<U: UnitOfWork> {
    posts: Arc<dyn PostRepository>,
    media: Arc<dyn MediaRepository>,
    tags: Arc<dyn TagRepository>,
    uow: Arc<U>,
    user_client: Arc<dyn UserClient>,
}

impl<U: UnitOfWork> PostService<U> {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        media: Arc<dyn MediaRepository>,
        tags: Arc<dyn TagRepository>,
        uow: Arc<U>,
        user_client: Arc<dyn UserClient>,
    ) -> Self {
        Self {
            posts,
            media,
            tags,
            uow,
            user_client,
        }
    }
}

/// Keep first occurrences, drop duplicates.
fn coalesce_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl<U: UnitOfWork + 'static> PostUseCases for PostService<U> {
    async fn create_post(&self, post: CreatePostDTO) -> AppResult<PostDetailed> {
        let author = match self.user_client.get_user(post.author_id).await {
            Ok(author) => author,
            Err(e) => {
                error!(error = %e, author_id = post.author_id, "failed to get author from user service");
                return Err(AppError::ExternalService);
            }
        };

        let tag_names = coalesce_names(&post.tags);
        let CreatePostDTO {
            author_id,
            title,
            content,
            media_items,
            ..
        } = post;

        let (created_post, created_media, created_tags) = self
            .uow
            .transaction(move |tx| {
                Box::pin(async move {
                    let created_post = tx.posts().create(author_id, title, content).await?;

                    let mut created_media = Vec::new();
                    if !media_items.is_empty() {
                        tx.media()
                            .attach(created_post.id, media_items)
                            .await
                            .map_err(|e| {
                                error!(error = %e, post_id = created_post.id, "failed to attach media to post");
                                AppError::MediaAttachFailed
                            })?;
                        created_media =
                            tx.media().get_by_post(created_post.id).await.map_err(|e| {
                                error!(error = %e, post_id = created_post.id, "failed to get media by post");
                                AppError::MediaQueryFailed
                            })?;
                    }

                    let mut created_tags = Vec::new();
                    if !tag_names.is_empty() {
                        let existing =
                            tx.tags().find_by_names(tag_names.clone()).await.map_err(|e| {
                                error!(error = %e, "failed to find existing tags");
                                AppError::TagQueryFailed
                            })?;
                        let existing_names: HashSet<String> =
                            existing.iter().map(|t| t.name.clone()).collect();
                        created_tags.extend(existing);

                        for name in tag_names.iter().filter(|n| !existing_names.contains(*n)) {
                            let created =
                                tx.tags().create(name.clone()).await.map_err(|e| match e {
                                    AppError::TagCreateFailed => {
                                        error!(name = %name, "failed to create tag");
                                        AppError::TagCreateFailed
                                    }
                                    other => {
                                        error!(error = %other, name = %name, "unknown error while creating tag");
                                        AppError::UnknownTag
                                    }
                                })?;
                            created_tags.push(created);
                        }

                        tx.tags()
                            .tag_post(created_post.id, tag_names.clone())
                            .await
                            .map_err(|e| match e {
                                AppError::PostNotFound
                                | AppError::TagNotFound
                                | AppError::TagVerifyPostFailed
                                | AppError::TagPost => e,
                                other => {
                                    error!(error = %other, post_id = created_post.id, "unknown error while adding tags to post");
                                    AppError::UnknownTag
                                }
                            })?;
                    }

                    Ok((created_post, created_media, created_tags))
                })
            })
            .await?;

        Ok(PostDetailed {
            post: created_post,
            author: Some(author),
            media: Some(created_media),
            tags: Some(created_tags),
        })
    }

    async fn get_post_by_id(&self, id: i64) -> AppResult<PostDetailed> {
        let post = self.posts.get_by_id(id).await.map_err(|e| match e {
            AppError::PostNotFound => {
                debug!(id, "post not found");
                AppError::PostNotFound
            }
            other => {
                error!(error = %other, id, "failed to get post by id");
                AppError::DatabaseQuery
            }
        })?;

        let author = self
            .user_client
            .get_user(post.author_id)
            .await
            .map_err(|e| match e {
                AppError::UserNotFound => {
                    debug!(author_id = post.author_id, "author not found");
                    AppError::UserNotFound
                }
                other => {
                    error!(error = %other, author_id = post.author_id, "failed to get author");
                    AppError::ExternalService
                }
            })?;

        // A "no media" sentinel collapses to an empty list.
        let media = match self.media.get_by_post(id).await {
            Ok(media) => media,
            Err(AppError::MediaNotFound) => Vec::new(),
            Err(e) => {
                error!(error = %e, id, "failed to get media by post");
                return Err(AppError::MediaQueryFailed);
            }
        };

        let tags = match self.tags.find_by_post(id).await {
            Ok(tags) => tags,
            Err(AppError::TagsNotFound) => Vec::new(),
            Err(e) => {
                error!(error = %e, id, "failed to find tags by post");
                return Err(AppError::TagQueryFailed);
            }
        };

        Ok(PostDetailed {
            post,
            author: Some(author),
            media: Some(media),
            tags: Some(tags),
        })
    }

    async fn list_posts(&self, filters: PostFilters) -> AppResult<(Vec<PostDetailed>, u64)> {
        let (posts, total) = self.posts.list(filters).await.map_err(|e| {
            error!(error = %e, "failed to list posts");
            AppError::DatabaseQuery
        })?;

        let mut result = Vec::with_capacity(posts.len());
        for post in posts {
            let media = match self.media.get_by_post(post.id).await {
                Ok(media) if media.is_empty() => None,
                Ok(media) => Some(media),
                Err(AppError::MediaNotFound) => None,
                Err(e) => {
                    error!(error = %e, id = post.id, "failed to get media by post");
                    return Err(AppError::DatabaseQuery);
                }
            };

            let tags = match self.tags.find_by_post(post.id).await {
                Ok(tags) if tags.is_empty() => None,
                Ok(tags) => Some(tags),
                Err(AppError::TagsNotFound) => None,
                Err(e) => {
                    error!(error = %e, id = post.id, "failed to find tags by post");
                    return Err(AppError::DatabaseQuery);
                }
            };

            let author = match self.user_client.get_user(post.author_id).await {
                Ok(author) => author,
                Err(AppError::UserNotFound) => {
                    debug!(author_id = post.author_id, "author not found");
                    return Err(AppError::UserNotFound);
                }
                Err(e) => {
                    error!(error = %e, author_id = post.author_id, "failed to get author");
                    return Err(AppError::DatabaseQuery);
                }
            };

            result.push(PostDetailed {
                post,
                author: Some(author),
                media,
                tags,
            });
        }

        Ok((result, total))
    }

    async fn update_post(&self, user_id: i64, id: i64, post: UpdatePostDTO) -> AppResult<()> {
        self.uow
            .transaction(move |tx| {
                Box::pin(async move {
                    let existing = tx.posts().get_by_id(id).await.map_err(|e| match e {
                        AppError::PostNotFound => {
                            debug!(id, "post not found for update");
                            AppError::PostNotFound
                        }
                        other => {
                            error!(error = %other, id, "failed to get post for update");
                            AppError::DatabaseQuery
                        }
                    })?;

                    if existing.author_id != user_id {
                        debug!(user_id, author_id = existing.author_id, "user is not author of post");
                        return Err(AppError::InvalidInput);
                    }

                    let field_update = UpdatePostDTO {
                        title: post.title.clone(),
                        content: post.content.clone(),
                        ..Default::default()
                    };
                    tx.posts().update(id, field_update).await.map_err(|e| match e {
                        AppError::PostNotFound => AppError::PostNotFound,
                        other => {
                            error!(error = %other, id, "failed to update post");
                            AppError::DatabaseQuery
                        }
                    })?;

                    // A present media list - even an empty one - replaces
                    // the attachment set.
                    if let Some(media_items) = post.media_items {
                        let existing_media = match tx.media().get_by_post(id).await {
                            Ok(media) => media,
                            Err(AppError::MediaNotFound) => Vec::new(),
                            Err(e) => {
                                error!(error = %e, id, "failed to get post media");
                                return Err(AppError::DatabaseQuery);
                            }
                        };

                        let media_ids: Vec<i64> = existing_media.iter().map(|m| m.id).collect();
                        if !media_ids.is_empty() {
                            tx.media().detach(media_ids).await.map_err(|e| {
                                error!(error = %e, id, "failed to clear media for post");
                                AppError::MediaAttachFailed
                            })?;
                        }
                        if !media_items.is_empty() {
                            tx.media().attach(id, media_items).await.map_err(|e| {
                                error!(error = %e, id, "failed to attach media to post");
                                AppError::MediaAttachFailed
                            })?;
                        }
                    }

                    if !post.tags.is_empty() {
                        for name in &post.tags {
                            match tx.tags().create(name.clone()).await {
                                Ok(_) | Err(AppError::TagAlreadyExists) => {}
                                Err(AppError::TagCreateFailed) => {
                                    error!(name = %name, "failed to create tag");
                                    return Err(AppError::TagCreateFailed);
                                }
                                Err(e) => {
                                    error!(error = %e, name = %name, "unknown error creating tag");
                                    return Err(AppError::UnknownTag);
                                }
                            }
                        }

                        tx.tags()
                            .replace_post_tags(id, post.tags.clone())
                            .await
                            .map_err(|e| match e {
                                AppError::PostNotFound => {
                                    debug!(id, "post not found when tagging");
                                    AppError::PostNotFound
                                }
                                AppError::TagNotFound => {
                                    debug!(id, "tag not found when tagging post");
                                    AppError::TagNotFound
                                }
                                AppError::TagVerifyPostFailed | AppError::TagPost => e,
                                other => {
                                    error!(error = %other, id, "unknown error tagging post");
                                    other
                                }
                            })?;
                    }

                    Ok(())
                })
            })
            .await
    }

    async fn delete_post(&self, user_id: i64, id: i64) -> AppResult<()> {
        self.uow
            .transaction(move |tx| {
                Box::pin(async move {
                    let post = tx.posts().get_by_id(id).await.map_err(|e| match e {
                        AppError::PostNotFound => {
                            debug!(id, "post not found when deleting post");
                            AppError::PostNotFound
                        }
                        other => {
                            error!(error = %other, id, "failed to get post");
                            AppError::DatabaseQuery
                        }
                    })?;

                    if post.author_id != user_id {
                        debug!(user_id, author_id = post.author_id, "user is not author of post");
                        return Err(AppError::Forbidden);
                    }

                    let media = match tx.media().get_by_post(id).await {
                        Ok(media) => media,
                        Err(AppError::MediaNotFound) => Vec::new(),
                        Err(e) => {
                            error!(error = %e, id, "failed to get media for post during delete");
                            return Err(AppError::MediaQueryFailed);
                        }
                    };
                    let media_ids: Vec<i64> = media.iter().map(|m| m.id).collect();
                    if !media_ids.is_empty() {
                        match tx.media().detach(media_ids).await {
                            Ok(()) | Err(AppError::MediaNotFound) => {}
                            Err(e) => {
                                error!(error = %e, id, "failed to detach media for post");
                                return Err(AppError::MediaDetachFailed);
                            }
                        }
                    }

                    let tags = match tx.tags().find_by_post(id).await {
                        Ok(tags) => tags,
                        Err(AppError::TagsNotFound) => Vec::new(),
                        Err(e) => {
                            error!(error = %e, id, "failed to get tags for post during delete");
                            return Err(AppError::TagQueryFailed);
                        }
                    };
                    let tag_names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
                    if !tag_names.is_empty() {
                        match tx.tags().untag_post(id, tag_names).await {
                            Ok(()) | Err(AppError::TagNotFound) => {}
                            Err(e) => {
                                error!(error = %e, id, "failed to untag post");
                                return Err(AppError::TagDeleteFailed);
                            }
                        }
                    }

                    tx.posts().delete(id).await.map_err(|e| match e {
                        AppError::PostNotFound => {
                            debug!(id, "post not found for delete");
                            AppError::PostNotFound
                        }
                        other => {
                            error!(error = %other, id, "failed to delete post");
                            AppError::DatabaseQuery
                        }
                    })?;

                    Ok(())
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::clients::user_client::MockUserClient;
    use crate::infra::unit_of_work::TransactionContext;
    use crate::repository::memory::MemoryUnitOfWork;
    use crate::repository::{MockMediaRepository, MockPostRepository, MockTagRepository};
    use domain::{Post, User};

    fn test_user(id: i64) -> User {
        User {
            id,
            username: "testuser".to_string(),
            name: None,
            avatar_url: None,
        }
    }

    fn test_post(id: i64, author_id: i64) -> Post {
        Post {
            id,
            author_id,
            title: "Test Post".to_string(),
            content: Some("Test content".to_string()),
            created_at: Some(chrono::Utc::now()),
            updated_at: Some(chrono::Utc::now()),
        }
    }

    /// Counts transactions so tests can assert none was opened.
    struct CountingUnitOfWork {
        inner: MemoryUnitOfWork,
        transactions: AtomicUsize,
    }

    impl CountingUnitOfWork {
        fn new() -> Self {
            Self {
                inner: MemoryUnitOfWork::new(),
                transactions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for CountingUnitOfWork {
        async fn transaction<F, T>(&self, f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(
                    TransactionContext<'a>,
                )
                    -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
                + Send,
            T: Send,
        {
            self.transactions.fetch_add(1, Ordering::SeqCst);
            self.inner.transaction(f).await
        }
    }

    fn service_over(
        uow: Arc<CountingUnitOfWork>,
        user_client: MockUserClient,
    ) -> PostService<CountingUnitOfWork> {
        PostService::new(
            uow.inner.posts.clone(),
            uow.inner.media.clone(),
            uow.inner.tags.clone(),
            uow,
            Arc::new(user_client),
        )
    }

    #[tokio::test]
    async fn create_post_failed_user_lookup_opens_no_transaction() {
        let uow = Arc::new(CountingUnitOfWork::new());
        let mut user_client = MockUserClient::new();
        user_client
            .expect_get_user()
            .returning(|_| Err(AppError::ExternalService));

        let service = service_over(uow.clone(), user_client);
        let result = service
            .create_post(CreatePostDTO {
                author_id: 1,
                title: "Test Post".to_string(),
                content: Some("Test content".to_string()),
                tags: vec![],
                media_items: vec![],
            })
            .await;

        assert_eq!(result.unwrap_err(), AppError::ExternalService);
        assert_eq!(uow.transactions.load(Ordering::SeqCst), 0);
        assert_eq!(
            uow.inner.posts.get_by_id(1).await.unwrap_err(),
            AppError::PostNotFound
        );
    }

    #[tokio::test]
    async fn create_post_coalesces_duplicate_tag_names() {
        let uow = Arc::new(CountingUnitOfWork::new());
        let mut user_client = MockUserClient::new();
        user_client.expect_get_user().returning(|id| Ok(test_user(id)));

        let service = service_over(uow.clone(), user_client);
        let created = service
            .create_post(CreatePostDTO {
                author_id: 1,
                title: "Test Post".to_string(),
                content: Some("Test content".to_string()),
                tags: vec!["tag1".to_string(), "tag1".to_string(), "tag2".to_string()],
                media_items: vec![],
            })
            .await
            .unwrap();

        let mut names: Vec<String> = created
            .tags
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["tag1".to_string(), "tag2".to_string()]);
    }

    #[tokio::test]
    async fn get_post_media_sentinel_collapses_to_empty_list() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_get_by_id()
            .returning(|id| Ok(test_post(id, 2)));
        let mut media = MockMediaRepository::new();
        media
            .expect_get_by_post()
            .returning(|_| Err(AppError::MediaNotFound));
        let mut tags = MockTagRepository::new();
        tags.expect_find_by_post().returning(|_| Ok(vec![]));
        let mut user_client = MockUserClient::new();
        user_client.expect_get_user().returning(|id| Ok(test_user(id)));

        let service = PostService::new(
            Arc::new(posts),
            Arc::new(media),
            Arc::new(tags),
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(user_client),
        );

        let detail = service.get_post_by_id(1).await.unwrap();
        assert_eq!(detail.post.id, 1);
        assert_eq!(detail.media, Some(vec![]));
        assert_eq!(detail.author.unwrap().id, 2);
    }

    #[tokio::test]
    async fn get_post_author_not_found_passes_through() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_get_by_id()
            .returning(|id| Ok(test_post(id, 2)));
        let mut user_client = MockUserClient::new();
        user_client
            .expect_get_user()
            .returning(|_| Err(AppError::UserNotFound));

        let service = PostService::new(
            Arc::new(posts),
            Arc::new(MockMediaRepository::new()),
            Arc::new(MockTagRepository::new()),
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(user_client),
        );

        assert_eq!(
            service.get_post_by_id(1).await.unwrap_err(),
            AppError::UserNotFound
        );
    }

    #[tokio::test]
    async fn list_posts_promotes_repository_errors_to_database_query() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_list()
            .returning(|_| Err(AppError::TagScanFailed));

        let service = PostService::new(
            Arc::new(posts),
            Arc::new(MockMediaRepository::new()),
            Arc::new(MockTagRepository::new()),
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(MockUserClient::new()),
        );

        assert_eq!(
            service.list_posts(PostFilters::default()).await.unwrap_err(),
            AppError::DatabaseQuery
        );
    }

    #[tokio::test]
    async fn update_post_by_non_author_returns_invalid_input() {
        let uow = Arc::new(CountingUnitOfWork::new());
        let mut user_client = MockUserClient::new();
        user_client.expect_get_user().returning(|id| Ok(test_user(id)));
        let service = service_over(uow.clone(), user_client);

        let created = uow
            .inner
            .posts
            .create(2, "Test Post".to_string(), Some("Test content".to_string()))
            .await
            .unwrap();

        let result = service
            .update_post(
                1,
                created.id,
                UpdatePostDTO {
                    title: Some("New title".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), AppError::InvalidInput);
        let unchanged = uow.inner.posts.get_by_id(created.id).await.unwrap();
        assert_eq!(unchanged.title, "Test Post");
    }

    #[tokio::test]
    async fn delete_post_by_non_author_returns_forbidden() {
        let uow = Arc::new(CountingUnitOfWork::new());
        let service = service_over(uow.clone(), MockUserClient::new());

        let created = uow
            .inner
            .posts
            .create(2, "Test Post".to_string(), None)
            .await
            .unwrap();

        let result = service.delete_post(1, created.id).await;

        assert_eq!(result.unwrap_err(), AppError::Forbidden);
        assert!(uow.inner.posts.get_by_id(created.id).await.is_ok());
    }
}
