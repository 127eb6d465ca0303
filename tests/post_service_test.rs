//! Post use-case tests over the in-memory repositories.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common::{AppError, AppResult};
use domain::{CreatePostDTO, MediaType, PostFilters, PostMediaInput, UpdatePostDTO, User};
use post_service::clients::UserClient;
use post_service::repository::memory::MemoryUnitOfWork;
use post_service::repository::{MediaRepository, PostRepository, TagRepository};
use post_service::services::{PostService, PostUseCases};

/// User service double. `lookups` counts calls so tests can assert
/// whether the remote was consulted.
struct StubUserClient {
    response: AppResult<User>,
    lookups: AtomicUsize,
}

impl StubUserClient {
    fn returning(response: AppResult<User>) -> Self {
        Self {
            response,
            lookups: AtomicUsize::new(0),
        }
    }

    fn with_user(id: i64) -> Self {
        Self::returning(Ok(User {
            id,
            username: "testuser".to_string(),
            name: None,
            avatar_url: None,
        }))
    }
}

#[async_trait]
impl UserClient for StubUserClient {
    async fn get_user(&self, _id: i64) -> AppResult<User> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }

    async fn get_user_by_username(&self, _username: &str) -> AppResult<User> {
        self.response.clone()
    }

    async fn get_user_by_email(&self, _email: &str) -> AppResult<User> {
        self.response.clone()
    }
}

fn service_with(
    uow: &Arc<MemoryUnitOfWork>,
    client: Arc<StubUserClient>,
) -> PostService<MemoryUnitOfWork> {
    PostService::new(
        uow.posts.clone(),
        uow.media.clone(),
        uow.tags.clone(),
        uow.clone(),
        client,
    )
}

fn create_dto() -> CreatePostDTO {
    CreatePostDTO {
        author_id: 1,
        title: "Test Post".to_string(),
        content: Some("Test content".to_string()),
        tags: vec!["tag1".to_string(), "tag2".to_string()],
        media_items: vec![PostMediaInput {
            url: "http://example.com/image.jpg".to_string(),
            media_type: MediaType::Image,
            position: 1,
        }],
    }
}

#[tokio::test]
async fn create_post_with_new_tags_and_media() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();

    assert_eq!(created.post.id, 1);
    assert_eq!(created.post.author_id, 1);
    assert_eq!(created.post.title, "Test Post");
    assert_eq!(created.author.as_ref().unwrap().username, "testuser");

    let mut tag_names: Vec<String> = created
        .tags
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    tag_names.sort();
    assert_eq!(tag_names, vec!["tag1".to_string(), "tag2".to_string()]);

    let media = created.media.unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].position, 1);
    assert_eq!(media[0].url, "http://example.com/image.jpg");
}

#[tokio::test]
async fn created_post_round_trips_through_get() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();
    let fetched = service.get_post_by_id(created.post.id).await.unwrap();

    assert_eq!(fetched.post.id, created.post.id);
    assert_eq!(fetched.post.author_id, 1);
    assert_eq!(
        fetched.author.as_ref().map(|a| a.id),
        Some(fetched.post.author_id)
    );

    // Same tag set and media multiset as the input.
    let mut tag_names: Vec<String> = fetched
        .tags
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    tag_names.sort();
    assert_eq!(tag_names, vec!["tag1".to_string(), "tag2".to_string()]);

    let media = fetched.media.unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(
        (media[0].url.as_str(), media[0].media_type, media[0].position),
        ("http://example.com/image.jpg", MediaType::Image, 1)
    );
}

#[tokio::test]
async fn create_post_fails_before_any_write_when_user_lookup_fails() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let client = Arc::new(StubUserClient::returning(Err(AppError::ExternalService)));
    let service = service_with(&uow, client.clone());

    let err = service.create_post(create_dto()).await.unwrap_err();

    assert_eq!(err, AppError::ExternalService);
    assert_eq!(client.lookups.load(Ordering::SeqCst), 1);
    // No row was created.
    let (posts, total) = uow.posts.list(PostFilters::default()).await.unwrap();
    assert!(posts.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn get_post_surfaces_missing_author() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    uow.posts
        .create(1, "Test Post".to_string(), Some("Test content".to_string()))
        .await
        .unwrap();

    let client = Arc::new(StubUserClient::returning(Err(AppError::UserNotFound)));
    let service = service_with(&uow, client);

    assert_eq!(
        service.get_post_by_id(1).await.unwrap_err(),
        AppError::UserNotFound
    );
}

#[tokio::test]
async fn update_post_applies_partial_changes() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();
    service
        .update_post(
            1,
            created.post.id,
            UpdatePostDTO {
                title: Some("Updated title".to_string()),
                // Empty string means "no change for that field".
                content: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let updated = uow.posts.get_by_id(created.post.id).await.unwrap();
    assert_eq!(updated.title, "Updated title");
    assert_eq!(updated.content.as_deref(), Some("Test content"));
    assert!(updated.updated_at >= updated.created_at);
}

#[tokio::test]
async fn update_replaces_tags_and_media() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();
    service
        .update_post(
            1,
            created.post.id,
            UpdatePostDTO {
                tags: vec!["tag3".to_string()],
                media_items: Some(vec![PostMediaInput {
                    url: "http://example.com/video.mp4".to_string(),
                    media_type: MediaType::Video,
                    position: 2,
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fetched = service.get_post_by_id(created.post.id).await.unwrap();
    let tag_names: Vec<String> = fetched
        .tags
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tag_names, vec!["tag3".to_string()]);

    let media = fetched.media.unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].media_type, MediaType::Video);
    assert_eq!(media[0].position, 2);
}

#[tokio::test]
async fn update_by_non_author_leaves_post_unchanged() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(2)));

    uow.posts
        .create(2, "Test Post".to_string(), None)
        .await
        .unwrap();

    let err = service
        .update_post(
            1,
            1,
            UpdatePostDTO {
                title: Some("Hijacked".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err, AppError::InvalidInput);
    assert_eq!(uow.posts.get_by_id(1).await.unwrap().title, "Test Post");
}

#[tokio::test]
async fn delete_by_non_author_leaves_post_unchanged() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(2)));

    uow.posts
        .create(2, "Test Post".to_string(), None)
        .await
        .unwrap();

    assert_eq!(
        service.delete_post(1, 1).await.unwrap_err(),
        AppError::Forbidden
    );
    assert!(uow.posts.get_by_id(1).await.is_ok());
}

#[tokio::test]
async fn delete_is_success_then_not_found() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();

    service.delete_post(1, created.post.id).await.unwrap();
    assert_eq!(
        service.delete_post(1, created.post.id).await.unwrap_err(),
        AppError::PostNotFound
    );
}

#[tokio::test]
async fn delete_removes_media_and_tag_links() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let created = service.create_post(create_dto()).await.unwrap();
    service.delete_post(1, created.post.id).await.unwrap();

    assert!(uow.tags.find_by_post(created.post.id).await.unwrap().is_empty());
    assert_eq!(
        uow.media.get_by_post(created.post.id).await.unwrap_err(),
        AppError::MediaNotFound
    );
}

#[tokio::test]
async fn list_returns_totals_and_null_media_and_tags() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    uow.posts
        .create(1, "First Post".to_string(), None)
        .await
        .unwrap();
    uow.posts
        .create(1, "Second Post".to_string(), None)
        .await
        .unwrap();

    let (posts, total) = service
        .list_posts(PostFilters {
            limit: Some(10),
            offset: Some(0),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(posts.len(), 2);
    for post in &posts {
        assert!(post.media.is_none());
        assert!(post.tags.is_none());
        assert_eq!(post.author.as_ref().map(|a| a.id), Some(post.post.author_id));
    }
}

#[tokio::test]
async fn list_media_positions_are_non_decreasing() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    let mut dto = create_dto();
    dto.media_items = vec![
        PostMediaInput {
            url: "http://example.com/c.jpg".to_string(),
            media_type: MediaType::Image,
            position: 3,
        },
        PostMediaInput {
            url: "http://example.com/a.jpg".to_string(),
            media_type: MediaType::Image,
            position: 1,
        },
    ];
    service.create_post(dto).await.unwrap();

    let (posts, _) = service.list_posts(PostFilters::default()).await.unwrap();
    for post in &posts {
        if let Some(media) = &post.media {
            let positions: Vec<i32> = media.iter().map(|m| m.position).collect();
            let mut sorted = positions.clone();
            sorted.sort();
            assert_eq!(positions, sorted);
        }
    }
}

#[tokio::test]
async fn list_respects_pagination_window() {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let service = service_with(&uow, Arc::new(StubUserClient::with_user(1)));

    for i in 0..5 {
        uow.posts
            .create(1, format!("Post number {i}"), None)
            .await
            .unwrap();
    }

    let (posts, total) = service
        .list_posts(PostFilters {
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(total, 5);
    assert_eq!(posts.len(), 2);
}
