//! gRPC implementation for PostService.
//!
//! Decodes wire messages, performs syntactic validation, marshals to and
//! from the core DTOs and maps error kinds to status codes.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};
use tracing::debug;
use validator::{Validate, ValidationError};

use domain::{
    CreatePostDTO, MediaType, PostDetailed, PostFilters, PostMediaInput, UpdatePostDTO,
    MAX_MEDIA_POSITION, MAX_TAG_LENGTH, MIN_MEDIA_POSITION, MIN_TAG_LENGTH,
};
use proto::post::{
    post_service_server::PostService as PostServiceProto, CreatePostRequest, DeletePostRequest,
    GetPostRequest, ListPostsRequest, ListPostsResponse, Media, MediaInput, Post as PbPost,
    UpdatePostRequest,
};

use crate::infra::metrics::MetricsProvider;
use crate::services::PostUseCases;

/// gRPC service wrapper for the post use-cases.
pub struct PostGrpcService {
    service: Arc<dyn PostUseCases>,
    metrics: Arc<dyn MetricsProvider>,
}

impl PostGrpcService {
    /// Create a new gRPC service wrapper.
    pub fn new(service: Arc<dyn PostUseCases>, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { service, metrics }
    }

    fn observe<T>(&self, method: &str, start: Instant, result: &Result<T, Status>) {
        let status = match result {
            Ok(_) => "ok".to_string(),
            Err(s) => format!("{:?}", s.code()),
        };
        self.metrics.increment_grpc_requests(method, &status);
        self.metrics
            .record_grpc_request_duration(method, &status, start.elapsed());
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_tags(tags: &Vec<String>) -> Result<(), ValidationError> {
    for tag in tags {
        let len = tag.chars().count() as u64;
        if len < MIN_TAG_LENGTH || len > MAX_TAG_LENGTH {
            return Err(ValidationError::new("tag_length"));
        }
    }
    Ok(())
}

#[derive(Validate, serde::Serialize)]
struct MediaInputChecked {
    #[validate(url)]
    url: String,
    #[validate(range(min = 1, max = 9))]
    position: i32,
}

#[derive(Validate)]
struct CreatePostRequestChecked {
    #[validate(range(min = 1))]
    author_id: i64,
    #[validate(length(min = 3, max = 255))]
    title: String,
    #[validate(length(min = 10))]
    content: Option<String>,
    #[validate(custom(function = "validate_tags"))]
    tags: Vec<String>,
    #[validate(length(max = 9))]
    #[validate(nested)]
    media: Vec<MediaInputChecked>,
}

#[derive(Validate)]
struct GetPostRequestChecked {
    #[validate(range(min = 1))]
    id: i64,
}

#[derive(Validate)]
struct ListPostsRequestChecked {
    #[validate(range(min = 1))]
    author_id: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    limit: Option<i64>,
    #[validate(range(min = 0))]
    offset: Option<i64>,
}

#[derive(Validate)]
struct UpdatePostRequestChecked {
    #[validate(range(min = 1))]
    user_id: i64,
    #[validate(range(min = 1))]
    id: i64,
    #[validate(length(min = 3, max = 255))]
    title: Option<String>,
    #[validate(length(min = 10))]
    content: Option<String>,
    #[validate(custom(function = "validate_tags"))]
    tags: Vec<String>,
    #[validate(nested)]
    media: Vec<MediaInputChecked>,
}

#[derive(Validate)]
struct DeletePostRequestChecked {
    #[validate(range(min = 1))]
    user_id: i64,
    #[validate(range(min = 1))]
    id: i64,
}

fn invalid_request(err: validator::ValidationErrors) -> Status {
    debug!(error = %err, "request validation failed");
    Status::invalid_argument("invalid request")
}

// =============================================================================
// Marshalling
// =============================================================================

/// Replace an out-of-bounds position with `index + 1`; drop the item when
/// the replacement still exceeds the maximum. Callers accept truncation.
fn normalize_media(media: Vec<MediaInput>) -> Vec<MediaInput> {
    let mut normalized = Vec::with_capacity(media.len());
    for (index, mut item) in media.into_iter().enumerate() {
        if item.position < MIN_MEDIA_POSITION || item.position > MAX_MEDIA_POSITION {
            let adjusted = index as i32 + 1;
            if adjusted > MAX_MEDIA_POSITION {
                debug!(
                    position = adjusted,
                    url = %item.url,
                    "skipping media item due to position constraints"
                );
                continue;
            }
            debug!(position = adjusted, url = %item.url, "media position adjusted");
            item.position = adjusted;
        }
        normalized.push(item);
    }
    normalized
}

fn media_inputs_to_dto(media: Vec<MediaInput>) -> Result<Vec<PostMediaInput>, Status> {
    media
        .into_iter()
        .map(|m| {
            let media_type: MediaType = m
                .r#type
                .parse()
                .map_err(|_| Status::invalid_argument("invalid request"))?;
            Ok(PostMediaInput {
                url: m.url,
                media_type,
                position: m.position,
            })
        })
        .collect()
}

fn media_checked(media: &[MediaInput]) -> Vec<MediaInputChecked> {
    media
        .iter()
        .map(|m| MediaInputChecked {
            url: m.url.clone(),
            position: m.position,
        })
        .collect()
}

fn to_timestamp(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

fn from_timestamp(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32)
}

/// Translate the aggregate to the wire shape. Nullable timestamps are
/// omitted when the stored value is not valid; null content becomes the
/// empty string.
fn detailed_to_proto(detail: &PostDetailed) -> PbPost {
    let media = detail
        .media
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|m| Media {
            id: m.id,
            url: m.url.clone(),
            r#type: m.media_type.to_string(),
            position: m.position,
            created_at: m.created_at.map(to_timestamp),
        })
        .collect();

    let tags = detail
        .tags
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|t| t.name.clone())
        .collect();

    PbPost {
        id: detail.post.id,
        author_id: detail.post.author_id,
        title: detail.post.title.clone(),
        content: detail.post.content.clone().unwrap_or_default(),
        tags,
        media,
        created_at: detail.post.created_at.map(to_timestamp),
        updated_at: detail.post.updated_at.map(to_timestamp),
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

// =============================================================================
// Handlers
// =============================================================================

impl PostGrpcService {
    async fn handle_create_post(&self, req: CreatePostRequest) -> Result<PbPost, Status> {
        debug!(
            author_id = req.author_id,
            title = %req.title,
            media_items_count = req.media.len(),
            tags_count = req.tags.len(),
            "received CreatePost request"
        );

        let media = normalize_media(req.media);

        let checked = CreatePostRequestChecked {
            author_id: req.author_id,
            title: req.title.clone(),
            content: non_empty(req.content.clone()),
            tags: req.tags.clone(),
            media: media_checked(&media),
        };
        checked.validate().map_err(invalid_request)?;

        let dto = CreatePostDTO {
            author_id: req.author_id,
            title: req.title,
            content: non_empty(req.content),
            tags: req.tags,
            media_items: media_inputs_to_dto(media)?,
        };

        let created = self.service.create_post(dto).await.map_err(Status::from)?;

        debug!(
            post_id = created.post.id,
            author_id = created.post.author_id,
            "post created successfully"
        );

        Ok(detailed_to_proto(&created))
    }

    async fn handle_get_post(&self, req: GetPostRequest) -> Result<PbPost, Status> {
        let checked = GetPostRequestChecked { id: req.id };
        checked.validate().map_err(invalid_request)?;

        let post = self
            .service
            .get_post_by_id(req.id)
            .await
            .map_err(Status::from)?;

        Ok(detailed_to_proto(&post))
    }

    async fn handle_list_posts(&self, req: ListPostsRequest) -> Result<ListPostsResponse, Status> {
        let checked = ListPostsRequestChecked {
            author_id: (req.author_id != 0).then_some(req.author_id),
            limit: (req.limit != 0).then_some(req.limit as i64),
            offset: (req.offset != 0).then_some(req.offset as i64),
        };
        checked.validate().map_err(invalid_request)?;

        let filters = PostFilters {
            author_id: checked.author_id,
            tag_names: req.tag_names,
            created_after: req.created_after.as_ref().and_then(from_timestamp),
            created_before: req.created_before.as_ref().and_then(from_timestamp),
            limit: checked.limit.map(|l| l as u64),
            offset: checked.offset.map(|o| o as u64),
        };

        let (posts, total) = self
            .service
            .list_posts(filters)
            .await
            .map_err(Status::from)?;

        Ok(ListPostsResponse {
            posts: posts.iter().map(detailed_to_proto).collect(),
            total: total as i64,
        })
    }

    async fn handle_update_post(&self, req: UpdatePostRequest) -> Result<PbPost, Status> {
        debug!(
            post_id = req.id,
            user_id = req.user_id,
            media_items_count = req.media.len(),
            tags_count = req.tags.len(),
            "received UpdatePost request"
        );

        let media = normalize_media(req.media);

        let checked = UpdatePostRequestChecked {
            user_id: req.user_id,
            id: req.id,
            title: non_empty(req.title.clone()),
            content: non_empty(req.content.clone()),
            tags: req.tags.clone(),
            media: media_checked(&media),
        };
        checked.validate().map_err(invalid_request)?;

        // The wire cannot distinguish an absent media list from an empty
        // one; an empty list means "no media change".
        let media_items = if media.is_empty() {
            None
        } else {
            Some(media_inputs_to_dto(media)?)
        };

        let dto = UpdatePostDTO {
            title: non_empty(req.title),
            content: non_empty(req.content),
            tags: req.tags,
            media_items,
        };

        self.service
            .update_post(req.user_id, req.id, dto)
            .await
            .map_err(Status::from)?;

        // Return the refreshed aggregate.
        let updated = self
            .service
            .get_post_by_id(req.id)
            .await
            .map_err(Status::from)?;

        Ok(detailed_to_proto(&updated))
    }

    async fn handle_delete_post(&self, req: DeletePostRequest) -> Result<(), Status> {
        let checked = DeletePostRequestChecked {
            user_id: req.user_id,
            id: req.id,
        };
        checked.validate().map_err(invalid_request)?;

        self.service
            .delete_post(req.user_id, req.id)
            .await
            .map_err(Status::from)?;

        Ok(())
    }
}

#[tonic::async_trait]
impl PostServiceProto for PostGrpcService {
    async fn create_post(
        &self,
        request: Request<CreatePostRequest>,
    ) -> Result<Response<PbPost>, Status> {
        let start = Instant::now();
        let result = self.handle_create_post(request.into_inner()).await;
        self.observe("CreatePost", start, &result);
        result.map(Response::new)
    }

    async fn get_post(
        &self,
        request: Request<GetPostRequest>,
    ) -> Result<Response<PbPost>, Status> {
        let start = Instant::now();
        let result = self.handle_get_post(request.into_inner()).await;
        self.observe("GetPost", start, &result);
        result.map(Response::new)
    }

    async fn list_posts(
        &self,
        request: Request<ListPostsRequest>,
    ) -> Result<Response<ListPostsResponse>, Status> {
        let start = Instant::now();
        let result = self.handle_list_posts(request.into_inner()).await;
        self.observe("ListPosts", start, &result);
        result.map(Response::new)
    }

    async fn update_post(
        &self,
        request: Request<UpdatePostRequest>,
    ) -> Result<Response<PbPost>, Status> {
        let start = Instant::now();
        let result = self.handle_update_post(request.into_inner()).await;
        self.observe("UpdatePost", start, &result);
        result.map(Response::new)
    }

    async fn delete_post(
        &self,
        request: Request<DeletePostRequest>,
    ) -> Result<Response<()>, Status> {
        let start = Instant::now();
        let result = self.handle_delete_post(request.into_inner()).await;
        self.observe("DeletePost", start, &result);
        result.map(|()| Response::new(()))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::infra::metrics::NoopMetrics;
    use common::{AppError, AppResult};
    use domain::MAX_LIST_LIMIT;

    fn media_input(url: &str, position: i32) -> MediaInput {
        MediaInput {
            url: url.to_string(),
            r#type: "image".to_string(),
            position,
        }
    }

    #[test]
    fn normalize_media_keeps_in_bounds_positions() {
        let media = vec![media_input("http://example.com/a.jpg", 1)];
        let normalized = normalize_media(media);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].position, 1);
    }

    #[test]
    fn normalize_media_remaps_out_of_bounds_to_index_plus_one() {
        let media = vec![media_input("http://example.com/a.jpg", 42)];
        let normalized = normalize_media(media);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].position, 1);
    }

    #[test]
    fn normalize_media_drops_items_past_the_cap() {
        // Ten items, all out of bounds: the tenth remaps to position 10
        // which exceeds the cap, so it is silently dropped.
        let media: Vec<MediaInput> = (0..10)
            .map(|i| media_input(&format!("http://example.com/{i}.jpg"), 0))
            .collect();
        let normalized = normalize_media(media);
        assert_eq!(normalized.len(), 9);
        let positions: Vec<i32> = normalized.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn create_request_validation_enforces_bounds() {
        let valid = CreatePostRequestChecked {
            author_id: 1,
            title: "Test Post".to_string(),
            content: Some("Test content".to_string()),
            tags: vec!["tag1".to_string()],
            media: vec![MediaInputChecked {
                url: "http://example.com/image.jpg".to_string(),
                position: 1,
            }],
        };
        assert!(valid.validate().is_ok());

        let short_title = CreatePostRequestChecked {
            author_id: 1,
            title: "ab".to_string(),
            content: None,
            tags: vec![],
            media: vec![],
        };
        assert!(short_title.validate().is_err());

        let bad_tag = CreatePostRequestChecked {
            author_id: 1,
            title: "Test Post".to_string(),
            content: None,
            tags: vec!["a".to_string()],
            media: vec![],
        };
        assert!(bad_tag.validate().is_err());

        let bad_author = CreatePostRequestChecked {
            author_id: 0,
            title: "Test Post".to_string(),
            content: None,
            tags: vec![],
            media: vec![],
        };
        assert!(bad_author.validate().is_err());

        let bad_url = CreatePostRequestChecked {
            author_id: 1,
            title: "Test Post".to_string(),
            content: None,
            tags: vec![],
            media: vec![MediaInputChecked {
                url: "not a url".to_string(),
                position: 1,
            }],
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn list_request_validation_bounds_limit_and_offset() {
        let valid = ListPostsRequestChecked {
            author_id: None,
            limit: Some(10),
            offset: Some(0),
        };
        assert!(valid.validate().is_ok());

        let over_limit = ListPostsRequestChecked {
            author_id: None,
            limit: Some(MAX_LIST_LIMIT as i64 + 1),
            offset: None,
        };
        assert!(over_limit.validate().is_err());

        let negative_offset = ListPostsRequestChecked {
            author_id: None,
            limit: None,
            offset: Some(-1),
        };
        assert!(negative_offset.validate().is_err());
    }

    #[test]
    fn null_content_is_rendered_as_empty_string() {
        let detail = PostDetailed {
            post: domain::Post {
                id: 1,
                author_id: 2,
                title: "Test Post".to_string(),
                content: None,
                created_at: None,
                updated_at: None,
            },
            author: None,
            media: None,
            tags: None,
        };

        let pb = detailed_to_proto(&detail);
        assert_eq!(pb.content, "");
        assert!(pb.created_at.is_none());
        assert!(pb.updated_at.is_none());
        assert!(pb.media.is_empty());
        assert!(pb.tags.is_empty());
    }

    #[test]
    fn media_type_strings_are_validated() {
        let bad = vec![MediaInput {
            url: "http://example.com/a.gif".to_string(),
            r#type: "gif".to_string(),
            position: 1,
        }];
        assert!(media_inputs_to_dto(bad).is_err());

        let good = vec![media_input("http://example.com/a.jpg", 1)];
        let dto = media_inputs_to_dto(good).unwrap();
        assert_eq!(dto[0].media_type, MediaType::Image);
    }

    /// Inner service double that fails every operation with one error.
    struct FailingService {
        error: AppError,
    }

    #[async_trait]
    impl PostUseCases for FailingService {
        async fn create_post(&self, _post: CreatePostDTO) -> AppResult<PostDetailed> {
            Err(self.error.clone())
        }

        async fn get_post_by_id(&self, _id: i64) -> AppResult<PostDetailed> {
            Err(self.error.clone())
        }

        async fn list_posts(&self, _filters: PostFilters) -> AppResult<(Vec<PostDetailed>, u64)> {
            Err(self.error.clone())
        }

        async fn update_post(
            &self,
            _user_id: i64,
            _id: i64,
            _post: UpdatePostDTO,
        ) -> AppResult<()> {
            Err(self.error.clone())
        }

        async fn delete_post(&self, _user_id: i64, _id: i64) -> AppResult<()> {
            Err(self.error.clone())
        }
    }

    fn grpc_over(error: AppError) -> PostGrpcService {
        PostGrpcService::new(
            Arc::new(FailingService { error }),
            Arc::new(NoopMetrics),
        )
    }

    #[tokio::test]
    async fn update_by_non_author_maps_to_permission_denied() {
        let service = grpc_over(AppError::InvalidInput);
        let status = service
            .update_post(Request::new(UpdatePostRequest {
                user_id: 1,
                id: 1,
                title: String::new(),
                content: String::new(),
                tags: vec![],
                media: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn delete_by_non_author_maps_to_permission_denied() {
        let service = grpc_over(AppError::Forbidden);
        let status = service
            .delete_post(Request::new(DeletePostRequest { user_id: 1, id: 1 }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn missing_post_maps_to_not_found() {
        let service = grpc_over(AppError::PostNotFound);
        let status = service
            .get_post(Request::new(GetPostRequest { id: 1 }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn invalid_id_is_rejected_before_the_core_runs() {
        let service = grpc_over(AppError::Internal);
        let status = service
            .get_post(Request::new(GetPostRequest { id: 0 }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
