//! Repository contracts and their implementations.
//!
//! Each contract has a SeaORM/Postgres implementation (pooled and
//! transactional variants sharing the same query code) and an in-memory
//! implementation with the same invariants, used for isolated use-case
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;

use common::AppResult;
use domain::{Post, PostFilters, PostMedia, PostMediaInput, Tag, UpdatePostDTO};

pub mod entities;
pub mod media_repository;
pub mod memory;
pub mod post_repository;
pub mod tag_repository;

pub use media_repository::{MediaStore, TxMediaStore};
pub use post_repository::{PostStore, TxPostStore};
pub use tag_repository::{TagStore, TxTagStore};

#[cfg(test)]
use mockall::automock;

/// Post persistence contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post; the store assigns id and timestamps.
    async fn create(
        &self,
        author_id: i64,
        title: String,
        content: Option<String>,
    ) -> AppResult<Post>;

    /// Load a post by id. `PostNotFound` on miss.
    async fn get_by_id(&self, id: i64) -> AppResult<Post>;

    /// All posts by one author, creation-descending.
    async fn get_by_author(&self, author_id: i64) -> AppResult<Vec<Post>>;

    /// Apply a partial update. Absent and empty fields are ignored;
    /// `PostNotFound` when the row is missing.
    async fn update(&self, id: i64, update: UpdatePostDTO) -> AppResult<Post>;

    /// Delete a post row. `PostNotFound` when nothing was deleted.
    async fn delete(&self, id: i64) -> AppResult<()>;

    /// Distinct, creation-descending page of posts plus the total count
    /// computed under the same non-pagination predicate.
    async fn list(&self, filters: PostFilters) -> AppResult<(Vec<Post>, u64)>;
}

/// Media persistence contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Attach media to a post in one batch. Rejects with `PostNotFound`
    /// if the post is absent.
    async fn attach(&self, post_id: i64, media: Vec<PostMediaInput>) -> AppResult<()>;

    /// Move existing attachments to new positions.
    async fn reorder(&self, post_id: i64, positions: HashMap<i64, i32>) -> AppResult<()>;

    /// Remove attachments by id.
    async fn detach(&self, media_ids: Vec<i64>) -> AppResult<()>;

    /// Attachments of one post, position-ordered.
    async fn get_by_post(&self, post_id: i64) -> AppResult<Vec<PostMedia>>;

    /// Attachments of many posts, grouped by post id.
    async fn get_by_posts(&self, post_ids: Vec<i64>) -> AppResult<HashMap<i64, Vec<PostMedia>>>;
}

/// Tag persistence contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Tags whose names match exactly (case-sensitive).
    async fn find_by_names(&self, names: Vec<String>) -> AppResult<Vec<Tag>>;

    /// Tags linked to one post.
    async fn find_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>>;

    /// Create a tag. A unique-violation is converted to a successful
    /// re-read, so two concurrent creators both succeed with the same id.
    async fn create(&self, name: String) -> AppResult<Tag>;

    /// Reclaim tags with no remaining links.
    async fn delete_unused(&self) -> AppResult<()>;

    /// Link a post to the named tags. `PostNotFound` when the post is
    /// absent, `TagNotFound` when a name does not resolve.
    async fn tag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()>;

    /// Remove links between a post and the named tags.
    async fn untag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()>;

    /// Replace the post's tag links with the provided set.
    async fn replace_post_tags(&self, post_id: i64, names: Vec<String>) -> AppResult<()>;
}
