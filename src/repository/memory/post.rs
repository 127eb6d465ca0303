//! In-memory post repository.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use common::{AppError, AppResult};
use domain::{Post, PostFilters, UpdatePostDTO};

use super::super::PostRepository;

struct State {
    posts: BTreeMap<i64, Post>,
    next_id: i64,
}

/// In-memory post store with auto-incrementing ids.
pub struct MemoryPostRepository {
    state: Mutex<State>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                posts: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn create(
        &self,
        author_id: i64,
        title: String,
        content: Option<String>,
    ) -> AppResult<Post> {
        let mut state = self.state.lock().expect("post store poisoned");
        let now = Utc::now();
        let post = Post {
            id: state.next_id,
            author_id,
            title,
            content,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.next_id += 1;
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Post> {
        let state = self.state.lock().expect("post store poisoned");
        state.posts.get(&id).cloned().ok_or(AppError::PostNotFound)
    }

    async fn get_by_author(&self, author_id: i64) -> AppResult<Vec<Post>> {
        let state = self.state.lock().expect("post store poisoned");
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn update(&self, id: i64, update: UpdatePostDTO) -> AppResult<Post> {
        let mut state = self.state.lock().expect("post store poisoned");
        let post = state.posts.get_mut(&id).ok_or(AppError::PostNotFound)?;

        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            post.title = title;
        }
        if let Some(content) = update.content.filter(|c| !c.is_empty()) {
            post.content = Some(content);
        }
        post.updated_at = Some(Utc::now());

        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.lock().expect("post store poisoned");
        state
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::PostNotFound)
    }

    async fn list(&self, filters: PostFilters) -> AppResult<(Vec<Post>, u64)> {
        let state = self.state.lock().expect("post store poisoned");

        // Tag filters need the junction table; the double lists by
        // author and date only.
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| filters.author_id.map_or(true, |a| p.author_id == a))
            .filter(|p| {
                filters
                    .created_after
                    .map_or(true, |after| p.created_at.map_or(false, |c| c > after))
            })
            .filter(|p| {
                filters
                    .created_before
                    .map_or(true, |before| p.created_at.map_or(false, |c| c < before))
            })
            .cloned()
            .collect();

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = posts.len() as u64;

        let offset = filters.offset.unwrap_or(0) as usize;
        let posts: Vec<Post> = posts
            .into_iter()
            .skip(offset)
            .take(filters.limit.unwrap_or(u64::MAX) as usize)
            .collect();

        Ok((posts, total))
    }
}
