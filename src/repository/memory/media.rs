//! In-memory media repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use common::{AppError, AppResult};
use domain::{PostMedia, PostMediaInput};

use super::super::MediaRepository;

struct State {
    media: Vec<PostMedia>,
    next_id: i64,
}

/// In-memory media store. `get_by_post` reports an empty set with the
/// `MediaNotFound` sentinel, which callers treat as an empty list.
pub struct MemoryMediaRepository {
    state: Mutex<State>,
}

impl MemoryMediaRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                media: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryMediaRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaRepository for MemoryMediaRepository {
    async fn attach(&self, post_id: i64, media: Vec<PostMediaInput>) -> AppResult<()> {
        let mut state = self.state.lock().expect("media store poisoned");

        // (post_id, position) is unique.
        for item in &media {
            let taken = state
                .media
                .iter()
                .any(|m| m.post_id == post_id && m.position == item.position);
            if taken || media.iter().filter(|o| o.position == item.position).count() > 1 {
                return Err(AppError::MediaAttachFailed);
            }
        }

        let now = Utc::now();
        for item in media {
            let attached = PostMedia {
                id: state.next_id,
                post_id,
                url: item.url,
                media_type: item.media_type,
                position: item.position,
                created_at: Some(now),
            };
            state.next_id += 1;
            state.media.push(attached);
        }
        Ok(())
    }

    async fn reorder(&self, post_id: i64, positions: HashMap<i64, i32>) -> AppResult<()> {
        let mut state = self.state.lock().expect("media store poisoned");
        for m in state.media.iter_mut() {
            if m.post_id == post_id {
                if let Some(position) = positions.get(&m.id) {
                    m.position = *position;
                }
            }
        }
        Ok(())
    }

    async fn detach(&self, media_ids: Vec<i64>) -> AppResult<()> {
        let mut state = self.state.lock().expect("media store poisoned");
        state.media.retain(|m| !media_ids.contains(&m.id));
        Ok(())
    }

    async fn get_by_post(&self, post_id: i64) -> AppResult<Vec<PostMedia>> {
        let state = self.state.lock().expect("media store poisoned");
        let mut media: Vec<PostMedia> = state
            .media
            .iter()
            .filter(|m| m.post_id == post_id)
            .cloned()
            .collect();

        if media.is_empty() {
            return Err(AppError::MediaNotFound);
        }

        media.sort_by_key(|m| m.position);
        Ok(media)
    }

    async fn get_by_posts(&self, post_ids: Vec<i64>) -> AppResult<HashMap<i64, Vec<PostMedia>>> {
        let state = self.state.lock().expect("media store poisoned");
        let mut result: HashMap<i64, Vec<PostMedia>> = HashMap::new();
        for m in state.media.iter() {
            if post_ids.contains(&m.post_id) {
                result.entry(m.post_id).or_default().push(m.clone());
            }
        }
        for media in result.values_mut() {
            media.sort_by_key(|m| m.position);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::MediaType;

    fn input(url: &str, position: i32) -> PostMediaInput {
        PostMediaInput {
            url: url.to_string(),
            media_type: MediaType::Image,
            position,
        }
    }

    #[tokio::test]
    async fn attach_rejects_duplicate_positions() {
        let repo = MemoryMediaRepository::new();
        repo.attach(1, vec![input("http://example.com/a.jpg", 1)])
            .await
            .unwrap();

        let err = repo
            .attach(1, vec![input("http://example.com/b.jpg", 1)])
            .await
            .unwrap_err();
        assert_eq!(err, AppError::MediaAttachFailed);
    }

    #[tokio::test]
    async fn get_by_post_sorts_by_position_and_signals_empty() {
        let repo = MemoryMediaRepository::new();
        repo.attach(
            1,
            vec![
                input("http://example.com/b.jpg", 2),
                input("http://example.com/a.jpg", 1),
            ],
        )
        .await
        .unwrap();

        let media = repo.get_by_post(1).await.unwrap();
        let positions: Vec<i32> = media.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![1, 2]);

        assert_eq!(repo.get_by_post(99).await.unwrap_err(), AppError::MediaNotFound);
    }
}
