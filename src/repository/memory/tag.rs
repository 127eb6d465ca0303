//! In-memory tag repository.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use common::{AppError, AppResult};
use domain::Tag;

use super::super::TagRepository;

struct State {
    tags: BTreeMap<i64, Tag>,
    // (post_id, tag_id) links
    links: BTreeSet<(i64, i64)>,
    next_id: i64,
}

impl State {
    fn find_by_name(&self, name: &str) -> Option<Tag> {
        self.tags.values().find(|t| t.name == name).cloned()
    }
}

/// In-memory tag store with unique names and idempotent create.
pub struct MemoryTagRepository {
    state: Mutex<State>,
}

impl MemoryTagRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tags: BTreeMap::new(),
                links: BTreeSet::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryTagRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagRepository for MemoryTagRepository {
    async fn find_by_names(&self, names: Vec<String>) -> AppResult<Vec<Tag>> {
        let state = self.state.lock().expect("tag store poisoned");
        Ok(names
            .iter()
            .filter_map(|name| state.find_by_name(name))
            .collect())
    }

    async fn find_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>> {
        let state = self.state.lock().expect("tag store poisoned");
        Ok(state
            .links
            .iter()
            .filter(|(p, _)| *p == post_id)
            .filter_map(|(_, tag_id)| state.tags.get(tag_id).cloned())
            .collect())
    }

    async fn create(&self, name: String) -> AppResult<Tag> {
        let mut state = self.state.lock().expect("tag store poisoned");
        if let Some(existing) = state.find_by_name(&name) {
            return Ok(existing);
        }
        let tag = Tag {
            id: state.next_id,
            name,
        };
        state.next_id += 1;
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn delete_unused(&self) -> AppResult<()> {
        let mut state = self.state.lock().expect("tag store poisoned");
        let linked: BTreeSet<i64> = state.links.iter().map(|(_, tag_id)| *tag_id).collect();
        state.tags.retain(|id, _| linked.contains(id));
        Ok(())
    }

    async fn tag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let mut state = self.state.lock().expect("tag store poisoned");
        let mut tag_ids = Vec::with_capacity(names.len());
        for name in &names {
            let tag = state.find_by_name(name).ok_or(AppError::TagNotFound)?;
            tag_ids.push(tag.id);
        }
        for tag_id in tag_ids {
            state.links.insert((post_id, tag_id));
        }
        Ok(())
    }

    async fn untag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let mut state = self.state.lock().expect("tag store poisoned");
        let tag_ids: Vec<i64> = names
            .iter()
            .filter_map(|name| state.find_by_name(name))
            .map(|t| t.id)
            .collect();
        for tag_id in tag_ids {
            state.links.remove(&(post_id, tag_id));
        }
        Ok(())
    }

    async fn replace_post_tags(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let mut state = self.state.lock().expect("tag store poisoned");

        // Resolve before mutating so a bad name leaves the links intact.
        let mut tag_ids = Vec::with_capacity(names.len());
        for name in &names {
            let tag = state.find_by_name(name).ok_or(AppError::TagNotFound)?;
            tag_ids.push(tag.id);
        }

        state.links.retain(|(p, _)| *p != post_id);
        for tag_id in tag_ids {
            state.links.insert((post_id, tag_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent_for_concurrent_names() {
        let repo = MemoryTagRepository::new();
        let first = repo.create("tag1".to_string()).await.unwrap();
        let second = repo.create("tag1".to_string()).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn replace_with_unknown_name_leaves_links_intact() {
        let repo = MemoryTagRepository::new();
        repo.create("tag1".to_string()).await.unwrap();
        repo.tag_post(1, vec!["tag1".to_string()]).await.unwrap();

        let err = repo
            .replace_post_tags(1, vec!["missing".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, AppError::TagNotFound);

        let tags = repo.find_by_post(1).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "tag1");
    }

    #[tokio::test]
    async fn delete_unused_reclaims_unlinked_tags() {
        let repo = MemoryTagRepository::new();
        repo.create("kept".to_string()).await.unwrap();
        repo.create("orphan".to_string()).await.unwrap();
        repo.tag_post(1, vec!["kept".to_string()]).await.unwrap();

        repo.delete_unused().await.unwrap();

        let remaining = repo
            .find_by_names(vec!["kept".to_string(), "orphan".to_string()])
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "kept");
    }
}
