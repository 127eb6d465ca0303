//! In-memory repository doubles.
//!
//! Same contracts and invariants as the Postgres stores: auto-increment
//! ids, position-sorted media, unique tag names, idempotent tag create.
//! Used for isolated use-case tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use common::AppResult;

use crate::infra::unit_of_work::{TransactionContext, UnitOfWork};

mod media;
mod post;
mod tag;

pub use media::MemoryMediaRepository;
pub use post::MemoryPostRepository;
pub use tag::MemoryTagRepository;

/// Unit of work over the in-memory repositories.
///
/// The transactional instances share state with the outer ones and there
/// is no rollback; tests that need rollback semantics assert against the
/// repository contracts instead.
pub struct MemoryUnitOfWork {
    pub posts: Arc<MemoryPostRepository>,
    pub media: Arc<MemoryMediaRepository>,
    pub tags: Arc<MemoryTagRepository>,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self {
            posts: Arc::new(MemoryPostRepository::new()),
            media: Arc::new(MemoryMediaRepository::new()),
            tags: Arc::new(MemoryTagRepository::new()),
        }
    }
}

impl Default for MemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            )
                -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        let ctx = TransactionContext::new(
            self.posts.as_ref(),
            self.media.as_ref(),
            self.tags.as_ref(),
        );
        f(ctx).await
    }
}
