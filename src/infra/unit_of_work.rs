//! Unit of Work pattern implementation.
//!
//! A transaction is a scoped resource: once begun, exactly one of
//! commit/rollback occurs on every exit path. The closure receives a
//! `TransactionContext` yielding transactional instances of the three
//! repositories; all operations performed through it share the same
//! database transaction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{AccessMode, DatabaseConnection, IsolationLevel, TransactionTrait};

use common::{AppError, AppResult};

use crate::infra::metrics::MetricsProvider;
use crate::repository::{
    MediaRepository, PostRepository, TagRepository, TxMediaStore, TxPostStore, TxTagStore,
};

/// Repository access within one transaction.
pub struct TransactionContext<'a> {
    posts: &'a dyn PostRepository,
    media: &'a dyn MediaRepository,
    tags: &'a dyn TagRepository,
}

impl<'a> TransactionContext<'a> {
    pub fn new(
        posts: &'a dyn PostRepository,
        media: &'a dyn MediaRepository,
        tags: &'a dyn TagRepository,
    ) -> Self {
        Self { posts, media, tags }
    }

    /// Transactional post repository.
    pub fn posts(&self) -> &'a dyn PostRepository {
        self.posts
    }

    /// Transactional media repository.
    pub fn media(&self) -> &'a dyn MediaRepository {
        self.media
    }

    /// Transactional tag repository.
    pub fn tags(&self) -> &'a dyn TagRepository {
        self.tags
    }
}

/// Unit of Work contract.
///
/// Note: the generic closure method makes this trait non-object-safe;
/// consumers stay generic over it and tests use the in-memory
/// implementation.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Run a closure within a transaction. Commit on success, rollback
    /// on error. Commit failure maps to `DatabaseQuery`.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            )
                -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send;
}

/// SeaORM-backed unit of work.
pub struct Persistence {
    db: DatabaseConnection,
    metrics: Arc<dyn MetricsProvider>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { db, metrics }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            )
                -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to start transaction");
                AppError::DatabaseQuery
            })?;

        let posts = TxPostStore::new(&txn, self.metrics.as_ref());
        let media = TxMediaStore::new(&txn, self.metrics.as_ref());
        let tags = TxTagStore::new(&txn, self.metrics.as_ref());
        let ctx = TransactionContext::new(&posts, &media, &tags);

        match f(ctx).await {
            Ok(value) => {
                txn.commit().await.map_err(|e| {
                    tracing::error!(error = %e, "failed to commit transaction");
                    AppError::DatabaseQuery
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    // A transaction torn down by the driver reports itself
                    // as already closed; that is not an error here.
                    let msg = rollback_err.to_string();
                    if msg.contains("closed") || msg.contains("rollback") {
                        tracing::debug!(error = %rollback_err, "transaction already closed during rollback");
                    } else {
                        tracing::error!(error = %rollback_err, "failed to rollback transaction");
                    }
                }
                Err(err)
            }
        }
    }
}
