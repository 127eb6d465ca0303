//! Media repository backed by SeaORM.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use common::{AppError, AppResult};
use domain::{PostMedia, PostMediaInput};

use super::entities::{post, post_media};
use super::MediaRepository;
use crate::infra::metrics::MetricsProvider;

fn observe(metrics: &dyn MetricsProvider, query_type: &str, start: Instant, success: bool) {
    metrics.increment_database_queries(query_type, success);
    metrics.record_database_query_duration(query_type, start.elapsed());
}

async fn attach<C: ConnectionTrait>(
    conn: &C,
    post_id: i64,
    media: Vec<PostMediaInput>,
) -> AppResult<()> {
    let exists = post::Entity::find_by_id(post_id)
        .one(conn)
        .await
        .map_err(AppError::from)?
        .is_some();
    if !exists {
        tracing::warn!(post_id, "post not found during media attach");
        return Err(AppError::PostNotFound);
    }

    if media.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let models = media.into_iter().map(|m| post_media::ActiveModel {
        post_id: Set(post_id),
        url: Set(m.url),
        media_type: Set(m.media_type.into()),
        position: Set(m.position),
        created_at: Set(now),
        ..Default::default()
    });

    post_media::Entity::insert_many(models)
        .exec(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, post_id, "media attach failed");
            AppError::MediaAttachFailed
        })?;

    Ok(())
}

async fn reorder<C: ConnectionTrait>(
    conn: &C,
    post_id: i64,
    positions: HashMap<i64, i32>,
) -> AppResult<()> {
    for (media_id, position) in positions {
        post_media::Entity::update_many()
            .col_expr(post_media::Column::Position, Expr::value(position))
            .filter(post_media::Column::PostId.eq(post_id))
            .filter(post_media::Column::Id.eq(media_id))
            .exec(conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, post_id, media_id, "media reorder failed");
                AppError::MediaReorderFailed
            })?;
    }
    Ok(())
}

async fn detach<C: ConnectionTrait>(conn: &C, media_ids: Vec<i64>) -> AppResult<()> {
    if media_ids.is_empty() {
        return Ok(());
    }

    post_media::Entity::delete_many()
        .filter(post_media::Column::Id.is_in(media_ids.clone()))
        .exec(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, ?media_ids, "media detach failed");
            AppError::MediaDetachFailed
        })?;

    Ok(())
}

async fn get_by_post<C: ConnectionTrait>(conn: &C, post_id: i64) -> AppResult<Vec<PostMedia>> {
    let models = post_media::Entity::find()
        .filter(post_media::Column::PostId.eq(post_id))
        .order_by_asc(post_media::Column::Position)
        .all(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, post_id, "media query failed");
            AppError::MediaQueryFailed
        })?;

    Ok(models.into_iter().map(Into::into).collect())
}

async fn get_by_posts<C: ConnectionTrait>(
    conn: &C,
    post_ids: Vec<i64>,
) -> AppResult<HashMap<i64, Vec<PostMedia>>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let models = post_media::Entity::find()
        .filter(post_media::Column::PostId.is_in(post_ids.clone()))
        .order_by_asc(post_media::Column::PostId)
        .order_by_asc(post_media::Column::Position)
        .all(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, ?post_ids, "batch media query failed");
            AppError::MediaBatchQueryFailed
        })?;

    let mut result: HashMap<i64, Vec<PostMedia>> = HashMap::new();
    for model in models {
        result
            .entry(model.post_id)
            .or_default()
            .push(model.into());
    }
    Ok(result)
}

/// Pooled media store.
pub struct MediaStore {
    db: DatabaseConnection,
    metrics: Arc<dyn MetricsProvider>,
}

impl MediaStore {
    pub fn new(db: DatabaseConnection, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { db, metrics }
    }
}

#[async_trait]
impl MediaRepository for MediaStore {
    async fn attach(&self, post_id: i64, media: Vec<PostMediaInput>) -> AppResult<()> {
        let start = Instant::now();
        let result = attach(&self.db, post_id, media).await;
        observe(
            self.metrics.as_ref(),
            "media_attach",
            start,
            result.is_ok(),
        );
        result
    }

    async fn reorder(&self, post_id: i64, positions: HashMap<i64, i32>) -> AppResult<()> {
        let start = Instant::now();
        let result = reorder(&self.db, post_id, positions).await;
        observe(
            self.metrics.as_ref(),
            "media_reorder",
            start,
            result.is_ok(),
        );
        result
    }

    async fn detach(&self, media_ids: Vec<i64>) -> AppResult<()> {
        let start = Instant::now();
        let result = detach(&self.db, media_ids).await;
        observe(
            self.metrics.as_ref(),
            "media_detach",
            start,
            result.is_ok(),
        );
        result
    }

    async fn get_by_post(&self, post_id: i64) -> AppResult<Vec<PostMedia>> {
        let start = Instant::now();
        let result = get_by_post(&self.db, post_id).await;
        observe(
            self.metrics.as_ref(),
            "media_get_by_post",
            start,
            result.is_ok(),
        );
        result
    }

    async fn get_by_posts(&self, post_ids: Vec<i64>) -> AppResult<HashMap<i64, Vec<PostMedia>>> {
        let start = Instant::now();
        let result = get_by_posts(&self.db, post_ids).await;
        observe(
            self.metrics.as_ref(),
            "media_get_by_posts",
            start,
            result.is_ok(),
        );
        result
    }
}

/// Transaction-scoped media store.
pub struct TxMediaStore<'a> {
    txn: &'a DatabaseTransaction,
    metrics: &'a dyn MetricsProvider,
}

impl<'a> TxMediaStore<'a> {
    pub(crate) fn new(txn: &'a DatabaseTransaction, metrics: &'a dyn MetricsProvider) -> Self {
        Self { txn, metrics }
    }
}

#[async_trait]
impl MediaRepository for TxMediaStore<'_> {
    async fn attach(&self, post_id: i64, media: Vec<PostMediaInput>) -> AppResult<()> {
        let start = Instant::now();
        let result = attach(self.txn, post_id, media).await;
        observe(self.metrics, "media_attach", start, result.is_ok());
        result
    }

    async fn reorder(&self, post_id: i64, positions: HashMap<i64, i32>) -> AppResult<()> {
        let start = Instant::now();
        let result = reorder(self.txn, post_id, positions).await;
        observe(self.metrics, "media_reorder", start, result.is_ok());
        result
    }

    async fn detach(&self, media_ids: Vec<i64>) -> AppResult<()> {
        let start = Instant::now();
        let result = detach(self.txn, media_ids).await;
        observe(self.metrics, "media_detach", start, result.is_ok());
        result
    }

    async fn get_by_post(&self, post_id: i64) -> AppResult<Vec<PostMedia>> {
        let start = Instant::now();
        let result = get_by_post(self.txn, post_id).await;
        observe(self.metrics, "media_get_by_post", start, result.is_ok());
        result
    }

    async fn get_by_posts(&self, post_ids: Vec<i64>) -> AppResult<HashMap<i64, Vec<PostMedia>>> {
        let start = Instant::now();
        let result = get_by_posts(self.txn, post_ids).await;
        observe(self.metrics, "media_get_by_posts", start, result.is_ok());
        result
    }
}
