//! Post repository backed by SeaORM.
//!
//! Query code is shared between the pooled store and the transactional
//! store through functions generic over `ConnectionTrait`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set,
};

use common::{AppError, AppResult};
use domain::{Post, PostFilters, UpdatePostDTO};

use super::entities::{post, post_tag, tag};
use super::PostRepository;
use crate::infra::metrics::MetricsProvider;

fn observe(metrics: &dyn MetricsProvider, query_type: &str, start: Instant, success: bool) {
    metrics.increment_database_queries(query_type, success);
    metrics.record_database_query_duration(query_type, start.elapsed());
}

async fn create<C: ConnectionTrait>(
    conn: &C,
    author_id: i64,
    title: String,
    content: Option<String>,
) -> AppResult<Post> {
    let now = Utc::now();
    let active = post::ActiveModel {
        author_id: Set(author_id),
        title: Set(title),
        content: Set(content),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = active.insert(conn).await.map_err(AppError::from)?;
    Ok(model.into())
}

async fn get_by_id<C: ConnectionTrait>(conn: &C, id: i64) -> AppResult<Post> {
    let model = post::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(AppError::from)?;

    model.map(Into::into).ok_or(AppError::PostNotFound)
}

async fn get_by_author<C: ConnectionTrait>(conn: &C, author_id: i64) -> AppResult<Vec<Post>> {
    let models = post::Entity::find()
        .filter(post::Column::AuthorId.eq(author_id))
        .order_by_desc(post::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(AppError::from)?;

    Ok(models.into_iter().map(Into::into).collect())
}

async fn update<C: ConnectionTrait>(conn: &C, id: i64, update: UpdatePostDTO) -> AppResult<Post> {
    let model = post::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::PostNotFound)?;

    let mut active: post::ActiveModel = model.into();

    // Empty strings mean "no change for that field".
    if let Some(title) = update.title.filter(|t| !t.is_empty()) {
        active.title = Set(title);
    }
    if let Some(content) = update.content.filter(|c| !c.is_empty()) {
        active.content = Set(Some(content));
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(conn).await.map_err(AppError::from)?;
    Ok(model.into())
}

async fn delete<C: ConnectionTrait>(conn: &C, id: i64) -> AppResult<()> {
    let result = post::Entity::delete_by_id(id)
        .exec(conn)
        .await
        .map_err(AppError::from)?;

    if result.rows_affected == 0 {
        return Err(AppError::PostNotFound);
    }

    Ok(())
}

async fn list<C: ConnectionTrait>(conn: &C, filters: PostFilters) -> AppResult<(Vec<Post>, u64)> {
    let mut query = post::Entity::find();

    if let Some(author_id) = filters.author_id {
        query = query.filter(post::Column::AuthorId.eq(author_id));
    }
    if let Some(created_after) = filters.created_after {
        query = query.filter(post::Column::CreatedAt.gt(created_after));
    }
    if let Some(created_before) = filters.created_before {
        query = query.filter(post::Column::CreatedAt.lt(created_before));
    }

    if !filters.tag_names.is_empty() {
        // Case-insensitive exact match against stored tag names.
        let mut tag_condition = Condition::any();
        for name in &filters.tag_names {
            tag_condition =
                tag_condition.add(Expr::col((tag::Entity, tag::Column::Name)).ilike(name.clone()));
        }

        query = query
            .join(JoinType::InnerJoin, post::Relation::PostTags.def())
            .join(JoinType::InnerJoin, post_tag::Relation::Tag.def())
            .filter(tag_condition)
            .distinct();
    }

    // Count under the same predicate, without pagination.
    let total = query.clone().count(conn).await.map_err(AppError::from)?;

    let models = query
        .order_by_desc(post::Column::CreatedAt)
        .offset(filters.offset)
        .limit(filters.limit)
        .all(conn)
        .await
        .map_err(AppError::from)?;

    Ok((models.into_iter().map(Into::into).collect(), total))
}

/// Pooled post store.
pub struct PostStore {
    db: DatabaseConnection,
    metrics: Arc<dyn MetricsProvider>,
}

impl PostStore {
    pub fn new(db: DatabaseConnection, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { db, metrics }
    }
}

#[async_trait]
impl PostRepository for PostStore {
    async fn create(
        &self,
        author_id: i64,
        title: String,
        content: Option<String>,
    ) -> AppResult<Post> {
        let start = Instant::now();
        let result = create(&self.db, author_id, title, content).await;
        observe(
            self.metrics.as_ref(),
            "post_create",
            start,
            result.is_ok(),
        );
        result
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Post> {
        let start = Instant::now();
        let result = get_by_id(&self.db, id).await;
        observe(
            self.metrics.as_ref(),
            "post_get_by_id",
            start,
            result.is_ok(),
        );
        result
    }

    async fn get_by_author(&self, author_id: i64) -> AppResult<Vec<Post>> {
        let start = Instant::now();
        let result = get_by_author(&self.db, author_id).await;
        observe(
            self.metrics.as_ref(),
            "post_get_by_author",
            start,
            result.is_ok(),
        );
        result
    }

    async fn update(&self, id: i64, dto: UpdatePostDTO) -> AppResult<Post> {
        let start = Instant::now();
        let result = update(&self.db, id, dto).await;
        observe(
            self.metrics.as_ref(),
            "post_update",
            start,
            result.is_ok(),
        );
        result
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let start = Instant::now();
        let result = delete(&self.db, id).await;
        observe(
            self.metrics.as_ref(),
            "post_delete",
            start,
            result.is_ok(),
        );
        result
    }

    async fn list(&self, filters: PostFilters) -> AppResult<(Vec<Post>, u64)> {
        let start = Instant::now();
        let result = list(&self.db, filters).await;
        observe(self.metrics.as_ref(), "post_list", start, result.is_ok());
        result
    }
}

/// Transaction-scoped post store. Shares the visibility of the
/// transaction it was obtained from.
pub struct TxPostStore<'a> {
    txn: &'a DatabaseTransaction,
    metrics: &'a dyn MetricsProvider,
}

impl<'a> TxPostStore<'a> {
    pub(crate) fn new(txn: &'a DatabaseTransaction, metrics: &'a dyn MetricsProvider) -> Self {
        Self { txn, metrics }
    }
}

#[async_trait]
impl PostRepository for TxPostStore<'_> {
    async fn create(
        &self,
        author_id: i64,
        title: String,
        content: Option<String>,
    ) -> AppResult<Post> {
        let start = Instant::now();
        let result = create(self.txn, author_id, title, content).await;
        observe(self.metrics, "post_create", start, result.is_ok());
        result
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Post> {
        let start = Instant::now();
        let result = get_by_id(self.txn, id).await;
        observe(self.metrics, "post_get_by_id", start, result.is_ok());
        result
    }

    async fn get_by_author(&self, author_id: i64) -> AppResult<Vec<Post>> {
        let start = Instant::now();
        let result = get_by_author(self.txn, author_id).await;
        observe(self.metrics, "post_get_by_author", start, result.is_ok());
        result
    }

    async fn update(&self, id: i64, dto: UpdatePostDTO) -> AppResult<Post> {
        let start = Instant::now();
        let result = update(self.txn, id, dto).await;
        observe(self.metrics, "post_update", start, result.is_ok());
        result
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let start = Instant::now();
        let result = delete(self.txn, id).await;
        observe(self.metrics, "post_delete", start, result.is_ok());
        result
    }

    async fn list(&self, filters: PostFilters) -> AppResult<(Vec<Post>, u64)> {
        let start = Instant::now();
        let result = list(self.txn, filters).await;
        observe(self.metrics, "post_list", start, result.is_ok());
        result
    }
}
