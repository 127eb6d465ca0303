//! Tag repository backed by SeaORM.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    JoinType, QueryFilter, QuerySelect, RelationTrait, Set,
};

use common::{AppError, AppResult};
use domain::Tag;

use super::entities::{post, post_tag, tag};
use super::TagRepository;
use crate::infra::metrics::MetricsProvider;

fn observe(metrics: &dyn MetricsProvider, query_type: &str, start: Instant, success: bool) {
    metrics.increment_database_queries(query_type, success);
    metrics.record_database_query_duration(query_type, start.elapsed());
}

/// The tag operations act on a post's links; a missing post is reported
/// as `PostNotFound`, a failed existence check as `TagVerifyPostFailed`.
async fn verify_post_exists<C: ConnectionTrait>(conn: &C, post_id: i64) -> AppResult<()> {
    match post::Entity::find_by_id(post_id).one(conn).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(AppError::PostNotFound),
        Err(e) => {
            tracing::error!(error = %e, post_id, "failed to verify post for tagging");
            Err(AppError::TagVerifyPostFailed)
        }
    }
}

async fn find_by_names<C: ConnectionTrait>(conn: &C, names: &[String]) -> AppResult<Vec<Tag>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let models = tag::Entity::find()
        .filter(tag::Column::Name.is_in(names.iter().cloned()))
        .all(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "error finding tags by names");
            AppError::TagQueryFailed
        })?;

    Ok(models.into_iter().map(Into::into).collect())
}

async fn find_by_post<C: ConnectionTrait>(conn: &C, post_id: i64) -> AppResult<Vec<Tag>> {
    let models = tag::Entity::find()
        .join(JoinType::InnerJoin, tag::Relation::PostTags.def())
        .filter(post_tag::Column::PostId.eq(post_id))
        .all(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, post_id, "error finding tags by post");
            AppError::TagQueryFailed
        })?;

    Ok(models.into_iter().map(Into::into).collect())
}

async fn create<C: ConnectionTrait>(conn: &C, name: String) -> AppResult<Tag> {
    let active = tag::ActiveModel {
        name: Set(name.clone()),
        ..Default::default()
    };

    let inserted = tag::Entity::insert(active)
        .on_conflict(OnConflict::column(tag::Column::Name).do_nothing().to_owned())
        .exec_with_returning(conn)
        .await;

    match inserted {
        Ok(model) => Ok(model.into()),
        // Unique violation: another creator won the race; re-read the row.
        Err(DbErr::RecordNotInserted) => {
            let existing = tag::Entity::find()
                .filter(tag::Column::Name.eq(&name))
                .one(conn)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, name = %name, "tag exists but could not be fetched");
                    AppError::TagCreateFailed
                })?;
            existing.map(Into::into).ok_or(AppError::TagCreateFailed)
        }
        Err(e) => {
            tracing::error!(error = %e, name = %name, "error creating tag");
            Err(AppError::TagCreateFailed)
        }
    }
}

async fn delete_unused<C: ConnectionTrait>(conn: &C) -> AppResult<()> {
    let linked = Query::select()
        .column(post_tag::Column::TagId)
        .from(post_tag::Entity)
        .to_owned();

    tag::Entity::delete_many()
        .filter(tag::Column::Id.not_in_subquery(linked))
        .exec(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "error deleting unused tags");
            AppError::TagDeleteFailed
        })?;

    Ok(())
}

/// Resolve names to existing tags; a name with no row is `TagNotFound`.
async fn resolve_tags<C: ConnectionTrait>(conn: &C, names: &[String]) -> AppResult<Vec<Tag>> {
    let tags = find_by_names(conn, names).await?;
    let found: HashSet<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    if names.iter().any(|n| !found.contains(n.as_str())) {
        return Err(AppError::TagNotFound);
    }
    Ok(tags)
}

async fn tag_post<C: ConnectionTrait>(conn: &C, post_id: i64, names: Vec<String>) -> AppResult<()> {
    if names.is_empty() {
        return Ok(());
    }

    verify_post_exists(conn, post_id).await?;

    let tags = resolve_tags(conn, &names).await?;
    let links = tags.iter().map(|t| post_tag::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(t.id),
    });

    let inserted = post_tag::Entity::insert_many(links)
        .on_conflict(
            OnConflict::columns([post_tag::Column::PostId, post_tag::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .exec(conn)
        .await;

    match inserted {
        // Every pair already linked; idempotent success.
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, post_id, "error tagging post");
            Err(AppError::TagPost)
        }
    }
}

async fn untag_post<C: ConnectionTrait>(
    conn: &C,
    post_id: i64,
    names: Vec<String>,
) -> AppResult<()> {
    if names.is_empty() {
        return Ok(());
    }

    verify_post_exists(conn, post_id).await?;

    let tags = find_by_names(conn, &names).await?;
    if tags.is_empty() {
        return Err(AppError::TagNotFound);
    }

    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .filter(post_tag::Column::TagId.is_in(tags.iter().map(|t| t.id)))
        .exec(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, post_id, "error untagging post");
            AppError::DatabaseQuery
        })?;

    Ok(())
}

async fn replace_post_tags<C: ConnectionTrait>(
    conn: &C,
    post_id: i64,
    names: Vec<String>,
) -> AppResult<()> {
    verify_post_exists(conn, post_id).await?;

    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .exec(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, post_id, "error deleting old tag links");
            AppError::DatabaseQuery
        })?;

    if names.is_empty() {
        return Ok(());
    }

    let tags = resolve_tags(conn, &names).await?;
    let links = tags.iter().map(|t| post_tag::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(t.id),
    });

    let inserted = post_tag::Entity::insert_many(links)
        .on_conflict(
            OnConflict::columns([post_tag::Column::PostId, post_tag::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .exec(conn)
        .await;

    match inserted {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, post_id, "error inserting new tag links");
            Err(AppError::DatabaseQuery)
        }
    }
}

/// Pooled tag store.
pub struct TagStore {
    db: DatabaseConnection,
    metrics: Arc<dyn MetricsProvider>,
}

impl TagStore {
    pub fn new(db: DatabaseConnection, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { db, metrics }
    }
}

#[async_trait]
impl TagRepository for TagStore {
    async fn find_by_names(&self, names: Vec<String>) -> AppResult<Vec<Tag>> {
        let start = Instant::now();
        let result = find_by_names(&self.db, &names).await;
        observe(
            self.metrics.as_ref(),
            "tag_find_by_names",
            start,
            result.is_ok(),
        );
        result
    }

    async fn find_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>> {
        let start = Instant::now();
        let result = find_by_post(&self.db, post_id).await;
        observe(
            self.metrics.as_ref(),
            "tag_find_by_post",
            start,
            result.is_ok(),
        );
        result
    }

    async fn create(&self, name: String) -> AppResult<Tag> {
        let start = Instant::now();
        let result = create(&self.db, name).await;
        self.metrics
            .increment_tag_operations("create", result.is_ok());
        self.metrics
            .record_database_query_duration("tag_create", start.elapsed());
        result
    }

    async fn delete_unused(&self) -> AppResult<()> {
        let start = Instant::now();
        let result = delete_unused(&self.db).await;
        observe(
            self.metrics.as_ref(),
            "tag_delete_unused",
            start,
            result.is_ok(),
        );
        result
    }

    async fn tag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = tag_post(&self.db, post_id, names).await;
        self.metrics
            .increment_tag_operations("tag_post", result.is_ok());
        self.metrics
            .record_database_query_duration("tag_post", start.elapsed());
        result
    }

    async fn untag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = untag_post(&self.db, post_id, names).await;
        self.metrics
            .increment_tag_operations("untag_post", result.is_ok());
        self.metrics
            .record_database_query_duration("untag_post", start.elapsed());
        result
    }

    async fn replace_post_tags(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = replace_post_tags(&self.db, post_id, names).await;
        self.metrics
            .increment_tag_operations("replace_post_tags", result.is_ok());
        self.metrics
            .record_database_query_duration("replace_post_tags", start.elapsed());
        result
    }
}

/// Transaction-scoped tag store.
pub struct TxTagStore<'a> {
    txn: &'a DatabaseTransaction,
    metrics: &'a dyn MetricsProvider,
}

impl<'a> TxTagStore<'a> {
    pub(crate) fn new(txn: &'a DatabaseTransaction, metrics: &'a dyn MetricsProvider) -> Self {
        Self { txn, metrics }
    }
}

#[async_trait]
impl TagRepository for TxTagStore<'_> {
    async fn find_by_names(&self, names: Vec<String>) -> AppResult<Vec<Tag>> {
        let start = Instant::now();
        let result = find_by_names(self.txn, &names).await;
        observe(self.metrics, "tag_find_by_names", start, result.is_ok());
        result
    }

    async fn find_by_post(&self, post_id: i64) -> AppResult<Vec<Tag>> {
        let start = Instant::now();
        let result = find_by_post(self.txn, post_id).await;
        observe(self.metrics, "tag_find_by_post", start, result.is_ok());
        result
    }

    async fn create(&self, name: String) -> AppResult<Tag> {
        let start = Instant::now();
        let result = create(self.txn, name).await;
        self.metrics.increment_tag_operations("create", result.is_ok());
        self.metrics
            .record_database_query_duration("tag_create", start.elapsed());
        result
    }

    async fn delete_unused(&self) -> AppResult<()> {
        let start = Instant::now();
        let result = delete_unused(self.txn).await;
        observe(self.metrics, "tag_delete_unused", start, result.is_ok());
        result
    }

    async fn tag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = tag_post(self.txn, post_id, names).await;
        self.metrics
            .increment_tag_operations("tag_post", result.is_ok());
        self.metrics
            .record_database_query_duration("tag_post", start.elapsed());
        result
    }

    async fn untag_post(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = untag_post(self.txn, post_id, names).await;
        self.metrics
            .increment_tag_operations("untag_post", result.is_ok());
        self.metrics
            .record_database_query_duration("untag_post", start.elapsed());
        result
    }

    async fn replace_post_tags(&self, post_id: i64, names: Vec<String>) -> AppResult<()> {
        let start = Instant::now();
        let result = replace_post_tags(self.txn, post_id, names).await;
        self.metrics
            .increment_tag_operations("replace_post_tags", result.is_ok());
        self.metrics
            .record_database_query_duration("replace_post_tags", start.elapsed());
        result
    }
}
