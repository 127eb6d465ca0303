//! Post Service
//!
//! Network-facing microservice owning the lifecycle of posts and their
//! media attachments and tags. User identity is owned by a separate user
//! service reached over gRPC.
//!
//! # Architecture Layers
//!
//! - **config**: Application configuration and constants
//! - **clients**: gRPC clients for collaborating services
//! - **services**: Use-case orchestration and the cache decorator
//! - **repository**: Persistence contracts, SeaORM stores, in-memory doubles
//! - **infra**: Database, unit of work, caches, metrics
//! - **grpc**: Inbound handlers, validation, status mapping

pub mod clients;
pub mod config;
pub mod grpc;
pub mod infra;
pub mod repository;
pub mod services;

// Re-export commonly used types at crate root
pub use config::Config;

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::transport::Server;
use tracing::{error, info};

use proto::post::post_service_server::PostServiceServer;

use crate::clients::{GrpcUserClient, UserClient};
use crate::grpc::PostGrpcService;
use crate::infra::cache::{
    Cache, PostCache, RedisPostCache, RedisTagCache, RedisUserCache, TagCache, UserCache,
};
use crate::infra::metrics::{self, MetricsProvider, PrometheusMetrics};
use crate::infra::unit_of_work::Persistence;
use crate::infra::Database;
use crate::repository::{
    MediaRepository, MediaStore, PostRepository, PostStore, TagRepository, TagStore,
};
use crate::services::{PostService, PostServiceCacheDecorator};

/// Run the gRPC server with the given configuration.
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Database
    let db = Database::connect(&config.database).await?;
    let db_conn = db.get_connection();

    // Metrics registry and exposition endpoint
    let prometheus = Arc::new(PrometheusMetrics::new()?);
    let metrics: Arc<dyn MetricsProvider> = prometheus.clone();

    let metrics_addr: SocketAddr = config.metrics_addr().parse()?;
    let metrics_app = metrics::metrics_router(prometheus.clone());
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(listener) => {
                info!("metrics listening on {}", metrics_addr);
                if let Err(e) = axum::serve(listener, metrics_app).await {
                    error!(error = %e, "metrics server failed");
                }
            }
            Err(e) => error!(error = %e, "failed to bind metrics listener"),
        }
    });

    // Cache
    let cache = Cache::connect(&config.cache).await?;
    let post_cache: Arc<dyn PostCache> = Arc::new(RedisPostCache::new(cache.clone()));
    let user_cache: Arc<dyn UserCache> = Arc::new(RedisUserCache::new(cache.clone()));
    let tag_cache: Arc<dyn TagCache> = Arc::new(RedisTagCache::new(cache));

    // User service client
    let user_client: Arc<dyn UserClient> =
        Arc::new(GrpcUserClient::connect(&config.user_service).await?);

    // Repositories and unit of work
    let posts: Arc<dyn PostRepository> =
        Arc::new(PostStore::new(db_conn.clone(), metrics.clone()));
    let media: Arc<dyn MediaRepository> =
        Arc::new(MediaStore::new(db_conn.clone(), metrics.clone()));
    let tags: Arc<dyn TagRepository> = Arc::new(TagStore::new(db_conn.clone(), metrics.clone()));
    let uow = Arc::new(Persistence::new(db_conn, metrics.clone()));

    // Core service wrapped by the cache decorator
    let core = Arc::new(PostService::new(posts, media, tags, uow, user_client));
    let decorated = Arc::new(PostServiceCacheDecorator::new(
        core,
        user_cache,
        post_cache,
        tag_cache,
        metrics.clone(),
    ));

    let grpc_service = PostGrpcService::new(decorated, metrics.clone());

    let addr: SocketAddr = config.server_addr().parse()?;
    prometheus.set_service_health(true);
    info!("post service listening on {}", addr);

    Server::builder()
        .add_service(PostServiceServer::new(grpc_service))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    prometheus.set_service_health(false);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install shutdown handler");
    }
    info!("shutdown signal received");
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("database reset and migrations applied");
        }
    }

    Ok(())
}
