//! Infrastructure layer - database, caches, metrics and transactions.

pub mod cache;
pub mod db;
pub mod metrics;
pub mod unit_of_work;

pub use cache::{Cache, PostCache, RedisPostCache, RedisTagCache, RedisUserCache, TagCache, UserCache};
pub use db::Database;
pub use metrics::{MetricsProvider, NoopMetrics, PrometheusMetrics};
pub use unit_of_work::{Persistence, TransactionContext, UnitOfWork};
