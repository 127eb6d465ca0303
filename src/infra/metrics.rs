//! Service metrics.
//!
//! A `MetricsProvider` trait consumed by the repositories, caches and the
//! gRPC layer, backed by a prometheus registry exposed over a small HTTP
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Cross-cutting metrics sink.
pub trait MetricsProvider: Send + Sync {
    fn increment_grpc_requests(&self, method: &str, status: &str);
    fn record_grpc_request_duration(&self, method: &str, status: &str, duration: Duration);

    fn increment_database_queries(&self, query_type: &str, success: bool);
    fn record_database_query_duration(&self, query_type: &str, duration: Duration);

    fn increment_cache_hits(&self);
    fn increment_cache_misses(&self);
    fn record_cache_operation_duration(&self, operation: &str, duration: Duration);

    fn increment_post_operations(&self, operation: &str, success: bool);
    fn increment_tag_operations(&self, operation: &str, success: bool);
    fn increment_media_operations(&self, operation: &str, success: bool);

    fn set_service_health(&self, healthy: bool);
}

/// Prometheus-backed metrics.
pub struct PrometheusMetrics {
    registry: Registry,
    grpc_requests_total: IntCounterVec,
    grpc_request_duration: HistogramVec,
    database_queries_total: IntCounterVec,
    database_query_duration: HistogramVec,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    cache_operation_duration: HistogramVec,
    post_operations_total: IntCounterVec,
    tag_operations_total: IntCounterVec,
    media_operations_total: IntCounterVec,
    service_health: IntGauge,
}

fn registry_error(err: prometheus::Error) -> String {
    format!("failed to register metric: {err}")
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();

        let grpc_requests_total = IntCounterVec::new(
            Opts::new(
                "grpc_server_requests_total",
                "Total number of gRPC requests processed",
            ),
            &["method", "status"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(grpc_requests_total.clone()))
            .map_err(registry_error)?;

        let grpc_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "grpc_server_request_duration_seconds",
                "Duration of gRPC requests in seconds",
            ),
            &["method", "status"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(grpc_request_duration.clone()))
            .map_err(registry_error)?;

        let database_queries_total = IntCounterVec::new(
            Opts::new(
                "database_queries_total",
                "Total number of database queries executed",
            ),
            &["query_type", "success"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(database_queries_total.clone()))
            .map_err(registry_error)?;

        let database_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "database_query_duration_seconds",
                "Duration of database queries in seconds",
            ),
            &["query_type"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(database_query_duration.clone()))
            .map_err(registry_error)?;

        let cache_hits_total = IntCounter::new("cache_hits_total", "Total number of cache hits")
            .map_err(registry_error)?;
        registry
            .register(Box::new(cache_hits_total.clone()))
            .map_err(registry_error)?;

        let cache_misses_total =
            IntCounter::new("cache_misses_total", "Total number of cache misses")
                .map_err(registry_error)?;
        registry
            .register(Box::new(cache_misses_total.clone()))
            .map_err(registry_error)?;

        let cache_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "cache_operation_duration_seconds",
                "Duration of cache operations in seconds",
            ),
            &["operation"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(cache_operation_duration.clone()))
            .map_err(registry_error)?;

        let post_operations_total = IntCounterVec::new(
            Opts::new("post_operations_total", "Post operations by outcome"),
            &["operation", "success"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(post_operations_total.clone()))
            .map_err(registry_error)?;

        let tag_operations_total = IntCounterVec::new(
            Opts::new("tag_operations_total", "Tag operations by outcome"),
            &["operation", "success"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(tag_operations_total.clone()))
            .map_err(registry_error)?;

        let media_operations_total = IntCounterVec::new(
            Opts::new("media_operations_total", "Media operations by outcome"),
            &["operation", "success"],
        )
        .map_err(registry_error)?;
        registry
            .register(Box::new(media_operations_total.clone()))
            .map_err(registry_error)?;

        let service_health = IntGauge::new("service_health", "Service health (1 = healthy)")
            .map_err(registry_error)?;
        registry
            .register(Box::new(service_health.clone()))
            .map_err(registry_error)?;

        Ok(Self {
            registry,
            grpc_requests_total,
            grpc_request_duration,
            database_queries_total,
            database_query_duration,
            cache_hits_total,
            cache_misses_total,
            cache_operation_duration,
            post_operations_total,
            tag_operations_total,
            media_operations_total,
            service_health,
        })
    }

    /// Render the registry in the prometheus text exposition format.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

fn success_label(success: bool) -> &'static str {
    if success {
        "true"
    } else {
        "false"
    }
}

impl MetricsProvider for PrometheusMetrics {
    fn increment_grpc_requests(&self, method: &str, status: &str) {
        self.grpc_requests_total
            .with_label_values(&[method, status])
            .inc();
    }

    fn record_grpc_request_duration(&self, method: &str, status: &str, duration: Duration) {
        self.grpc_request_duration
            .with_label_values(&[method, status])
            .observe(duration.as_secs_f64());
    }

    fn increment_database_queries(&self, query_type: &str, success: bool) {
        self.database_queries_total
            .with_label_values(&[query_type, success_label(success)])
            .inc();
    }

    fn record_database_query_duration(&self, query_type: &str, duration: Duration) {
        self.database_query_duration
            .with_label_values(&[query_type])
            .observe(duration.as_secs_f64());
    }

    fn increment_cache_hits(&self) {
        self.cache_hits_total.inc();
    }

    fn increment_cache_misses(&self) {
        self.cache_misses_total.inc();
    }

    fn record_cache_operation_duration(&self, operation: &str, duration: Duration) {
        self.cache_operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    fn increment_post_operations(&self, operation: &str, success: bool) {
        self.post_operations_total
            .with_label_values(&[operation, success_label(success)])
            .inc();
    }

    fn increment_tag_operations(&self, operation: &str, success: bool) {
        self.tag_operations_total
            .with_label_values(&[operation, success_label(success)])
            .inc();
    }

    fn increment_media_operations(&self, operation: &str, success: bool) {
        self.media_operations_total
            .with_label_values(&[operation, success_label(success)])
            .inc();
    }

    fn set_service_health(&self, healthy: bool) {
        self.service_health.set(if healthy { 1 } else { 0 });
    }
}

/// Metrics sink that records nothing. Used by tests.
#[derive(Default)]
pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {
    fn increment_grpc_requests(&self, _method: &str, _status: &str) {}
    fn record_grpc_request_duration(&self, _method: &str, _status: &str, _duration: Duration) {}
    fn increment_database_queries(&self, _query_type: &str, _success: bool) {}
    fn record_database_query_duration(&self, _query_type: &str, _duration: Duration) {}
    fn increment_cache_hits(&self) {}
    fn increment_cache_misses(&self) {}
    fn record_cache_operation_duration(&self, _operation: &str, _duration: Duration) {}
    fn increment_post_operations(&self, _operation: &str, _success: bool) {}
    fn increment_tag_operations(&self, _operation: &str, _success: bool) {}
    fn increment_media_operations(&self, _operation: &str, _success: bool) {}
    fn set_service_health(&self, _healthy: bool) {}
}

/// Router serving the prometheus exposition endpoint.
pub fn metrics_router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                let body = metrics.render();
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    "text/plain; version=0.0.4"
                        .parse()
                        .expect("static header value"),
                );
                (StatusCode::OK, headers, body).into_response()
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_counters() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.increment_cache_hits();
        metrics.increment_database_queries("post_get_by_id", true);
        metrics.set_service_health(true);

        let text = metrics.render();
        assert!(text.contains("cache_hits_total 1"));
        assert!(text.contains("database_queries_total"));
        assert!(text.contains("service_health 1"));
    }

    #[test]
    fn grpc_labels_are_partitioned_by_status() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.increment_grpc_requests("CreatePost", "ok");
        metrics.increment_grpc_requests("CreatePost", "error");

        let text = metrics.render();
        assert!(text.contains(r#"method="CreatePost",status="ok""#));
        assert!(text.contains(r#"method="CreatePost",status="error""#));
    }
}
