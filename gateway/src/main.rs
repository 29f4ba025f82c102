use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::middleware as axum_middleware;
use tokio::net::TcpListener;
use tracing::info;

use veloz_audit::{AuditLogger, LogAuditSink};
use veloz_auth::rbac::{Permission, Role};
use veloz_auth::{ApiKeyStore, JwtManager, RbacStore};
use veloz_gateway::bridge::EngineBridge;
use veloz_gateway::config::GatewayConfig;
use veloz_gateway::config_store::{ConfigStore, ConfigValue};
use veloz_gateway::middleware::{audit as audit_mw, auth as auth_mw, cors as cors_mw, metrics as metrics_mw, rate_limit as rate_limit_mw};
use veloz_gateway::rate_limiter::RateLimiter;
use veloz_gateway::sse::broadcaster::EventBroadcaster;
use veloz_gateway::{router, AppState};
use veloz_observability::GatewayMetrics;

fn seed_rbac(config: &GatewayConfig) -> RbacStore {
    let rbac = RbacStore::new();
    rbac.define_role(Role::new("admin", &Permission::ALL));
    if config.admin_password.is_some() {
        rbac.assign_role("admin", "admin");
    }
    rbac
}

fn seed_config_store(config: &GatewayConfig) -> ConfigStore {
    let mut initial = HashMap::new();
    initial.insert("engine_command".to_string(), ConfigValue::String(config.engine_command.clone()));
    initial.insert("rate_limit_capacity".to_string(), ConfigValue::Number(config.rate_limit_capacity as f64));
    initial.insert("sse_history_size".to_string(), ConfigValue::Number(config.sse_history_size as f64));

    let mut read_only = HashSet::new();
    read_only.insert("engine_command".to_string());

    ConfigStore::new(initial, read_only)
}

/// Mirrors the audit logger's cumulative dropped-record count into the
/// Prometheus counter, which only ever increases — this tracks the last
/// observed value so each tick emits just the delta.
async fn poll_audit_drops(audit_logger: AuditLogger, metrics: Arc<GatewayMetrics>) {
    let mut last_seen = 0u64;
    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
        interval.tick().await;
        let dropped = audit_logger.dropped_count();
        if dropped > last_seen {
            metrics.audit_dropped_total.inc_by(dropped - last_seen);
            last_seen = dropped;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Arc::new(GatewayConfig::from_env()?);

    let api_keys = Arc::new(ApiKeyStore::new());
    let jwt = Arc::new(JwtManager::new(
        config.jwt_secret.as_bytes().to_vec(),
        None,
        config.jwt_access_expiry_secs,
        config.jwt_refresh_expiry_secs,
    ));
    let rbac = Arc::new(seed_rbac(&config));
    let config_store = Arc::new(seed_config_store(&config));

    let broadcaster = Arc::new(EventBroadcaster::new(config.sse_history_size, 64));

    let bridge = Arc::new(EngineBridge::spawn(
        config.engine_command.clone(),
        broadcaster.clone(),
        Duration::from_secs(config.engine_request_timeout_secs),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_capacity,
        config.rate_limit_refill_per_sec,
        Duration::from_secs(config.rate_limit_bucket_ttl_secs),
    ));
    rate_limiter.clone().spawn_sweeper(Duration::from_secs(60));

    let metrics = Arc::new(GatewayMetrics::new().context("failed to construct metrics registry")?);

    let sink = Arc::new(LogAuditSink);
    let (audit_logger, audit_handle) = AuditLogger::spawn(
        sink,
        config.audit_queue_capacity,
        config.audit_batch_size,
        Duration::from_secs(config.audit_flush_interval_secs),
    );
    tokio::spawn(poll_audit_drops(audit_logger.clone(), metrics.clone()));

    let state = AppState {
        config: config.clone(),
        api_keys,
        jwt,
        rbac,
        config_store,
        rate_limiter,
        bridge,
        broadcaster,
        audit: audit_logger.clone(),
        metrics,
        sse_active_streams: Arc::new(AtomicUsize::new(0)),
    };

    // `.layer()` wraps outward: the last call here becomes the outermost
    // (first-running) layer, giving the fixed order auth -> rate-limit ->
    // cors -> metrics -> audit -> handler.
    let app = router(state.clone())
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_mw::audit))
        .layer(axum_middleware::from_fn_with_state(state.clone(), metrics_mw::metrics))
        .layer(axum_middleware::from_fn_with_state(state.clone(), cors_mw::cors))
        .layer(axum_middleware::from_fn_with_state(state.clone(), rate_limit_mw::rate_limit))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_mw::auth));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().context("invalid VELOZ_HOST/VELOZ_PORT")?;
    let listener = TcpListener::bind(addr).await.context("failed to bind listener")?;
    info!(%addr, "veloz gateway listening");

    axum::serve(listener, app).await.context("server error")?;

    audit_logger.shutdown(audit_handle).await;
    Ok(())
}
