use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use veloz_audit::AuditLogger;
use veloz_auth::{ApiKeyStore, JwtManager, RbacStore};
use veloz_observability::GatewayMetrics;

use crate::bridge::EngineBridge;
use crate::config::GatewayConfig;
use crate::config_store::ConfigStore;
use crate::rate_limiter::RateLimiter;
use crate::sse::broadcaster::EventBroadcaster;

/// Shared, cheaply-cloned handle passed to every axum extractor and
/// middleware layer. Each field is independently `Arc`-backed (or already
/// interior-mutable) so cloning never copies the underlying state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub api_keys: Arc<ApiKeyStore>,
    pub jwt: Arc<JwtManager>,
    pub rbac: Arc<RbacStore>,
    pub config_store: Arc<ConfigStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub bridge: Arc<EngineBridge>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub audit: AuditLogger,
    pub metrics: Arc<GatewayMetrics>,
    pub sse_active_streams: Arc<AtomicUsize>,
}
