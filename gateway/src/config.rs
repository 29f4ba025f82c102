use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub auth_enabled: bool,
    pub jwt_secret: String,
    pub jwt_access_expiry_secs: u64,
    pub jwt_refresh_expiry_secs: u64,
    pub rate_limit_capacity: u64,
    pub rate_limit_refill_per_sec: f64,
    pub rate_limit_bucket_ttl_secs: u64,
    pub cors_origin: String,
    pub admin_password: Option<String>,
    pub engine_command: String,
    pub engine_request_timeout_secs: u64,
    pub sse_history_size: usize,
    pub sse_max_streams: usize,
    pub sse_keepalive_secs: u64,
    pub audit_queue_capacity: usize,
    pub audit_batch_size: usize,
    pub audit_flush_interval_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("VELOZ_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("VELOZ_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        let auth_enabled = env::var("VELOZ_AUTH_ENABLED")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);
        let jwt_secret = env::var("VELOZ_JWT_SECRET").context("VELOZ_JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("VELOZ_JWT_SECRET must be at least 32 bytes");
        }
        let jwt_access_expiry_secs = env::var("VELOZ_JWT_ACCESS_EXPIRY")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        let jwt_refresh_expiry_secs = env::var("VELOZ_JWT_REFRESH_EXPIRY")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(604_800);
        let rate_limit_capacity = env::var("VELOZ_RATE_LIMIT_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        let rate_limit_refill_per_sec = env::var("VELOZ_RATE_LIMIT_REFILL")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0);
        let rate_limit_bucket_ttl_secs = env::var("VELOZ_RATE_LIMIT_BUCKET_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        let cors_origin = env::var("VELOZ_CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());
        let admin_password = env::var("VELOZ_ADMIN_PASSWORD").ok();
        let engine_command =
            env::var("VELOZ_ENGINE_COMMAND").unwrap_or_else(|_| "veloz-engine".to_string());
        let engine_request_timeout_secs = env::var("VELOZ_ENGINE_REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        let sse_history_size = env::var("VELOZ_SSE_HISTORY_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(500);
        let sse_max_streams = env::var("VELOZ_SSE_MAX_STREAMS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10_000);
        let sse_keepalive_secs = env::var("VELOZ_SSE_KEEPALIVE_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        let audit_queue_capacity = env::var("VELOZ_AUDIT_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10_000);
        let audit_batch_size = env::var("VELOZ_AUDIT_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(100);
        let audit_flush_interval_secs = env::var("VELOZ_AUDIT_FLUSH_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);

        Ok(Self {
            host,
            port,
            auth_enabled,
            jwt_secret,
            jwt_access_expiry_secs,
            jwt_refresh_expiry_secs,
            rate_limit_capacity: rate_limit_capacity.max(1),
            rate_limit_refill_per_sec,
            rate_limit_bucket_ttl_secs: rate_limit_bucket_ttl_secs.max(60),
            cors_origin,
            admin_password,
            engine_command,
            engine_request_timeout_secs: engine_request_timeout_secs.max(1),
            sse_history_size: sse_history_size.max(1),
            sse_max_streams: sse_max_streams.max(1),
            sse_keepalive_secs: sse_keepalive_secs.max(1),
            audit_queue_capacity: audit_queue_capacity.max(1),
            audit_batch_size: audit_batch_size.max(1),
            audit_flush_interval_secs: audit_flush_interval_secs.max(1),
        })
    }
}
