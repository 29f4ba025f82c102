pub mod audit;
pub mod auth;
pub mod cors;
pub mod metrics;
pub mod rate_limit;

fn client_ip(request: &axum::extract::Request) -> String {
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
