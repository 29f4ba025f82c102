use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Process-wide Prometheus registry for the gateway. Scrape formatting
/// itself is an external collaborator's concern (see Non-goals); this type
/// only owns metric definitions and their values.
#[derive(Clone)]
pub struct GatewayMetrics {
    pub registry: Registry,
    pub rate_checks_total: IntCounter,
    pub rate_rejections_total: IntCounter,
    pub api_key_requests_total: IntCounter,
    pub jwt_requests_total: IntCounter,
    pub http_errors_total: IntCounterVec,
    pub audit_dropped_total: IntCounter,
    pub sse_active_connections: IntGauge,
    pub sse_events_broadcast_total: IntCounter,
    pub bridge_pending_requests: IntGauge,
    pub bridge_request_latency_seconds: Histogram,
}

impl GatewayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rate_checks_total = IntCounter::new(
            "gateway_rate_checks_total",
            "Rate limiter admission checks performed",
        )?;
        let rate_rejections_total = IntCounter::new(
            "gateway_rate_rejections_total",
            "Requests rejected by the rate limiter",
        )?;
        let api_key_requests_total = IntCounter::new(
            "gateway_api_key_requests_total",
            "Requests authenticated via an API key",
        )?;
        let jwt_requests_total = IntCounter::new(
            "gateway_jwt_requests_total",
            "Requests authenticated via a bearer JWT",
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("gateway_http_errors_total", "HTTP error responses emitted, by error code"),
            &["code"],
        )?;
        let audit_dropped_total = IntCounter::new(
            "gateway_audit_dropped_total",
            "Audit records dropped because the queue was full",
        )?;
        let sse_active_connections = IntGauge::new(
            "gateway_sse_active_connections",
            "Currently open SSE subscriber connections",
        )?;
        let sse_events_broadcast_total = IntCounter::new(
            "gateway_sse_events_broadcast_total",
            "Events appended to the broadcaster history",
        )?;
        let bridge_pending_requests = IntGauge::new(
            "gateway_bridge_pending_requests",
            "Engine bridge requests awaiting a correlated response",
        )?;
        let bridge_request_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "gateway_bridge_request_latency_seconds",
                "Round-trip latency for engine bridge requests",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        registry.register(Box::new(rate_checks_total.clone()))?;
        registry.register(Box::new(rate_rejections_total.clone()))?;
        registry.register(Box::new(api_key_requests_total.clone()))?;
        registry.register(Box::new(jwt_requests_total.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(audit_dropped_total.clone()))?;
        registry.register(Box::new(sse_active_connections.clone()))?;
        registry.register(Box::new(sse_events_broadcast_total.clone()))?;
        registry.register(Box::new(bridge_pending_requests.clone()))?;
        registry.register(Box::new(bridge_request_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            rate_checks_total,
            rate_rejections_total,
            api_key_requests_total,
            jwt_requests_total,
            http_errors_total,
            audit_dropped_total,
            sse_active_connections,
            sse_events_broadcast_total,
            bridge_pending_requests,
            bridge_request_latency_seconds,
        })
    }

    pub fn record_http_error(&self, code: &str) {
        self.http_errors_total.with_label_values(&[code]).inc();
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metrics() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.rate_checks_total.inc();
        metrics.record_http_error("rate_limit_exceeded");
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("gateway_rate_checks_total"));
        assert!(rendered.contains("gateway_http_errors_total"));
    }
}
