use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::sse::broadcaster::{EventBroadcaster, SseEvent};
use crate::AppState;

fn frame(event: &SseEvent) -> String {
    format!("id: {}\nevent: {}\ndata: {}\n\n", event.id, event.event_type, event.data)
}

fn last_event_id(headers: &HeaderMap) -> u64 {
    headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}

/// `GET /api/stream`. Builds the response as a raw byte stream rather than
/// axum's `Sse` wrapper so the exact header set and keep-alive frame text
/// required on the wire are under direct control.
pub async fn stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let active = state.sse_active_streams.load(Ordering::Acquire);
    if active >= state.config.sse_max_streams {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    state.sse_active_streams.fetch_add(1, Ordering::AcqRel);
    state.metrics.sse_active_connections.inc();

    let last_seen_id = last_event_id(&headers);
    let broadcaster = state.broadcaster.clone();
    let replay = broadcaster.history_since(last_seen_id);
    let subscription = broadcaster.subscribe(last_seen_id);
    let keepalive = Duration::from_secs(state.config.sse_keepalive_secs);
    let active_streams = state.sse_active_streams.clone();
    let sse_connections_gauge = state.metrics.sse_active_connections.clone();

    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(8);

    tokio::spawn(async move {
        for event in replay {
            if tx.send(Ok(Bytes::from(frame(&event)))).await.is_err() {
                finish(&broadcaster, &subscription, &active_streams, &sse_connections_gauge);
                return;
            }
        }

        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    if tx.send(Ok(Bytes::from(frame(&event)))).await.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(keepalive) => {
                    if tx.send(Ok(Bytes::from_static(b": keepalive\n\n"))).await.is_err() {
                        break;
                    }
                }
            }
            if subscription.closed.load(Ordering::Acquire) {
                break;
            }
        }

        finish(&broadcaster, &subscription, &active_streams, &sse_connections_gauge);
    });

    let body_stream: std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>> =
        Box::pin(ReceiverStream::new(rx));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream; charset=utf-8"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"))
        .header(header::CONNECTION, HeaderValue::from_static("keep-alive"))
        .header("X-Accel-Buffering", HeaderValue::from_static("no"))
        .body(Body::from_stream(body_stream))
        .expect("static headers always build a valid response")
}

fn finish(
    broadcaster: &Arc<EventBroadcaster>,
    subscription: &Arc<crate::sse::broadcaster::Subscription>,
    active_streams: &Arc<AtomicUsize>,
    sse_connections_gauge: &prometheus::IntGauge,
) {
    broadcaster.deregister(subscription.id);
    active_streams.fetch_sub(1, Ordering::AcqRel);
    sse_connections_gauge.dec();
}
