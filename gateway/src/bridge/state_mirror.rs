use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    pub qty: f64,
    pub avg_price: f64,
    pub updated_at_ns: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderState {
    pub client_order_id: String,
    pub status: String,
    pub symbol: Option<String>,
    pub side: Option<String>,
    pub qty: Option<f64>,
    pub price: Option<f64>,
    pub updated_at_ns: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountState {
    pub fields: serde_json::Map<String, Value>,
    pub last_update_ns: u64,
}

/// Mirrors engine-reported state so handlers can answer account/position
/// queries without round-tripping to the engine. Updated only by the
/// bridge's reader task; read by many concurrent handler tasks.
#[derive(Default)]
pub struct StateMirror {
    positions: RwLock<HashMap<String, Position>>,
    orders: RwLock<HashMap<String, OrderState>>,
    account: RwLock<AccountState>,
    last_account_write_ns: AtomicU64,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply_event(&self, event_type: &str, payload: &Value, now_ns: u64) {
        match event_type {
            "order-update" => self.apply_order_update(payload, now_ns).await,
            "account" => self.apply_account(payload, now_ns).await,
            _ => {}
        }
    }

    async fn apply_order_update(&self, payload: &Value, now_ns: u64) {
        let Some(client_order_id) = payload.get("client_order_id").and_then(Value::as_str) else {
            return;
        };
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let order = OrderState {
            client_order_id: client_order_id.to_string(),
            status,
            symbol: payload.get("symbol").and_then(Value::as_str).map(str::to_string),
            side: payload.get("side").and_then(Value::as_str).map(str::to_string),
            qty: payload.get("qty").and_then(Value::as_f64),
            price: payload.get("price").and_then(Value::as_f64),
            updated_at_ns: now_ns,
        };
        self.orders.write().await.insert(client_order_id.to_string(), order);
    }

    async fn apply_account(&self, payload: &Value, now_ns: u64) {
        if let Some(positions) = payload.get("positions").and_then(Value::as_array) {
            let mut guard = self.positions.write().await;
            for entry in positions {
                let Some(symbol) = entry.get("symbol").and_then(Value::as_str) else { continue };
                guard.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        qty: entry.get("qty").and_then(Value::as_f64).unwrap_or(0.0),
                        avg_price: entry.get("avg_price").and_then(Value::as_f64).unwrap_or(0.0),
                        updated_at_ns: now_ns,
                    },
                );
            }
        }

        // Last-writer-wins on a monotone clock: an out-of-order reply (rare,
        // e.g. after a reconnect race) must not roll account state backward.
        let prev = self.last_account_write_ns.fetch_max(now_ns, Ordering::AcqRel);
        if now_ns < prev {
            return;
        }
        let mut fields = payload.as_object().cloned().unwrap_or_default();
        fields.remove("type");
        fields.remove("positions");
        let mut account = self.account.write().await;
        *account = AccountState { fields, last_update_ns: now_ns };
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.read().await.get(symbol).cloned()
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }

    pub async fn order(&self, client_order_id: &str) -> Option<OrderState> {
        self.orders.read().await.get(client_order_id).cloned()
    }

    pub async fn orders(&self) -> Vec<OrderState> {
        self.orders.read().await.values().cloned().collect()
    }

    pub async fn account(&self) -> AccountState {
        self.account.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn order_update_upserts_by_client_order_id() {
        let mirror = StateMirror::new();
        mirror
            .apply_event(
                "order-update",
                &json!({"client_order_id":"abc","status":"filled","symbol":"BTCUSDT"}),
                1,
            )
            .await;
        let order = mirror.order("abc").await.unwrap();
        assert_eq!(order.status, "filled");
    }

    #[tokio::test]
    async fn account_event_is_last_writer_wins_by_timestamp() {
        let mirror = StateMirror::new();
        mirror.apply_event("account", &json!({"balance": 100}), 10).await;
        mirror.apply_event("account", &json!({"balance": 50}), 5).await;
        let account = mirror.account().await;
        assert_eq!(account.fields["balance"], 100);
    }

    #[tokio::test]
    async fn account_event_updates_positions_array() {
        let mirror = StateMirror::new();
        mirror
            .apply_event(
                "account",
                &json!({"positions":[{"symbol":"ETHUSDT","qty":2.5,"avg_price":1800.0}]}),
                1,
            )
            .await;
        let position = mirror.position("ETHUSDT").await.unwrap();
        assert_eq!(position.qty, 2.5);
    }
}
