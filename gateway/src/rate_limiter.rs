use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as u64
}

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// Seconds since the epoch at which the bucket is expected to hold a
    /// full token again (best-effort, used for `X-RateLimit-Reset`).
    pub reset_at: u64,
    /// Populated when `allowed` is false: seconds to wait before retrying.
    pub retry_after_secs: u64,
}

/// One identity's token bucket. `tokens_milli` stores tokens scaled by 1000
/// so fractional refill amounts (sub-token-per-tick rates) still fit an
/// integer atomic. Each hot-path check is a CAS retry loop; no lock is held
/// across it.
struct Bucket {
    tokens_milli: AtomicI64,
    last_refill_ns: AtomicU64,
    created_at_ns: u64,
}

impl Bucket {
    fn new(capacity_milli: i64, now: u64) -> Self {
        Self {
            tokens_milli: AtomicI64::new(capacity_milli),
            last_refill_ns: AtomicU64::new(now),
            created_at_ns: now,
        }
    }

    /// One CAS attempt. Returns `None` if another thread raced us and this
    /// attempt should be retried with fresh reads.
    fn try_consume(&self, capacity_milli: i64, refill_rate_per_sec: f64) -> Option<RateDecision> {
        let last = self.last_refill_ns.load(Ordering::Acquire);
        let now = now_ns();
        let elapsed_secs = now.saturating_sub(last) as f64 / 1_000_000_000.0;
        let refill_milli = (elapsed_secs * refill_rate_per_sec * 1000.0) as i64;

        let current = self.tokens_milli.load(Ordering::Acquire);
        let refilled = (current + refill_milli).min(capacity_milli);

        if refilled < 1000 {
            if self
                .tokens_milli
                .compare_exchange(current, refilled, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.last_refill_ns.store(now, Ordering::Release);
                let deficit_milli = 1000 - refilled;
                let retry_after_secs = if refill_rate_per_sec > 0.0 {
                    ((deficit_milli as f64 / 1000.0) / refill_rate_per_sec).ceil() as u64
                } else {
                    u64::MAX / 2 // refill_rate == 0: never refills again
                };
                return Some(RateDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: now / 1_000_000_000 + retry_after_secs,
                    retry_after_secs,
                });
            }
            return None;
        }

        let new_val = refilled - 1000;
        if self
            .tokens_milli
            .compare_exchange(current, new_val, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.last_refill_ns.store(now, Ordering::Release);
            Some(RateDecision {
                allowed: true,
                remaining: (new_val / 1000) as u64,
                reset_at: now / 1_000_000_000,
                retry_after_secs: 0,
            })
        } else {
            None
        }
    }
}

/// Per-identity token-bucket rate limiter. Buckets are created lazily on
/// first check and evicted by a periodic sweep once older than `bucket_ttl`
/// — the sweep is the only writer that ever removes an entry; every
/// hot-path operation only inserts-or-gets and mutates atomics.
pub struct RateLimiter {
    capacity_milli: i64,
    refill_rate_per_sec: f64,
    bucket_ttl: Duration,
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
}

impl RateLimiter {
    pub fn new(capacity: u64, refill_rate_per_sec: f64, bucket_ttl: Duration) -> Self {
        Self {
            capacity_milli: capacity as i64 * 1000,
            refill_rate_per_sec,
            bucket_ttl,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_insert(&self, key: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.read().await.get(key) {
            return bucket.clone();
        }
        let mut guard = self.buckets.write().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Bucket::new(self.capacity_milli, now_ns())))
            .clone()
    }

    pub async fn check(&self, identity: &str) -> RateDecision {
        let bucket = self.get_or_insert(identity).await;
        loop {
            if let Some(decision) = bucket.try_consume(self.capacity_milli, self.refill_rate_per_sec) {
                return decision;
            }
        }
    }

    /// Removes buckets whose creation time is older than `bucket_ttl`. The
    /// only code path that ever deletes a map entry.
    pub async fn sweep(&self) {
        let now = now_ns();
        let ttl_ns = self.bucket_ttl.as_nanos() as u64;
        self.buckets
            .write()
            .await
            .retain(|_, bucket| now.saturating_sub(bucket.created_at_ns) < ttl_ns);
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(5, 0.0, Duration::from_secs(3600));
        for _ in 0..5 {
            assert!(limiter.check("user-1").await.allowed);
        }
        let decision = limiter.check("user-1").await;
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs > 0);
    }

    #[tokio::test]
    async fn separate_identities_have_separate_buckets() {
        let limiter = RateLimiter::new(1, 0.0, Duration::from_secs(3600));
        assert!(limiter.check("a").await.allowed);
        assert!(limiter.check("b").await.allowed);
        assert!(!limiter.check("a").await.allowed);
    }

    #[tokio::test]
    async fn sweep_evicts_only_expired_buckets() {
        let limiter = RateLimiter::new(1, 0.0, Duration::from_millis(50));
        limiter.check("stale").await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        limiter.check("fresh").await;
        limiter.sweep().await;
        assert_eq!(limiter.buckets.read().await.len(), 1);
        assert!(limiter.buckets.read().await.contains_key("fresh"));
    }
}
