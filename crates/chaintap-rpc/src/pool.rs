//! Provider Pool: tracks per-endpoint health and selects which endpoint a
//! caller should use next, per §4.3's checkout policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::RpcError;
use crate::transport::RpcEndpoint;

#[derive(Debug, Clone, Copy)]
pub struct ProviderPoolConfig {
    /// Consecutive failures before a provider is marked unhealthy. Default 3.
    pub failure_threshold: u32,
    /// How long an unhealthy provider sits out before a one-shot trial
    /// checkout is offered again. Default 30s.
    pub cooldown_period: Duration,
}

impl Default for ProviderPoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_period: Duration::from_secs(30),
        }
    }
}

/// Point-in-time health snapshot for one provider, exposed via `status`.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub url: String,
    pub priority: u32,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
}

struct Slot {
    endpoint: Arc<dyn RpcEndpoint>,
    priority: u32,
    healthy: bool,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// Set while a one-shot trial checkout for a cooled-down provider is
    /// outstanding, so a second caller doesn't also trial it concurrently.
    trial_in_flight: bool,
}

/// Holds every configured RPC endpoint for one chain and decides which one
/// a caller should use for its next request.
///
/// Checkout policy: partition into healthy/unhealthy. If any are healthy,
/// build a round-robin list where provider `i` appears
/// `max(1, priority_i - min_healthy_priority + 1)` times, so higher-priority
/// (lower-number) providers are favored without starving the rest. If none
/// are healthy, the provider whose cooldown has elapsed and isn't already
/// mid-trial gets one trial checkout; if none qualify, `NoHealthyProviders`.
pub struct ProviderPool {
    slots: Mutex<Vec<Slot>>,
    cursor: AtomicUsize,
    config: ProviderPoolConfig,
    /// Per-provider adaptive `eth_getLogs` chunk-size floor, keyed by URL.
    /// Lives here (not in chaintap-evm) so it survives across fetcher
    /// restarts for the life of the pool, per the design note resolving the
    /// range-floor/escalation open question.
    range_limits: Mutex<HashMap<String, u64>>,
}

impl ProviderPool {
    pub fn new(
        endpoints: Vec<(Arc<dyn RpcEndpoint>, u32)>,
        config: ProviderPoolConfig,
    ) -> Result<Self, RpcError> {
        if endpoints.is_empty() {
            return Err(RpcError::EmptyPool);
        }
        let slots = endpoints
            .into_iter()
            .map(|(endpoint, priority)| Slot {
                endpoint,
                priority,
                healthy: true,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            })
            .collect();
        Ok(Self {
            slots: Mutex::new(slots),
            cursor: AtomicUsize::new(0),
            config,
            range_limits: Mutex::new(HashMap::new()),
        })
    }

    /// Select the next endpoint to use. Returns the endpoint's index (stable
    /// for the pool's lifetime) alongside the endpoint itself, so the caller
    /// can report the outcome back via `report_success`/`report_failure`.
    pub async fn checkout(&self) -> Result<(usize, Arc<dyn RpcEndpoint>), RpcError> {
        let mut slots = self.slots.lock().await;

        let healthy_idxs: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.healthy)
            .map(|(i, _)| i)
            .collect();

        if !healthy_idxs.is_empty() {
            let min_priority = healthy_idxs
                .iter()
                .map(|&i| slots[i].priority)
                .min()
                .unwrap_or(1);

            let mut weighted = Vec::new();
            for &i in &healthy_idxs {
                let weight = (slots[i].priority.saturating_sub(min_priority) + 1).max(1);
                for _ in 0..weight {
                    weighted.push(i);
                }
            }

            let pos = self.cursor.fetch_add(1, Ordering::Relaxed) % weighted.len();
            let idx = weighted[pos];
            return Ok((idx, slots[idx].endpoint.clone()));
        }

        // Nothing healthy: look for a provider whose cooldown has elapsed
        // for a one-shot trial checkout.
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.trial_in_flight {
                continue;
            }
            let eligible = slot
                .last_failure_at
                .map(|t| t.elapsed() >= self.config.cooldown_period)
                .unwrap_or(false);
            if eligible {
                slot.trial_in_flight = true;
                info!(url = %slot.endpoint.url(), "trial checkout after cooldown");
                return Ok((i, slot.endpoint.clone()));
            }
        }

        Err(RpcError::NoHealthyProviders)
    }

    /// Record a successful call against the endpoint returned by `checkout`.
    /// Resets the failure streak and restores health immediately.
    pub async fn report_success(&self, idx: usize) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(idx) {
            let was_unhealthy = !slot.healthy;
            slot.healthy = true;
            slot.consecutive_failures = 0;
            slot.last_failure_at = None;
            slot.trial_in_flight = false;
            if was_unhealthy {
                info!(url = %slot.endpoint.url(), "provider restored to healthy");
            }
        }
    }

    /// Record a failed call. Past `failure_threshold` consecutive failures
    /// the provider is marked unhealthy until its cooldown elapses.
    pub async fn report_failure(&self, idx: usize) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(idx) {
            slot.consecutive_failures += 1;
            slot.last_failure_at = Some(Instant::now());
            slot.trial_in_flight = false;
            if slot.consecutive_failures >= self.config.failure_threshold && slot.healthy {
                slot.healthy = false;
                warn!(
                    url = %slot.endpoint.url(),
                    failures = slot.consecutive_failures,
                    "provider marked unhealthy"
                );
            }
        }
    }

    pub async fn health_snapshot(&self) -> Vec<ProviderHealth> {
        let slots = self.slots.lock().await;
        slots
            .iter()
            .map(|s| ProviderHealth {
                url: s.endpoint.url().to_string(),
                priority: s.priority,
                healthy: s.healthy,
                consecutive_failures: s.consecutive_failures,
                last_failure_at: s.last_failure_at,
            })
            .collect()
    }

    /// Current adaptive `eth_getLogs` chunk-size floor for a provider, if
    /// one has been recorded, else `None` (caller should use the
    /// configured default).
    pub async fn range_limit(&self, url: &str) -> Option<u64> {
        self.range_limits.lock().await.get(url).copied()
    }

    pub async fn set_range_limit(&self, url: &str, limit: u64) {
        self.range_limits.lock().await.insert(url.to_string(), limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{JsonRpcRequest, JsonRpcResponse};
    use async_trait::async_trait;

    struct FakeEndpoint {
        url: String,
    }

    #[async_trait]
    impl RpcEndpoint for FakeEndpoint {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
            Ok(JsonRpcResponse {
                result: Some(serde_json::Value::Null),
                error: None,
            })
        }
        fn url(&self) -> &str {
            &self.url
        }
    }

    fn fake(url: &str) -> Arc<dyn RpcEndpoint> {
        Arc::new(FakeEndpoint { url: url.to_string() })
    }

    #[tokio::test]
    async fn empty_pool_errors() {
        let result = ProviderPool::new(vec![], ProviderPoolConfig::default());
        assert!(matches!(result, Err(RpcError::EmptyPool)));
    }

    #[tokio::test]
    async fn higher_priority_is_favored_in_checkout_distribution() {
        let pool = ProviderPool::new(
            vec![(fake("primary"), 2), (fake("secondary"), 1)],
            ProviderPoolConfig::default(),
        )
        .unwrap();

        let mut primary_hits = 0;
        let mut secondary_hits = 0;
        for _ in 0..9 {
            let (idx, endpoint) = pool.checkout().await.unwrap();
            pool.report_success(idx).await;
            if endpoint.url() == "primary" {
                primary_hits += 1;
            } else {
                secondary_hits += 1;
            }
        }
        assert!(primary_hits > secondary_hits);
    }

    /// Scenario 4: priority 1 and priority 2 providers, failure threshold 3.
    /// Three consecutive failures against the priority-2 provider fail it
    /// over to priority-1; a single subsequent success against it does not
    /// yet restore it (only resets when it is itself checked out and
    /// succeeds).
    #[tokio::test]
    async fn provider_failover_on_threshold_then_restoration() {
        let pool = ProviderPool::new(
            vec![(fake("p1"), 1), (fake("p2"), 2)],
            ProviderPoolConfig {
                failure_threshold: 3,
                cooldown_period: Duration::from_millis(10),
            },
        )
        .unwrap();

        // Find p2's index.
        let snapshot = pool.health_snapshot().await;
        let p2_idx = snapshot.iter().position(|h| h.url == "p2").unwrap();

        for _ in 0..3 {
            pool.report_failure(p2_idx).await;
        }

        let snapshot = pool.health_snapshot().await;
        let p2 = snapshot.iter().find(|h| h.url == "p2").unwrap();
        assert!(!p2.healthy);

        // All checkouts now land on p1 only.
        for _ in 0..5 {
            let (_, endpoint) = pool.checkout().await.unwrap();
            assert_eq!(endpoint.url(), "p1");
        }

        // After cooldown elapses, p2 becomes eligible for trial checkout
        // once p1 is forced unhealthy too.
        tokio::time::sleep(Duration::from_millis(15)).await;
        let p1_idx = snapshot_idx(&pool, "p1").await;
        for _ in 0..3 {
            pool.report_failure(p1_idx).await;
        }
        let (idx, endpoint) = pool.checkout().await.unwrap();
        assert_eq!(endpoint.url(), "p2");
        pool.report_success(idx).await;

        let snapshot = pool.health_snapshot().await;
        let p2 = snapshot.iter().find(|h| h.url == "p2").unwrap();
        assert!(p2.healthy);
        assert_eq!(p2.consecutive_failures, 0);
    }

    async fn snapshot_idx(pool: &ProviderPool, url: &str) -> usize {
        let snapshot = pool.health_snapshot().await;
        snapshot.iter().position(|h| h.url == url).unwrap()
    }

    #[tokio::test]
    async fn all_unhealthy_with_no_cooldown_elapsed_errors() {
        let pool = ProviderPool::new(
            vec![(fake("only"), 1)],
            ProviderPoolConfig {
                failure_threshold: 1,
                cooldown_period: Duration::from_secs(3600),
            },
        )
        .unwrap();
        pool.report_failure(0).await;
        let result = pool.checkout().await;
        assert!(matches!(result, Err(RpcError::NoHealthyProviders)));
    }

    #[tokio::test]
    async fn range_limit_round_trips() {
        let pool = ProviderPool::new(vec![(fake("p1"), 1)], ProviderPoolConfig::default()).unwrap();
        assert_eq!(pool.range_limit("p1").await, None);
        pool.set_range_limit("p1", 500).await;
        assert_eq!(pool.range_limit("p1").await, Some(500));
    }
}
