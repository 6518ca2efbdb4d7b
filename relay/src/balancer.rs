use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::config::{Backend, Config};

/// Mutable health state for one backend.
#[derive(Debug)]
struct Health {
    healthy: bool,
    fail_count: u32,
    since: Instant,
}

/// One backend plus its health flag.
///
/// Handed out by [`Balancer::failover_order`]; the caller reports the outcome
/// of its attempt back through [`mark_healthy`](Self::mark_healthy) and
/// [`mark_unhealthy`](Self::mark_unhealthy).
#[derive(Debug)]
pub struct BackendSlot {
    backend: Backend,
    health: RwLock<Health>,
}

impl BackendSlot {
    fn new(backend: Backend) -> Self {
        Self {
            backend,
            health: RwLock::new(Health {
                healthy: true,
                fail_count: 0,
                since: Instant::now(),
            }),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn is_healthy(&self) -> bool {
        self.health.read().expect("health lock poisoned").healthy
    }

    /// Number of consecutive failures since the last success.
    pub fn fail_count(&self) -> u32 {
        self.health.read().expect("health lock poisoned").fail_count
    }

    pub fn mark_unhealthy(&self) {
        let mut h = self.health.write().expect("health lock poisoned");
        h.healthy = false;
        h.fail_count += 1;
        h.since = Instant::now();
    }

    pub fn mark_healthy(&self) {
        let mut h = self.health.write().expect("health lock poisoned");
        h.healthy = true;
        h.fail_count = 0;
        h.since = Instant::now();
    }

    fn revive_if_due(&self, after: Duration) -> bool {
        let mut h = self.health.write().expect("health lock poisoned");
        if !h.healthy && h.since.elapsed() > after {
            h.healthy = true;
            h.since = Instant::now();
            return true;
        }
        false
    }
}

/// Round-robin pool over the backends of one model.
struct ModelPool {
    slots: Vec<Arc<BackendSlot>>,
    cursor: AtomicUsize,
}

impl ModelPool {
    fn new(backends: &[Backend]) -> Self {
        Self {
            slots: backends
                .iter()
                .cloned()
                .map(|b| Arc::new(BackendSlot::new(b)))
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// All slots rotated from the round-robin cursor, healthy ones first.
    ///
    /// Advances the cursor so consecutive requests start from different
    /// backends. Unhealthy slots stay in the list as a last resort; when
    /// every backend is down the request still gets a candidate to probe.
    fn failover_order(&self) -> Vec<Arc<BackendSlot>> {
        let n = self.slots.len();
        if n == 0 {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        let rotated: Vec<_> = (0..n).map(|i| self.slots[(start + i) % n].clone()).collect();
        let (healthy, unhealthy): (Vec<_>, Vec<_>) =
            rotated.into_iter().partition(|s| s.is_healthy());
        healthy.into_iter().chain(unhealthy).collect()
    }
}

/// Per-model backend pools with round-robin selection and health tracking.
pub struct Balancer {
    pools: HashMap<String, ModelPool>,
}

pub const RECOVERY_INTERVAL: Duration = Duration::from_secs(10);
pub const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

impl Balancer {
    /// Build pools for every model in the configuration.
    pub fn new(config: &Config) -> Self {
        let pools = config
            .models
            .iter()
            .map(|(name, m)| (name.clone(), ModelPool::new(&m.backends)))
            .collect();
        Self { pools }
    }

    /// Whether `model` has a configured pool.
    pub fn has_model(&self, model: &str) -> bool {
        self.pools.contains_key(model)
    }

    /// Backends for `model` in the order a request should try them.
    pub fn failover_order(&self, model: &str) -> Vec<Arc<BackendSlot>> {
        self.pools
            .get(model)
            .map(|p| p.failover_order())
            .unwrap_or_default()
    }

    /// Periodically flip backends back to healthy once they have been down
    /// longer than `after`, so traffic probes them again.
    pub fn spawn_recovery(
        self: Arc<Self>,
        interval: Duration,
        after: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a freshly marked
            // backend is not revived before `after` has a chance to elapse.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for (model, pool) in &self.pools {
                    for slot in &pool.slots {
                        if slot.revive_if_due(after) {
                            tracing::info!(%model, endpoint = %slot.backend().endpoint, "backend revived");
                        }
                    }
                }
            }
        })
    }
}
