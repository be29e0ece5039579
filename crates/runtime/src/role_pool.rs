//! Role Pool (C8) — global + per-role concurrency admission for
//! subagent starts.
//!
//! Generalizes the teacher's per-session `Semaphore(1)` lock into two
//! layers of [`tokio::sync::Semaphore`]: one global cap, one per role.
//! `Acquire` must hold both before a subagent may start.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use tl_domain::config::RolePoolConfig;
use tl_domain::ctx::Cancel;
use tl_domain::error::{Error, Result};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Held for the lifetime of one subagent run. Dropping it releases
/// both the global and role-specific slots — release is idempotent
/// because it is just a drop.
pub struct RolePoolPermit {
    _global: OwnedSemaphorePermit,
    _role: OwnedSemaphorePermit,
}

pub struct RolePool {
    global: Arc<Semaphore>,
    per_role: Mutex<HashMap<String, Arc<Semaphore>>>,
    default_role_cap: usize,
    per_role_cap: HashMap<String, usize>,
}

impl RolePool {
    pub fn new(config: &RolePoolConfig) -> Self {
        let config = config.clamped();
        Self {
            global: Arc::new(Semaphore::new(config.global_max_concurrent)),
            per_role: Mutex::new(HashMap::new()),
            default_role_cap: config.global_max_concurrent,
            per_role_cap: config.per_role_max_concurrent,
        }
    }

    fn role_semaphore(&self, role: &str) -> Arc<Semaphore> {
        let mut map = self.per_role.lock();
        map.entry(role.to_owned())
            .or_insert_with(|| {
                let cap = self.per_role_cap.get(role).copied().unwrap_or(self.default_role_cap);
                Arc::new(Semaphore::new(cap.max(1)))
            })
            .clone()
    }

    /// Block until both the global and role-specific capacity admit
    /// one more holder, or `cancel` is signalled.
    pub async fn acquire(&self, role: &str, cancel: &dyn Cancel) -> Result<RolePoolPermit> {
        let role_sem = self.role_semaphore(role);
        let global = self.global.clone();

        tokio::select! {
            g = global.acquire_owned() => {
                let global_permit = g.map_err(|_| Error::Other("role pool global semaphore closed".into()))?;
                tokio::select! {
                    r = role_sem.acquire_owned() => {
                        let role_permit = r.map_err(|_| Error::Other("role pool role semaphore closed".into()))?;
                        Ok(RolePoolPermit { _global: global_permit, _role: role_permit })
                    }
                    _ = Self::wait_canceled(cancel) => Err(Error::Canceled),
                }
            }
            _ = Self::wait_canceled(cancel) => Err(Error::Canceled),
        }
    }

    async fn wait_canceled(cancel: &dyn Cancel) {
        loop {
            if cancel.is_canceled() {
                return;
            }
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
        }
    }

    pub fn global_available(&self) -> usize {
        self.global.available_permits()
    }
}
