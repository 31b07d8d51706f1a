//! Background eviction of idle sessions.
//!
//! ## Rules
//! - One cycle per `sweep_interval`; the first cycle runs one interval after spawn
//! - Candidates come from a snapshot, but idleness is re-checked at removal time
//! - Sessions with outstanding leases are never evicted
//! - The task holds the registry weakly and stops when cancelled or when the
//!   registry is dropped

use std::sync::{Arc, Weak};

use dreamjob_core::{ContextFactory, UserIdentity};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::SessionRegistry;

/// Spawns the idle-eviction loop.
pub struct IdleSweeper;

impl IdleSweeper {
    /// Start sweeping `registry` with its configured interval and timeout.
    #[must_use]
    pub fn spawn<F>(registry: &Arc<SessionRegistry<F>>) -> SweeperHandle
    where
        F: ContextFactory,
    {
        Self::spawn_with_token(registry, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), stopping when `token` (or the returned
    /// handle) is cancelled.
    #[must_use]
    pub fn spawn_with_token<F>(
        registry: &Arc<SessionRegistry<F>>,
        token: CancellationToken,
    ) -> SweeperHandle
    where
        F: ContextFactory,
    {
        let period = registry.config().sweep_interval();
        let registry = Arc::downgrade(registry);
        let cancel = token.clone();

        let join = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = Weak::upgrade(&registry) else { break };
                        sweep_once(&registry).await;
                    }
                }
            }
            tracing::debug!("Idle sweeper stopped");
        });

        SweeperHandle { token, join }
    }
}

/// Run one eviction pass. Returns the evicted identities.
pub async fn sweep_once<F>(registry: &SessionRegistry<F>) -> Vec<UserIdentity>
where
    F: ContextFactory,
{
    let threshold = registry.config().idle_timeout();
    let now = Instant::now();

    let candidates: Vec<UserIdentity> = registry
        .snapshot()
        .into_iter()
        .filter(|info| info.active_leases == 0 && info.idle_for(now) > threshold)
        .map(|info| info.identity)
        .collect();

    let mut evicted = Vec::with_capacity(candidates.len());
    for identity in candidates {
        if registry.remove_if_idle(&identity, threshold).await {
            evicted.push(identity);
        }
    }

    if evicted.is_empty() {
        tracing::debug!(remaining = registry.len(), "Idle sweep found nothing to evict");
    } else {
        tracing::info!(
            evicted = evicted.len(),
            remaining = registry.len(),
            "Idle sweep evicted sessions"
        );
    }
    evicted
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Whether the sweeper task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "Idle sweeper task failed");
        }
    }
}
