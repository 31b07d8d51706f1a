//! Per-identity creation gates.
//!
//! Each identity with a pending create/remove maps to a `Mutex<()>`.
//! Unrelated identities never contend; the outer map lock is only held long
//! enough to look up or insert a gate.

use std::{collections::HashMap, sync::Arc};

use dreamjob_core::UserIdentity;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub(crate) struct IdentityGates {
    gates: Mutex<HashMap<UserIdentity, Arc<AsyncMutex<()>>>>,
}

impl IdentityGates {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    ///
    /// The gate is released (and forgotten once unused) when the guard drops.
    pub(crate) async fn acquire(&self, identity: &UserIdentity) -> GateGuard<'_> {
        let gate = {
            let mut gates = self.gates.lock();
            Arc::clone(
                gates
                    .entry(identity.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        // Built before waiting so a cancelled acquire still prunes the gate.
        let mut pending = GateGuard {
            gates: self,
            identity: identity.clone(),
            guard: None,
        };
        pending.guard = Some(gate.lock_owned().await);
        pending
    }

    /// Number of identities with a live gate.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.gates.lock().len()
    }
}

#[derive(Debug)]
pub(crate) struct GateGuard<'a> {
    gates: &'a IdentityGates,
    identity: UserIdentity,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Gates are only cloned under the map lock, so a count of one means
        // nobody is holding or waiting on this gate.
        let mut gates = self.gates.gates.lock();
        if gates
            .get(&self.identity)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.identity);
        }
    }
}
