use mb_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One-cycle-at-a-time guard owned by an orchestrator.
///
/// Acquisition never waits: a second caller gets `AlreadyRunning` and is
/// expected to skip its tick.
#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    lock: Arc<Mutex<()>>,
}

/// Held for the whole cycle. Dropping it frees the guard.
#[derive(Debug)]
pub struct CyclePermit {
    run_id: Uuid,
    _held: OwnedMutexGuard<()>,
}

impl CyclePermit {
    /// Id the run started with this permit will be recorded under.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<CyclePermit> {
        self.lock
            .clone()
            .try_lock_owned()
            .map(|held| CyclePermit {
                run_id: Uuid::new_v4(),
                _held: held,
            })
            .map_err(|_| Error::AlreadyRunning)
    }

    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
