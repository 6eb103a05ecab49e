use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive per-team locks, created on first touch.
///
/// Progress and timer mutation for one team is strictly sequential;
/// distinct teams proceed without contention.
#[derive(Clone, Default)]
pub struct TeamLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TeamLocks {
    pub fn new() -> Self {
        TeamLocks::default()
    }

    pub async fn acquire(&self, team: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(team.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
