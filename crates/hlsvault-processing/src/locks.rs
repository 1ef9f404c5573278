//! Per-name mutual exclusion
//!
//! Each video name maps to its own async mutex. The map entry lives only
//! while someone holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

#[derive(Clone, Default)]
pub struct NameLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until `name` is free and hold it until the guard is dropped.
    pub async fn acquire(&self, name: &str) -> NameGuard {
        let mutex = self.map().entry(name.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        NameGuard {
            locks: self.clone(),
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of names currently held or waited on.
    pub fn active(&self) -> usize {
        self.map().len()
    }
}

/// Exclusive hold on one name.
pub struct NameGuard {
    locks: NameLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NameGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        // Release before checking: waiters each own a clone of the Arc.
        drop(self.guard.take());
        if map
            .get(&self.name)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            map.remove(&self.name);
        }
    }
}
