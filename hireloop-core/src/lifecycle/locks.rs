//! Arena of per-request async mutexes.
//!
//! Entries are created on first use and removed when the last holder or
//! waiter lets go, so the map only ever holds requests with in-flight
//! operations.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type Slots = DashMap<Uuid, Arc<Mutex<()>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timed out after {waited:?} waiting for request {request_id}")]
pub struct LockTimeout {
    pub request_id: Uuid,
    pub waited: Duration,
}

#[derive(Clone, Default)]
pub struct LockArena {
    slots: Arc<Slots>,
}

/// Exclusive access to one request until dropped.
pub struct AggregateGuard {
    request_id: Uuid,
    slots: Arc<Slots>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        request_id: Uuid,
        timeout: Duration,
    ) -> Result<AggregateGuard, LockTimeout> {
        // The shard guard must be released before awaiting.
        let slot = self
            .slots
            .entry(request_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let acquired = tokio::time::timeout(timeout, slot.lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(AggregateGuard {
                request_id,
                slots: Arc::clone(&self.slots),
                guard: Some(guard),
            }),
            Err(_) => {
                release_idle(&self.slots, request_id);
                tracing::warn!(request_id = %request_id, ?timeout, "Lock acquisition timed out");
                Err(LockTimeout {
                    request_id,
                    waited: timeout,
                })
            }
        }
    }

    /// Requests that currently have a holder or waiter.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl AggregateGuard {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Drop for AggregateGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        release_idle(&self.slots, self.request_id);
    }
}

/// Remove the slot if the map holds the only reference to it.
fn release_idle(slots: &Slots, request_id: Uuid) {
    slots.remove_if(&request_id, |_, slot| Arc::strong_count(slot) == 1);
}
