//! Versioned config cell for sections swapped at runtime.
//!
//! Long-running processors keep a clone and take a [`ConfigStore::snapshot`]
//! at each use, so a SIGHUP reload is picked up on the next delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};

pub struct ConfigStore<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    data: RwLock<T>,
    version: AtomicU64,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(initial),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the stored value.
    pub async fn update(&self, value: T) {
        let mut guard = self.inner.data.write().await;
        *guard = value;
        self.inner.version.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read().await
    }

    /// Number of updates applied since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Relaxed)
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone the current value out so no lock is held across awaits.
    pub async fn snapshot(&self) -> T {
        self.inner.data.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store = ConfigStore::new(1u32);
        store.update(2).await;
        assert_eq!(*store.read().await, 2);
        assert_eq!(store.snapshot().await, 2);
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = ConfigStore::new(String::from("a"));
        let other = store.clone();
        other.update(String::from("b")).await;
        assert_eq!(store.snapshot().await, "b");
        assert_eq!(store.version(), 1);
    }
}
