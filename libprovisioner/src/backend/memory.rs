//! In-memory storage backend.
//!
//! Keeps folders in a set and counts every call, which makes it suitable for
//! dry runs and for asserting exactly which backend operations an adapter
//! performed.  Clones share state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{StorageBackend, StorageSession};
use crate::error::ProvisionerError;

#[derive(Default)]
struct MemoryState {
    folders: Mutex<BTreeSet<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    ensures: AtomicUsize,
    deletes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_ensure: AtomicBool,
    fail_delete: AtomicBool,
    ensure_delay: Mutex<Option<Duration>>,
}

/// Storage backend living entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a folder, as if an earlier attempt had already succeeded.
    pub fn insert_folder(&self, path: &str) {
        self.folders().insert(path.to_owned());
    }

    pub fn contains_folder(&self, path: &str) -> bool {
        self.folders().contains(path)
    }

    pub fn folder_count(&self) -> usize {
        self.folders().len()
    }

    /// Make every subsequent `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `ensure_folder` fail.
    pub fn fail_ensure(&self, fail: bool) {
        self.state.fail_ensure.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete_folder` fail.
    pub fn fail_delete(&self, fail: bool) {
        self.state.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Stall `ensure_folder` for `delay` before it takes effect.
    pub fn delay_ensure(&self, delay: Duration) {
        *self.lock_delay() = Some(delay);
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn ensure_calls(&self) -> usize {
        self.state.ensures.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.state.deletes.load(Ordering::SeqCst)
    }

    fn folders(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.state
            .folders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_delay(&self) -> std::sync::MutexGuard<'_, Option<Duration>> {
        self.state
            .ensure_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn connect(
        &self,
        endpoint: &str,
        _username: &str,
        _password: &str,
    ) -> Result<Box<dyn StorageSession>, ProvisionerError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ProvisionerError::Connect {
                endpoint: endpoint.to_owned(),
                reason: "connection refused".to_owned(),
            });
        }
        debug!(%endpoint, "memory session opened");
        Ok(Box::new(MemorySession {
            backend: self.clone(),
        }))
    }
}

struct MemorySession {
    backend: MemoryBackend,
}

#[async_trait]
impl StorageSession for MemorySession {
    async fn ensure_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let state = &self.backend.state;
        state.ensures.fetch_add(1, Ordering::SeqCst);

        let delay = *self.backend.lock_delay();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if state.fail_ensure.load(Ordering::SeqCst) {
            return Err(ProvisionerError::backend("createdir", path, "backend unavailable"));
        }
        self.backend.folders().insert(path.to_owned());
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let state = &self.backend.state;
        state.deletes.fetch_add(1, Ordering::SeqCst);
        if state.fail_delete.load(Ordering::SeqCst) {
            return Err(ProvisionerError::backend("delete", path, "backend unavailable"));
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.backend
            .folders()
            .retain(|folder| folder != path && !folder.starts_with(&prefix));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProvisionerError> {
        self.backend
            .state
            .disconnects
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_is_create_if_absent() {
        let backend = MemoryBackend::new();
        let session = backend.connect("mem://", "u", "p").await.unwrap();
        session.ensure_folder("/k8s/a").await.unwrap();
        session.ensure_folder("/k8s/a").await.unwrap();
        assert_eq!(backend.folder_count(), 1);
        assert_eq!(backend.ensure_calls(), 2);
    }

    #[tokio::test]
    async fn delete_removes_subtree() {
        let backend = MemoryBackend::new();
        backend.insert_folder("/k8s/a");
        backend.insert_folder("/k8s/a/nested");
        backend.insert_folder("/k8s/ab");
        let session = backend.connect("mem://", "u", "p").await.unwrap();
        session.delete_folder("/k8s/a").await.unwrap();
        assert!(!backend.contains_folder("/k8s/a"));
        assert!(!backend.contains_folder("/k8s/a/nested"));
        assert!(backend.contains_folder("/k8s/ab"));
    }

    #[tokio::test]
    async fn injected_failures() {
        let backend = MemoryBackend::new();
        backend.fail_connect(true);
        assert!(backend.connect("mem://", "u", "p").await.is_err());
        assert_eq!(backend.connects(), 1);

        backend.fail_connect(false);
        backend.fail_ensure(true);
        let session = backend.connect("mem://", "u", "p").await.unwrap();
        assert!(session.ensure_folder("/k8s/a").await.is_err());
        assert_eq!(backend.folder_count(), 0);
    }
}
