//! Storage appliance clients.
//!
//! A [`StorageBackend`] opens authenticated [`StorageSession`]s; a session
//! exposes the two folder operations the provisioner needs.  Sessions are
//! always wrapped in a [`ScopedSession`] so they are released on every exit
//! path, including cancellation.

pub mod filestation;
pub mod memory;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProvisionerError;

pub use filestation::FileStationBackend;
pub use memory::MemoryBackend;

/// Factory for authenticated sessions against the storage appliance.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Log in to `endpoint`.
    async fn connect(
        &self,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn StorageSession>, ProvisionerError>;
}

/// One authenticated session.
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// Create `path` and any missing parents.  An existing folder is success.
    async fn ensure_folder(&self, path: &str) -> Result<(), ProvisionerError>;

    /// Remove `path` and everything below it.
    async fn delete_folder(&self, path: &str) -> Result<(), ProvisionerError>;

    /// Log out.  Errors are reported but the session is unusable afterwards
    /// either way.
    async fn disconnect(&self) -> Result<(), ProvisionerError>;
}

/// A session that is disconnected exactly once, however the caller exits.
///
/// Normal paths call [`ScopedSession::release`].  If the owning future is
/// dropped first (cancellation, timeout), `Drop` hands the logout to the
/// current Tokio runtime.
pub struct ScopedSession {
    session: Option<Box<dyn StorageSession>>,
}

impl ScopedSession {
    /// Open a session on `backend` and take ownership of it.
    pub async fn open<B>(
        backend: &B,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, ProvisionerError>
    where
        B: StorageBackend + ?Sized,
    {
        let session = backend.connect(endpoint, username, password).await?;
        Ok(Self {
            session: Some(session),
        })
    }

    /// Borrow the live session.
    pub fn session(&self) -> Result<&dyn StorageSession, ProvisionerError> {
        self.session
            .as_deref()
            .ok_or_else(|| ProvisionerError::Internal("session already released".into()))
    }

    /// Disconnect now.  A failed logout is logged, not returned: the folder
    /// operation already decided the outcome.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.disconnect().await
        {
            warn!(error = %e, "failed to disconnect storage session");
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.disconnect().await {
                        warn!(error = %e, "failed to disconnect abandoned storage session");
                    }
                });
            }
            Err(_) => warn!("no runtime available, storage session leaked"),
        }
    }
}
