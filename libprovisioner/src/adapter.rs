//! NFS folder provisioner.
//!
//! [`NfsProvisioner`] implements [`Provisioner`], [`Qualifier`],
//! [`DeletionGuard`] and [`BlockProvisioner`] on top of any
//! [`StorageBackend`].  Each volume is one folder on the storage appliance,
//! exported over NFS.
//!
//! # Backend layout
//!
//! ```text
//! /<share>/
//!   <namespace>_<claim>_<volume>/   # one folder per provisioned volume
//! ```
//!
//! The adapter keeps no state between calls.  Everything needed to delete a
//! folder later is written into the volume's own annotations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::backend::{FileStationBackend, ScopedSession, StorageBackend};
use crate::config::BackendConfig;
use crate::error::ProvisionerError;
use crate::provisioner::{BlockProvisioner, DeletionGuard, Provisioner, Qualifier};
use crate::resolver::{PARAM_SHARE_NAME, resolve_mount_options, resolve_path, resolve_share};
use crate::types::*;

/// Name the provisioner registers under with the orchestration loop.
pub const PROVISIONER_NAME: &str = "qnap/filestation";

const OP_ENSURE: &str = "ensure storage folder";
const OP_DELETE: &str = "delete storage folder";

/// Provisioning adapter backed by a folder-per-volume NFS appliance.
///
/// # Thread safety
///
/// The only shared value is the read-only [`BackendConfig`].  Every call
/// opens its own session, so any number of Tokio tasks may provision and
/// delete different volumes concurrently.
pub struct NfsProvisioner<B> {
    config: Arc<BackendConfig>,
    backend: B,
}

impl NfsProvisioner<FileStationBackend> {
    /// Create a provisioner talking to a QNAP File Station appliance.
    pub fn file_station(config: Arc<BackendConfig>) -> Result<Self, ProvisionerError> {
        let backend = FileStationBackend::from_config(&config)?;
        Ok(Self::new(config, backend))
    }
}

impl<B: StorageBackend> NfsProvisioner<B> {
    pub fn new(config: Arc<BackendConfig>, backend: B) -> Self {
        Self { config, backend }
    }

    async fn open_session(&self) -> Result<ScopedSession, ProvisionerError> {
        ScopedSession::open(
            &self.backend,
            &self.config.endpoint,
            &self.config.username,
            &self.config.password,
        )
        .await
    }

    /// Create `path` on the backend within its own session.
    async fn ensure_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let scoped = self
            .open_session()
            .await
            .map_err(|e| e.context(OP_ENSURE, path))?;
        let result = match scoped.session() {
            Ok(session) => session.ensure_folder(path).await,
            Err(e) => Err(e),
        };
        scoped.release().await;
        result.map_err(|e| e.context(OP_ENSURE, path))
    }

    /// Remove `path` from the backend within its own session.
    async fn delete_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let scoped = self
            .open_session()
            .await
            .map_err(|e| e.context(OP_DELETE, path))?;
        let result = match scoped.session() {
            Ok(session) => session.delete_folder(path).await,
            Err(e) => Err(e),
        };
        scoped.release().await;
        result.map_err(|e| e.context(OP_DELETE, path))
    }

    fn build_volume(
        &self,
        req: ProvisionRequest,
        share: String,
        path: String,
        mount_options: Vec<String>,
    ) -> Volume {
        let annotations = StorageAnnotations {
            storage_name: self.config.nfs_hostname.clone(),
            storage_share: share,
            storage_path: path.clone(),
        };
        Volume {
            name: req.volume_name,
            annotations: annotations.into_map(),
            capacity: req.claim.requested_capacity,
            access_modes: req.claim.access_modes,
            reclaim_policy: req.reclaim_policy,
            mount_options,
            source: NfsSource {
                server: self.config.nfs_hostname.clone(),
                path,
                read_only: false,
            },
        }
    }
}

/// Reject identity components and share overrides that would make the
/// folder path ambiguous or escape the share.
fn validate_request(req: &ProvisionRequest) -> Result<(), ProvisionerError> {
    for (field, value) in [
        ("claim namespace", &req.claim.namespace),
        ("claim name", &req.claim.name),
        ("volume name", &req.volume_name),
    ] {
        if value.is_empty() {
            return Err(ProvisionerError::InvalidArgument(format!("{field} is empty")));
        }
        if value.contains('/') {
            return Err(ProvisionerError::InvalidArgument(format!(
                "{field} {value:?} contains '/'"
            )));
        }
    }
    if let Some(share) = req.parameters.get(PARAM_SHARE_NAME)
        && (share.contains('/') || share == "." || share == "..")
    {
        return Err(ProvisionerError::InvalidArgument(format!(
            "{PARAM_SHARE_NAME} {share:?} must be a single share name"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

#[async_trait]
impl<B: StorageBackend> Provisioner for NfsProvisioner<B> {
    fn name(&self) -> &str {
        PROVISIONER_NAME
    }

    #[instrument(
        skip(self, req),
        fields(volume = %req.volume_name, namespace = %req.claim.namespace, claim = %req.claim.name)
    )]
    async fn provision(&self, req: ProvisionRequest) -> ProvisionResult {
        if let Err(e) = validate_request(&req) {
            warn!(error = %e, "rejecting provision request");
            return ProvisionResult::Failure(e);
        }

        let default_share = &self.config.default_share;
        let share = resolve_share(&req.parameters, default_share).to_owned();
        let path = resolve_path(
            req.parameters.get(PARAM_SHARE_NAME).map(String::as_str),
            &req.claim.namespace,
            &req.claim.name,
            &req.volume_name,
            default_share,
        );
        let mount_options = resolve_mount_options(
            &req.parameters,
            &req.mount_options,
            &self.config.default_mount_options,
        );

        info!(
            nfs_host = %self.config.nfs_hostname,
            %path,
            ?mount_options,
            "provisioning persistent volume",
        );

        if let Err(e) = self.ensure_folder(&path).await {
            warn!(error = %e, "provisioning failed, leaving claim for retry");
            return ProvisionResult::NoChange(e);
        }

        let volume = self.build_volume(req, share, path, mount_options);
        info!("volume provisioned");
        ProvisionResult::Success(volume)
    }

    #[instrument(skip(self, volume), fields(volume = %volume.name))]
    async fn delete(&self, volume: &Volume) -> DeleteOutcome {
        let annotations =
            match StorageAnnotations::read_owned(&volume.annotations, &self.config.nfs_hostname) {
                Ok(annotations) => annotations,
                Err(reason) => {
                    warn!(reason, "volume not owned by this provisioner, ignoring");
                    return DeleteOutcome::Ignored {
                        reason: reason.to_owned(),
                    };
                }
            };

        let path = &annotations.storage_path;
        info!(nfs_host = %self.config.nfs_hostname, %path, "deleting persistent volume");

        match self.delete_folder(path).await {
            Ok(()) => {
                info!(%path, "volume deleted");
                DeleteOutcome::Done
            }
            Err(e) => {
                warn!(error = %e, "delete failed");
                DeleteOutcome::Failure(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Qualifier / DeletionGuard / BlockProvisioner
// ---------------------------------------------------------------------------

#[async_trait]
impl<B: StorageBackend> Qualifier for NfsProvisioner<B> {
    async fn should_provision(&self, _claim: &VolumeClaim) -> bool {
        // No topology or capacity precondition on the appliance.
        true
    }
}

#[async_trait]
impl<B: StorageBackend> DeletionGuard for NfsProvisioner<B> {
    async fn should_delete(&self, _volume: &Volume) -> bool {
        // Folders carry no retention protection yet.
        true
    }
}

#[async_trait]
impl<B: StorageBackend> BlockProvisioner for NfsProvisioner<B> {
    async fn supports_block(&self) -> bool {
        // An NFS export cannot be attached as a raw block device.
        false
    }
}
