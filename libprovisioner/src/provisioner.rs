//! Capability traits expected by an external volume-provisioning controller.
//!
//! A generic orchestration loop watches claims and volumes and calls into
//! these traits; queuing, retries and backoff stay on its side.  Each
//! capability is a separate trait so a backend can opt into exactly the
//! hooks it supports.

use async_trait::async_trait;

use crate::types::{DeleteOutcome, ProvisionRequest, ProvisionResult, Volume, VolumeClaim};

/// Create and remove the storage behind a volume.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Name the orchestration loop matches against storage classes.
    fn name(&self) -> &str;

    /// Create the backing storage for `req` and describe it as a [`Volume`].
    ///
    /// Never retries internally: a [`ProvisionResult::NoChange`] tells the
    /// caller to try again later.
    async fn provision(&self, req: ProvisionRequest) -> ProvisionResult;

    /// Remove the backing storage of a volume created by [`Self::provision`].
    async fn delete(&self, volume: &Volume) -> DeleteOutcome;
}

/// Decide whether a claim should be provisioned at all.
#[async_trait]
pub trait Qualifier: Send + Sync {
    /// Return `true` when provisioning for `claim` should be attempted.
    async fn should_provision(&self, claim: &VolumeClaim) -> bool;
}

/// Veto deletion of a released volume.
#[async_trait]
pub trait DeletionGuard: Send + Sync {
    /// Return `true` when deleting `volume` should be attempted.
    async fn should_delete(&self, volume: &Volume) -> bool;
}

/// Block capability query.
#[async_trait]
pub trait BlockProvisioner: Send + Sync {
    /// Whether raw block volumes can be provisioned.
    async fn supports_block(&self) -> bool;
}
