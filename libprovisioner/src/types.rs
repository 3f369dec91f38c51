//! Core provisioner types: claims, requests, volumes, and call outcomes.
//!
//! These types form the data model shared by the capability traits, the
//! adapter, and the transport layer.  They are all
//! [`Serialize`]/[`Deserialize`] so they can be transmitted over QUIC as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ProvisionerError;

/// Annotation carrying the NFS hostname of the provisioner that created the
/// volume.  Checked before every deletion.
pub const ANNOTATION_STORAGE_NAME: &str = "storageName";
/// Annotation carrying the share the backend folder lives in.  Informational.
pub const ANNOTATION_STORAGE_SHARE: &str = "storageShare";
/// Annotation carrying the backend folder path.  The only record used to
/// locate the folder on deletion.
pub const ANNOTATION_STORAGE_PATH: &str = "storagePath";

/// Reason reported when a volume belongs to a different storage host.
pub const REASON_STORAGE_NAME_MISMATCH: &str = "storage name mismatch";
/// Reason reported when a volume has no usable `storagePath` annotation.
pub const REASON_MISSING_STORAGE_PATH: &str = "missing storage path annotation (storagePath)";

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// A resource quantity such as `"10Gi"`, copied verbatim from claim to volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Quantity(pub String);

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Quantity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & reclaim policy
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Single-node read-write.
    ReadWriteOnce,
    /// Multi-node read-only.
    ReadOnlyMany,
    /// Multi-node read-write.
    ReadWriteMany,
    /// Single-pod read-write.
    ReadWriteOncePod,
}

/// What happens to the backend folder once its volume is released.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Keep the folder; an administrator cleans it up.
    Retain,
    /// Delete the folder through [`crate::Provisioner::delete`].
    Delete,
    /// Scrub and reuse.  Passed through untouched.
    Recycle,
}

// ---------------------------------------------------------------------------
// Claims & requests
// ---------------------------------------------------------------------------

/// A request for storage, identified by namespace and name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeClaim {
    /// Namespace of the claim.
    pub namespace: String,
    /// Name of the claim, unique within its namespace.
    pub name: String,
    /// Requested access modes.
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Requested storage quantity.
    #[serde(default)]
    pub requested_capacity: Quantity,
}

/// Everything the orchestration loop knows when it asks for a new volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// The claim being satisfied.
    pub claim: VolumeClaim,
    /// Volume name assigned by the orchestration loop, unique per attempt.
    pub volume_name: String,
    /// Reclaim policy from the storage class.
    pub reclaim_policy: ReclaimPolicy,
    /// Storage class parameters, e.g. `shareName`, `noDefaultMountOptions`.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Storage class mount options, appended after the process defaults.
    #[serde(default)]
    pub mount_options: Vec<String>,
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

/// Location of the NFS export backing a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NfsSource {
    /// NFS server hostname.
    pub server: String,
    /// Exported folder path.
    pub path: String,
    /// Always `false`; read-only access is expressed through mount options.
    #[serde(default)]
    pub read_only: bool,
}

/// The provisioned volume handed back to the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Volume name, equal to [`ProvisionRequest::volume_name`].
    pub name: String,
    /// Ownership and location annotations, see [`StorageAnnotations`].
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Capacity copied from the claim.
    pub capacity: Quantity,
    /// Access modes copied from the claim.
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Reclaim policy copied from the storage class.
    pub reclaim_policy: ReclaimPolicy,
    /// Effective mount options.
    #[serde(default)]
    pub mount_options: Vec<String>,
    /// NFS export backing the volume.
    pub source: NfsSource,
}

/// Typed view over the annotations that make a [`Volume`] self-describing.
///
/// Written once by provisioning, read back and validated before deletion.
/// No other store records which backend folder belongs to which volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAnnotations {
    /// NFS hostname of the owning provisioner.
    pub storage_name: String,
    /// Share the folder was created in.
    pub storage_share: String,
    /// Backend folder path.
    pub storage_path: String,
}

impl StorageAnnotations {
    /// Read the annotations of a volume owned by `nfs_hostname`.
    ///
    /// Returns the skip reason when the volume belongs to another host
    /// (compared case-insensitively) or has no usable folder path.
    pub fn read_owned(
        annotations: &HashMap<String, String>,
        nfs_hostname: &str,
    ) -> Result<Self, &'static str> {
        let storage_name = match annotations.get(ANNOTATION_STORAGE_NAME) {
            Some(name) if name.eq_ignore_ascii_case(nfs_hostname) => name.clone(),
            _ => return Err(REASON_STORAGE_NAME_MISMATCH),
        };

        let storage_path = match annotations.get(ANNOTATION_STORAGE_PATH) {
            Some(path) if !path.is_empty() => path.clone(),
            _ => return Err(REASON_MISSING_STORAGE_PATH),
        };

        Ok(Self {
            storage_name,
            storage_share: annotations
                .get(ANNOTATION_STORAGE_SHARE)
                .cloned()
                .unwrap_or_default(),
            storage_path,
        })
    }

    /// Render the annotation map stored on a new volume.
    pub fn into_map(self) -> HashMap<String, String> {
        HashMap::from([
            (ANNOTATION_STORAGE_NAME.to_owned(), self.storage_name),
            (ANNOTATION_STORAGE_SHARE.to_owned(), self.storage_share),
            (ANNOTATION_STORAGE_PATH.to_owned(), self.storage_path),
        ])
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a single provisioning call.  Exactly one outcome per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProvisionResult {
    /// The backend folder exists and the volume is ready to be persisted.
    Success(Volume),
    /// Nothing changed on the backend; the caller should retry later.
    NoChange(ProvisionerError),
    /// The request can never succeed as submitted.
    Failure(ProvisionerError),
}

impl ProvisionResult {
    /// The provisioned volume, if any.
    pub fn volume(&self) -> Option<&Volume> {
        match self {
            Self::Success(volume) => Some(volume),
            _ => None,
        }
    }

    /// Whether the orchestration loop should retry this request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoChange(_))
    }
}

/// Result of a single deletion call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The backend folder was removed.
    Done,
    /// The volume is not ours to delete.  Leave its backend state untouched
    /// and do not retry.
    Ignored {
        /// Why the volume was skipped.
        reason: String,
    },
    /// The backend refused or failed; the caller should retry.
    Failure(ProvisionerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn quantity_display() {
        assert_eq!(Quantity::from("10Gi").to_string(), "10Gi");
    }

    #[test]
    fn annotations_roundtrip_through_map() {
        let written = StorageAnnotations {
            storage_name: "nas.local".into(),
            storage_share: "k8s".into(),
            storage_path: "/k8s/default_data_pvc-1".into(),
        };
        let map = written.clone().into_map();
        assert_eq!(map.len(), 3);
        let read = StorageAnnotations::read_owned(&map, "nas.local").unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn read_owned_ignores_hostname_case() {
        let map = annotations(&[("storageName", "NAS.Local"), ("storagePath", "/k8s/a")]);
        let read = StorageAnnotations::read_owned(&map, "nas.local").unwrap();
        assert_eq!(read.storage_path, "/k8s/a");
        assert!(read.storage_share.is_empty());
    }

    #[test]
    fn read_owned_rejects_foreign_or_missing_name() {
        let foreign = annotations(&[("storageName", "other-nas"), ("storagePath", "/k8s/a")]);
        assert_eq!(
            StorageAnnotations::read_owned(&foreign, "nas.local"),
            Err(REASON_STORAGE_NAME_MISMATCH)
        );

        let unnamed = annotations(&[("storagePath", "/k8s/a")]);
        assert_eq!(
            StorageAnnotations::read_owned(&unnamed, "nas.local"),
            Err(REASON_STORAGE_NAME_MISMATCH)
        );
    }

    #[test]
    fn read_owned_rejects_empty_path() {
        let map = annotations(&[("storageName", "nas.local"), ("storagePath", "")]);
        assert_eq!(
            StorageAnnotations::read_owned(&map, "nas.local"),
            Err(REASON_MISSING_STORAGE_PATH)
        );
    }

    #[test]
    fn provision_result_accessors() {
        let err = ProvisionerError::backend("ensure storage folder", "/k8s/a", "down");
        let result = ProvisionResult::NoChange(err);
        assert!(result.volume().is_none());
        assert!(result.is_retryable());
    }
}
