//! Provisioner protocol messages transmitted over QUIC.
//!
//! [`ProvisionerMessage`] is the envelope for all request and response
//! variants exchanged between a remote orchestration loop and the
//! provisioner via QUIC bi-directional streams.

use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;
use crate::types::*;

/// Top-level message envelope.
///
/// Each QUIC bi-stream carries exactly one request followed by one response.
/// The client sends a *request* variant and the server replies with the
/// corresponding *response* variant (or [`ProvisionerMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProvisionerMessage {
    // ----- Requests --------------------------------------------------------
    /// Ask whether a claim should be provisioned (Qualifier).
    ShouldProvision(VolumeClaim),
    /// Provision a volume for a claim (Provisioner).
    Provision(ProvisionRequest),
    /// Ask whether a released volume may be deleted (DeletionGuard).
    ShouldDelete(Volume),
    /// Delete the backend folder of a volume (Provisioner).
    Delete(Volume),
    /// Ask whether block volumes are supported (BlockProvisioner).
    SupportsBlock,
    /// Query the provisioner name.
    GetProvisionerName,

    // ----- Responses -------------------------------------------------------
    /// Answer to [`ProvisionerMessage::ShouldProvision`].
    ProvisionDecision(bool),
    /// Outcome of a provisioning call.
    Provisioned(ProvisionResult),
    /// Answer to [`ProvisionerMessage::ShouldDelete`].
    DeleteDecision(bool),
    /// Outcome of a deletion call.
    Deleted(DeleteOutcome),
    /// Answer to [`ProvisionerMessage::SupportsBlock`].
    BlockSupport(bool),
    /// Provisioner name.
    ProvisionerName(String),
    /// The request could not be handled.
    Error(ProvisionerError),
}

impl std::fmt::Display for ProvisionerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShouldProvision(claim) => {
                write!(f, "ShouldProvision({}/{})", claim.namespace, claim.name)
            }
            Self::Provision(req) => write!(f, "Provision(volume={})", req.volume_name),
            Self::ShouldDelete(v) => write!(f, "ShouldDelete({})", v.name),
            Self::Delete(v) => write!(f, "Delete({})", v.name),
            Self::SupportsBlock => f.write_str("SupportsBlock"),
            Self::GetProvisionerName => f.write_str("GetProvisionerName"),
            Self::ProvisionDecision(ok) => write!(f, "ProvisionDecision({})", ok),
            Self::Provisioned(ProvisionResult::Success(v)) => {
                write!(f, "Provisioned(Success({}))", v.name)
            }
            Self::Provisioned(ProvisionResult::NoChange(e)) => {
                write!(f, "Provisioned(NoChange({}))", e)
            }
            Self::Provisioned(ProvisionResult::Failure(e)) => {
                write!(f, "Provisioned(Failure({}))", e)
            }
            Self::DeleteDecision(ok) => write!(f, "DeleteDecision({})", ok),
            Self::Deleted(DeleteOutcome::Done) => f.write_str("Deleted(Done)"),
            Self::Deleted(DeleteOutcome::Ignored { reason }) => {
                write!(f, "Deleted(Ignored({}))", reason)
            }
            Self::Deleted(DeleteOutcome::Failure(e)) => write!(f, "Deleted(Failure({}))", e),
            Self::BlockSupport(ok) => write!(f, "BlockSupport({})", ok),
            Self::ProvisionerName(name) => write!(f, "ProvisionerName({})", name),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_request_roundtrip() {
        let msg = ProvisionerMessage::Provision(ProvisionRequest {
            claim: VolumeClaim {
                namespace: "default".into(),
                name: "data-claim".into(),
                access_modes: vec![AccessMode::ReadWriteOnce],
                requested_capacity: Quantity::from("1Gi"),
            },
            volume_name: "pvc-123".into(),
            reclaim_policy: ReclaimPolicy::Retain,
            parameters: Default::default(),
            mount_options: vec!["hard".into()],
        });
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: ProvisionerMessage = serde_json::from_str(&json).expect("deserialize");
        let ProvisionerMessage::Provision(req) = de else {
            panic!("unexpected variant");
        };
        assert_eq!(req.volume_name, "pvc-123");
        assert_eq!(req.reclaim_policy, ReclaimPolicy::Retain);
    }

    #[test]
    fn ignored_outcome_roundtrip() {
        let msg = ProvisionerMessage::Deleted(DeleteOutcome::Ignored {
            reason: REASON_STORAGE_NAME_MISMATCH.into(),
        });
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: ProvisionerMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(
            de,
            ProvisionerMessage::Deleted(DeleteOutcome::Ignored { ref reason })
                if reason == REASON_STORAGE_NAME_MISMATCH
        ));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(ProvisionerMessage::SupportsBlock.to_string(), "SupportsBlock");
        assert_eq!(
            ProvisionerMessage::Deleted(DeleteOutcome::Done).to_string(),
            "Deleted(Done)"
        );
        let claim = VolumeClaim {
            namespace: "ns".into(),
            name: "c".into(),
            ..Default::default()
        };
        assert_eq!(
            ProvisionerMessage::ShouldProvision(claim).to_string(),
            "ShouldProvision(ns/c)"
        );
    }
}
