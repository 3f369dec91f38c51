//! # libprovisioner: external NFS folder provisioner for RK8s
//!
//! `libprovisioner` is the decision core of an out-of-cluster volume
//! provisioner.  For every claim it creates one folder on a QNAP File Station
//! appliance and describes it as an NFS-backed [`Volume`]; for every released
//! volume it removes that folder again.  Watching claims, retrying and backoff
//! belong to the orchestration loop that calls in, either in-process through
//! the capability traits or remotely over QUIC (via [`quinn`]).  It follows
//! the RK8s architecture conventions (Tokio async runtime, `tracing` for
//! observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: claims, requests, `Volume`, annotations, outcomes. |
//! | [`error`] | [`ProvisionerError`] enum covering all failure modes. |
//! | [`config`] | [`BackendConfig`] read from the process environment. |
//! | [`resolver`] | Folder path and mount option resolution. |
//! | [`provisioner`] | Capability traits: provision/delete, qualifier, deletion guard, block support. |
//! | [`backend`] | Storage appliance clients (File Station, in-memory). |
//! | [`adapter`] | [`NfsProvisioner`], the provisioning adapter. |
//! | [`message`] | [`ProvisionerMessage`] protocol envelope for QUIC transport. |
//! | [`transport`] | QUIC client/server built on `quinn`. |

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod message;
pub mod provisioner;
pub mod resolver;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use adapter::{NfsProvisioner, PROVISIONER_NAME};
pub use config::BackendConfig;
pub use error::ProvisionerError;
pub use message::ProvisionerMessage;
pub use provisioner::{BlockProvisioner, DeletionGuard, Provisioner, Qualifier};
pub use types::*;
