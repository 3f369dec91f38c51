//! QUIC transport layer for provisioner messages.
//!
//! This module provides [`client::ProvisionerClient`] and
//! [`server::ProvisionerServer`] that communicate [`crate::ProvisionerMessage`]
//! values over QUIC bi-directional streams using `quinn`.

pub mod client;
pub mod server;

/// Upper bound on a single serialized message.
pub(crate) const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

pub use client::ProvisionerClient;
pub use server::ProvisionerServer;
