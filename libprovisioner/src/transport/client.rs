//! QUIC client used by a remote orchestration loop to drive the provisioner.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicClientConfig;
use tracing::{debug, instrument};

use super::MAX_MESSAGE_SIZE;
use crate::error::ProvisionerError;
use crate::message::ProvisionerMessage;
use crate::types::{DeleteOutcome, ProvisionRequest, ProvisionResult, Volume, VolumeClaim};

/// A lightweight client that sends [`ProvisionerMessage`] requests over a
/// single QUIC connection and returns the server's response.
pub struct ProvisionerClient {
    connection: quinn::Connection,
}

impl ProvisionerClient {
    /// Establish a new QUIC connection to the provisioner at `addr`.
    ///
    /// * `addr`: socket address of the provisioner server
    /// * `server_name`: TLS SNI name that must match a SAN in the server's
    ///   certificate
    /// * `tls_config`: client TLS configuration
    pub async fn connect(
        addr: SocketAddr,
        server_name: &str,
        tls_config: rustls::ClientConfig,
    ) -> Result<Self, ProvisionerError> {
        let quic_client_config = QuicClientConfig::try_from(tls_config)
            .map_err(|e| ProvisionerError::Transport(format!("invalid TLS config: {e}")))?;
        let client_config = quinn::ClientConfig::new(Arc::new(quic_client_config));

        let mut endpoint = quinn::Endpoint::client(SocketAddr::from(([0, 0, 0, 0], 0)))
            .map_err(ProvisionerError::transport)?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(addr, server_name)
            .map_err(ProvisionerError::transport)?
            .await
            .map_err(ProvisionerError::transport)?;

        debug!(%addr, %server_name, "provisioner QUIC connection established");
        Ok(Self { connection })
    }

    /// Send a request and wait for the corresponding response.
    ///
    /// Each call opens a new bi-directional QUIC stream, writes the
    /// JSON-serialized request, finishes the send side, then reads the
    /// full response and deserializes it.
    #[instrument(skip(self), fields(msg = %msg))]
    pub async fn request(
        &self,
        msg: &ProvisionerMessage,
    ) -> Result<ProvisionerMessage, ProvisionerError> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(ProvisionerError::transport)?;

        let payload = serde_json::to_vec(msg).map_err(ProvisionerError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(ProvisionerError::transport)?;
        send.finish().map_err(ProvisionerError::transport)?;

        let buf = recv
            .read_to_end(MAX_MESSAGE_SIZE)
            .await
            .map_err(ProvisionerError::transport)?;

        let response: ProvisionerMessage =
            serde_json::from_slice(&buf).map_err(ProvisionerError::transport)?;
        debug!(%response, "provisioner response received");
        Ok(response)
    }

    pub async fn should_provision(&self, claim: &VolumeClaim) -> Result<bool, ProvisionerError> {
        match self
            .request(&ProvisionerMessage::ShouldProvision(claim.clone()))
            .await?
        {
            ProvisionerMessage::ProvisionDecision(ok) => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn provision(
        &self,
        req: ProvisionRequest,
    ) -> Result<ProvisionResult, ProvisionerError> {
        match self.request(&ProvisionerMessage::Provision(req)).await? {
            ProvisionerMessage::Provisioned(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    pub async fn should_delete(&self, volume: &Volume) -> Result<bool, ProvisionerError> {
        match self
            .request(&ProvisionerMessage::ShouldDelete(volume.clone()))
            .await?
        {
            ProvisionerMessage::DeleteDecision(ok) => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn delete(&self, volume: &Volume) -> Result<DeleteOutcome, ProvisionerError> {
        match self
            .request(&ProvisionerMessage::Delete(volume.clone()))
            .await?
        {
            ProvisionerMessage::Deleted(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub async fn supports_block(&self) -> Result<bool, ProvisionerError> {
        match self.request(&ProvisionerMessage::SupportsBlock).await? {
            ProvisionerMessage::BlockSupport(ok) => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn provisioner_name(&self) -> Result<String, ProvisionerError> {
        match self.request(&ProvisionerMessage::GetProvisionerName).await? {
            ProvisionerMessage::ProvisionerName(name) => Ok(name),
            other => Err(unexpected(other)),
        }
    }

    /// Close the underlying QUIC connection gracefully.
    pub fn close(&self) {
        self.connection
            .close(quinn::VarInt::from_u32(0), b"client shutdown");
    }
}

/// Turn a mismatched or error response into an error.
fn unexpected(response: ProvisionerMessage) -> ProvisionerError {
    match response {
        ProvisionerMessage::Error(e) => e,
        other => ProvisionerError::Transport(format!("unexpected response: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_is_unwrapped() {
        let err = ProvisionerError::InvalidArgument("bad".into());
        assert_eq!(unexpected(ProvisionerMessage::Error(err.clone())), err);
    }

    #[test]
    fn mismatched_response_is_transport_error() {
        let err = unexpected(ProvisionerMessage::BlockSupport(false));
        assert_eq!(
            err,
            ProvisionerError::Transport("unexpected response: BlockSupport(false)".into())
        );
    }
}
