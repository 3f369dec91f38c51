//! QUIC server exposing a provisioner to a remote orchestration loop.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use tracing::{debug, error, info, instrument, warn};

use super::MAX_MESSAGE_SIZE;
use crate::error::ProvisionerError;
use crate::message::ProvisionerMessage;
use crate::provisioner::{BlockProvisioner, DeletionGuard, Provisioner, Qualifier};

/// A server that accepts QUIC connections and dispatches
/// [`ProvisionerMessage`] requests to a [`Provisioner`] + [`Qualifier`] +
/// [`DeletionGuard`] + [`BlockProvisioner`] implementation.
pub struct ProvisionerServer<T> {
    endpoint: quinn::Endpoint,
    handler: Arc<T>,
}

impl<T> ProvisionerServer<T>
where
    T: Provisioner + Qualifier + DeletionGuard + BlockProvisioner + 'static,
{
    /// Create a new server bound to `addr`.
    pub fn new(
        addr: SocketAddr,
        tls_config: rustls::ServerConfig,
        handler: Arc<T>,
    ) -> Result<Self, ProvisionerError> {
        let quic_server_config = QuicServerConfig::try_from(tls_config)
            .map_err(|e| ProvisionerError::Transport(format!("invalid TLS config: {e}")))?;
        let server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        let endpoint =
            quinn::Endpoint::server(server_config, addr).map_err(ProvisionerError::transport)?;
        info!(%addr, provisioner = handler.name(), "provisioner QUIC server listening");
        Ok(Self { endpoint, handler })
    }

    /// Accept connections in a loop until the endpoint is closed.
    ///
    /// Each accepted connection spawns a Tokio task, and each bi-stream
    /// within a connection is handled concurrently.
    pub async fn serve(&self) -> Result<(), ProvisionerError> {
        while let Some(incoming) = self.endpoint.accept().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => {
                        let remote = conn.remote_address();
                        debug!(%remote, "provisioner connection accepted");
                        if let Err(e) = Self::handle_connection(conn, handler).await {
                            warn!(%remote, error = %e, "provisioner connection error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "provisioner incoming connection failed");
                    }
                }
            });
        }
        Ok(())
    }

    async fn handle_connection(
        conn: quinn::Connection,
        handler: Arc<T>,
    ) -> Result<(), ProvisionerError> {
        loop {
            let (send, recv) = match conn.accept_bi().await {
                Ok(stream) => stream,
                Err(quinn::ConnectionError::ApplicationClosed(_)) => return Ok(()),
                Err(e) => return Err(ProvisionerError::transport(e)),
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = Self::handle_stream(send, recv, &handler).await {
                    error!(error = %e, "provisioner stream handler error");
                }
            });
        }
    }

    /// Process a single bi-stream: read request → dispatch → write response.
    #[instrument(skip_all)]
    async fn handle_stream(
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
        handler: &T,
    ) -> Result<(), ProvisionerError> {
        let buf = recv
            .read_to_end(MAX_MESSAGE_SIZE)
            .await
            .map_err(ProvisionerError::transport)?;

        let request: ProvisionerMessage = serde_json::from_slice(&buf)
            .map_err(|e| ProvisionerError::Transport(format!("malformed request: {e}")))?;

        debug!(%request, "provisioner request received");

        let response = dispatch(handler, request).await;

        let payload = serde_json::to_vec(&response).map_err(ProvisionerError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(ProvisionerError::transport)?;
        send.finish().map_err(ProvisionerError::transport)?;
        Ok(())
    }

    /// Return a reference to the underlying QUIC endpoint, useful for
    /// obtaining the local address or shutting down.
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}

/// Map a request message to the matching trait call and wrap the result in a
/// response message.
pub(crate) async fn dispatch<T>(handler: &T, request: ProvisionerMessage) -> ProvisionerMessage
where
    T: Provisioner + Qualifier + DeletionGuard + BlockProvisioner,
{
    match request {
        ProvisionerMessage::ShouldProvision(claim) => {
            ProvisionerMessage::ProvisionDecision(handler.should_provision(&claim).await)
        }
        ProvisionerMessage::Provision(req) => {
            ProvisionerMessage::Provisioned(handler.provision(req).await)
        }
        ProvisionerMessage::ShouldDelete(volume) => {
            ProvisionerMessage::DeleteDecision(handler.should_delete(&volume).await)
        }
        ProvisionerMessage::Delete(volume) => {
            ProvisionerMessage::Deleted(handler.delete(&volume).await)
        }
        ProvisionerMessage::SupportsBlock => {
            ProvisionerMessage::BlockSupport(handler.supports_block().await)
        }
        ProvisionerMessage::GetProvisionerName => {
            ProvisionerMessage::ProvisionerName(handler.name().to_owned())
        }

        // Response variants should never arrive as requests.
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            ProvisionerMessage::Error(ProvisionerError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::adapter::{NfsProvisioner, PROVISIONER_NAME};
    use crate::backend::MemoryBackend;
    use crate::config::BackendConfig;
    use crate::types::*;

    fn make_provisioner(backend: &MemoryBackend) -> NfsProvisioner<MemoryBackend> {
        let config = BackendConfig {
            endpoint: "https://nas.local".to_owned(),
            nfs_hostname: "nas.local".to_owned(),
            username: "admin".to_owned(),
            password: "secret".to_owned(),
            default_share: "k8s".to_owned(),
            default_mount_options: Vec::new(),
            request_timeout: Duration::from_secs(5),
        };
        NfsProvisioner::new(Arc::new(config), backend.clone())
    }

    #[tokio::test]
    async fn dispatch_provision_and_delete() {
        let backend = MemoryBackend::new();
        let provisioner = make_provisioner(&backend);

        let request = ProvisionerMessage::Provision(ProvisionRequest {
            claim: VolumeClaim {
                namespace: "default".into(),
                name: "data-claim".into(),
                ..Default::default()
            },
            volume_name: "pvc-123".into(),
            reclaim_policy: ReclaimPolicy::Delete,
            parameters: HashMap::new(),
            mount_options: Vec::new(),
        });
        let ProvisionerMessage::Provisioned(ProvisionResult::Success(volume)) =
            dispatch(&provisioner, request).await
        else {
            panic!("expected a provisioned volume");
        };
        assert!(backend.contains_folder("/k8s/default_data-claim_pvc-123"));

        let response = dispatch(&provisioner, ProvisionerMessage::Delete(volume)).await;
        assert!(matches!(
            response,
            ProvisionerMessage::Deleted(DeleteOutcome::Done)
        ));
        assert_eq!(backend.folder_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_capability_queries() {
        let provisioner = make_provisioner(&MemoryBackend::new());

        assert!(matches!(
            dispatch(&provisioner, ProvisionerMessage::SupportsBlock).await,
            ProvisionerMessage::BlockSupport(false)
        ));
        assert!(matches!(
            dispatch(
                &provisioner,
                ProvisionerMessage::ShouldProvision(VolumeClaim::default())
            )
            .await,
            ProvisionerMessage::ProvisionDecision(true)
        ));
        assert!(matches!(
            dispatch(&provisioner, ProvisionerMessage::GetProvisionerName).await,
            ProvisionerMessage::ProvisionerName(ref name) if name == PROVISIONER_NAME
        ));
    }

    #[tokio::test]
    async fn dispatch_rejects_response_variants() {
        let provisioner = make_provisioner(&MemoryBackend::new());
        let response = dispatch(&provisioner, ProvisionerMessage::BlockSupport(true)).await;
        assert!(matches!(
            response,
            ProvisionerMessage::Error(ProvisionerError::InvalidArgument(_))
        ));
    }
}
