//! QNAP File Station backend.
//!
//! Talks to the appliance's `filemanager` CGI endpoints over HTTP(S):
//!
//! ```text
//! wfm2Login.cgi?user=<u>&pwd=<base64>                  -> {"status":1,"sid":"..."}
//! utilRequest.cgi?func=createdir&sid=..&dest_path=..&dest_folder=..
//! utilRequest.cgi?func=delete&sid=..&path=..&file_total=1&file_name=..
//! wfm2Logout.cgi?sid=..
//! ```
//!
//! Every reply carries a numeric `status`; see the `WFM2_*` constants.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{StorageBackend, StorageSession};
use crate::config::BackendConfig;
use crate::error::ProvisionerError;

const CGI_LOGIN: &str = "cgi-bin/filemanager/wfm2Login.cgi";
const CGI_LOGOUT: &str = "cgi-bin/filemanager/wfm2Logout.cgi";
const CGI_UTIL: &str = "cgi-bin/filemanager/utilRequest.cgi";

const WFM2_SUCCESS: i64 = 1;
const WFM2_FILE_EXIST: i64 = 2;
const WFM2_AUTH_FAIL: i64 = 3;
const WFM2_PERMISSION_DENY: i64 = 4;
const WFM2_FILE_NO_EXIST: i64 = 5;

#[derive(Debug, Default, Deserialize)]
struct StatusReply {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    sid: Option<String>,
}

fn describe_status(status: i64) -> String {
    match status {
        WFM2_AUTH_FAIL => "authentication failed".to_owned(),
        WFM2_PERMISSION_DENY => "permission denied".to_owned(),
        WFM2_FILE_NO_EXIST => "no such file or folder".to_owned(),
        other => format!("file station status {other}"),
    }
}

/// Map a `createdir` reply: an existing folder counts as created.
fn createdir_status(status: i64, path: &str) -> Result<(), ProvisionerError> {
    match status {
        WFM2_SUCCESS | WFM2_FILE_EXIST => Ok(()),
        other => Err(ProvisionerError::backend(
            "createdir",
            path,
            describe_status(other),
        )),
    }
}

/// Map a `delete` reply: a folder that is already gone counts as deleted,
/// so a retried delete converges.
fn delete_status(status: i64, path: &str) -> Result<(), ProvisionerError> {
    match status {
        WFM2_SUCCESS | WFM2_FILE_NO_EXIST => Ok(()),
        other => Err(ProvisionerError::backend(
            "delete",
            path,
            describe_status(other),
        )),
    }
}

/// Split `/share/a/b` into its non-empty segments.
fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// The `(dest_path, dest_folder)` pairs that create every level of `path`
/// below its share, outermost first.  The share itself must already exist.
fn createdir_steps(path: &str) -> Vec<(String, &str)> {
    let segments = path_segments(path);
    (1..segments.len())
        .map(|depth| (format!("/{}", segments[..depth].join("/")), segments[depth]))
        .collect()
}

/// Split a folder path into `(parent, name)`.  The parent is never empty:
/// folders directly under `/` are shares and cannot be deleted here.
fn split_parent(path: &str) -> Option<(String, &str)> {
    let segments = path_segments(path);
    let (name, parents) = segments.split_last()?;
    if parents.is_empty() {
        return None;
    }
    Some((format!("/{}", parents.join("/")), *name))
}

/// HTTP client for the File Station API.
#[derive(Clone)]
pub struct FileStationBackend {
    client: reqwest::Client,
}

impl FileStationBackend {
    /// Build a client whose requests are each bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProvisionerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProvisionerError::internal)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ProvisionerError> {
        Self::new(config.request_timeout)
    }
}

fn cgi_url(endpoint: &str, cgi: &str) -> String {
    format!("{}/{cgi}", endpoint.trim_end_matches('/'))
}

async fn get_status(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<StatusReply, reqwest::Error> {
    client
        .get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .json::<StatusReply>()
        .await
}

#[async_trait]
impl StorageBackend for FileStationBackend {
    #[instrument(skip(self, password))]
    async fn connect(
        &self,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn StorageSession>, ProvisionerError> {
        let connect_err = |reason: String| ProvisionerError::Connect {
            endpoint: endpoint.to_owned(),
            reason,
        };

        let encoded = STANDARD.encode(password);
        let reply = get_status(
            &self.client,
            &cgi_url(endpoint, CGI_LOGIN),
            &[("user", username), ("pwd", encoded.as_str())],
        )
        .await
        .map_err(|e| connect_err(e.to_string()))?;

        let sid = match reply {
            StatusReply {
                status: WFM2_SUCCESS,
                sid: Some(sid),
            } if !sid.is_empty() => sid,
            StatusReply { status, .. } => return Err(connect_err(describe_status(status))),
        };

        debug!(%endpoint, "file station session opened");
        Ok(Box::new(FileStationSession {
            client: self.client.clone(),
            endpoint: endpoint.to_owned(),
            sid,
        }))
    }
}

struct FileStationSession {
    client: reqwest::Client,
    endpoint: String,
    sid: String,
}

impl FileStationSession {
    async fn util(
        &self,
        op: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<i64, ProvisionerError> {
        let mut full = vec![("func", op), ("sid", self.sid.as_str())];
        full.extend_from_slice(query);
        let reply = get_status(&self.client, &cgi_url(&self.endpoint, CGI_UTIL), &full)
            .await
            .map_err(|e| ProvisionerError::backend(op, path, e))?;
        Ok(reply.status)
    }
}

#[async_trait]
impl StorageSession for FileStationSession {
    async fn ensure_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let steps = createdir_steps(path);
        if steps.is_empty() {
            return Err(ProvisionerError::InvalidArgument(format!(
                "folder path {path:?} must name a folder below a share"
            )));
        }

        for (parent, folder) in steps {
            let status = self
                .util(
                    "createdir",
                    path,
                    &[("dest_path", parent.as_str()), ("dest_folder", folder)],
                )
                .await?;
            createdir_status(status, path)?;
            debug!(%parent, %folder, status, "folder ensured");
        }
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<(), ProvisionerError> {
        let (parent, name) = split_parent(path).ok_or_else(|| {
            ProvisionerError::InvalidArgument(format!(
                "folder path {path:?} must name a folder below a share"
            ))
        })?;

        let status = self
            .util(
                "delete",
                path,
                &[
                    ("path", parent.as_str()),
                    ("file_total", "1"),
                    ("file_name", name),
                ],
            )
            .await?;
        delete_status(status, path)
    }

    async fn disconnect(&self) -> Result<(), ProvisionerError> {
        get_status(
            &self.client,
            &cgi_url(&self.endpoint, CGI_LOGOUT),
            &[("sid", self.sid.as_str())],
        )
        .await
        .map_err(|e| ProvisionerError::Connect {
            endpoint: self.endpoint.clone(),
            reason: format!("logout: {e}"),
        })?;
        Ok(())
    }
}
