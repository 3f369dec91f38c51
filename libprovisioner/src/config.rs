//! Process-wide backend configuration.
//!
//! Read once at startup from the environment and shared read-only by every
//! provisioning call.
//!
//! Environment variables:
//! - `QNAP_URL`: File Station endpoint, e.g. `https://nas.local:443`. Required.
//! - `QNAP_NFSHOST`: hostname clients mount NFS exports from. Required.
//! - `QNAP_SHARE`: default share folders are created in. Required.
//! - `QNAP_USER` / `QNAP_PWD`: File Station credentials. Required.
//! - `QNAP_MOUNTOPTIONS`: colon-separated default mount options. Optional.
//! - `QNAP_TIMEOUT_SECS`: per-request timeout for backend calls. Defaults to `30`.

use std::fmt;
use std::time::Duration;

use crate::error::ProvisionerError;
use crate::resolver::split_mount_options;

pub const ENV_URL: &str = "QNAP_URL";
pub const ENV_NFS_HOST: &str = "QNAP_NFSHOST";
pub const ENV_SHARE: &str = "QNAP_SHARE";
pub const ENV_USER: &str = "QNAP_USER";
pub const ENV_PASSWORD: &str = "QNAP_PWD";
pub const ENV_MOUNT_OPTIONS: &str = "QNAP_MOUNTOPTIONS";
pub const ENV_TIMEOUT_SECS: &str = "QNAP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and policy defaults for the storage appliance.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// File Station endpoint URL.
    pub endpoint: String,
    /// NFS hostname written into every volume and checked before deletion.
    pub nfs_hostname: String,
    /// File Station user name.
    pub username: String,
    /// File Station password.
    pub password: String,
    /// Share used when a storage class does not set `shareName`.
    pub default_share: String,
    /// Mount options prepended to every volume unless suppressed.
    pub default_mount_options: Vec<String>,
    /// Upper bound on a single backend request.
    pub request_timeout: Duration,
}

impl BackendConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ProvisionerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// Required variables that are unset or empty yield
    /// [`ProvisionerError::Config`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProvisionerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &str| -> Result<String, ProvisionerError> {
            match lookup(var) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(ProvisionerError::Config {
                    var: var.to_owned(),
                    reason: "not set".to_owned(),
                }),
            }
        };

        let request_timeout = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) if !raw.is_empty() => {
                let secs = raw.parse::<u64>().map_err(|e| ProvisionerError::Config {
                    var: ENV_TIMEOUT_SECS.to_owned(),
                    reason: format!("{raw:?}: {e}"),
                })?;
                Duration::from_secs(secs)
            }
            _ => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            endpoint: required(ENV_URL)?,
            nfs_hostname: required(ENV_NFS_HOST)?,
            default_share: required(ENV_SHARE)?,
            username: required(ENV_USER)?,
            password: required(ENV_PASSWORD)?,
            default_mount_options: lookup(ENV_MOUNT_OPTIONS)
                .map(|raw| split_mount_options(&raw))
                .unwrap_or_default(),
            request_timeout,
        })
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("nfs_hostname", &self.nfs_hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("default_share", &self.default_share)
            .field("default_mount_options", &self.default_mount_options)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
