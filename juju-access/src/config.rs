// SPDX-License-Identifier: MIT OR Apache-2.0

//! Controller connection settings.
//!
//! `ControllerConfig` carries the addresses and credentials handed to the connector for every
//! session. `DialOptions` holds the timings applied uniformly to each connect: a fixed
//! connection timeout and an inter-retry delay shorter than the transport default.
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for establishing a single controller session.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between dial attempts within one connect.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Timings applied to every controller connect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialOptions {
    /// Overall time budget for one connect, including retries.
    pub timeout: Duration,

    /// Delay between dial attempts.
    pub retry_delay: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Addresses and credentials of the controller to reconcile against.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// `host:port` addresses of the controller API.
    pub controller_addresses: Vec<String>,

    pub username: String,

    pub password: String,

    /// PEM encoded CA certificate of the controller, if it is not publicly trusted.
    pub ca_cert: Option<String>,

    /// OAuth client id, only set when connecting to JAAS.
    pub client_id: String,

    /// OAuth client secret, only set when connecting to JAAS.
    pub client_secret: String,

    pub dial_options: DialOptions,
}

impl ControllerConfig {
    /// Whether the credentials were issued in the JAAS format.
    ///
    /// Used as the fallback when the capability probe can not reach the controller.
    pub fn capability_hint(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller_addresses.is_empty() {
            return Err(ConfigError::NoControllerAddresses);
        }

        if let Some(address) = self
            .controller_addresses
            .iter()
            .find(|address| address.trim().is_empty())
        {
            return Err(ConfigError::InvalidAddress(address.clone()));
        }

        let password_login = !self.username.is_empty() || !self.password.is_empty();
        let client_login = !self.client_id.is_empty() || !self.client_secret.is_empty();

        match (password_login, client_login) {
            (false, false) => Err(ConfigError::MissingCredentials),
            (true, _) if self.username.is_empty() || self.password.is_empty() => {
                Err(ConfigError::IncompleteCredentials("username and password"))
            }
            (_, true) if !self.capability_hint() => {
                Err(ConfigError::IncompleteCredentials("client id and client secret"))
            }
            _ => Ok(()),
        }
    }
}

impl Debug for ControllerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("controller_addresses", &self.controller_addresses)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_cert", &self.ca_cert.as_ref().map(|_| "<pem>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("dial_options", &self.dial_options)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one controller address is required")]
    NoControllerAddresses,

    #[error("invalid controller address {0:?}")]
    InvalidAddress(String),

    #[error("either username and password or client id and client secret are required")]
    MissingCredentials,

    #[error("{0} must both be set")]
    IncompleteCredentials(&'static str),
}
