use std::path::Path;
use std::time::Duration;

use btc_engine::BtcNetwork;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP basic-auth credentials for a private backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Where and how to reach an Esplora-compatible REST backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host plus optional path prefix, without scheme
    /// (e.g. `blockstream.info/testnet/api`).
    pub server_host: String,
    pub use_tls: bool,
    pub credentials: Option<Credentials>,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::blockstream(BtcNetwork::Testnet)
    }
}

impl Config {
    /// The network's default public endpoint.
    pub fn for_network(network: BtcNetwork) -> Self {
        Self {
            server_host: network.default_api_host().to_string(),
            use_tls: network != BtcNetwork::Regtest,
            credentials: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// blockstream.info. It serves mainnet and testnet only; other networks
    /// fall back to their default endpoint.
    pub fn blockstream(network: BtcNetwork) -> Self {
        match network {
            BtcNetwork::Mainnet => Self::hosted("blockstream.info/api"),
            BtcNetwork::Testnet => Self::hosted("blockstream.info/testnet/api"),
            other => Self::for_network(other),
        }
    }

    /// mempool.space. Regtest falls back to the local default endpoint.
    pub fn mempool(network: BtcNetwork) -> Self {
        match network {
            BtcNetwork::Mainnet => Self::hosted("mempool.space/api"),
            BtcNetwork::Testnet => Self::hosted("mempool.space/testnet/api"),
            BtcNetwork::Signet => Self::hosted("mempool.space/signet/api"),
            BtcNetwork::Regtest => Self::for_network(BtcNetwork::Regtest),
        }
    }

    fn hosted(host: &str) -> Self {
        Self {
            server_host: host.to_string(),
            use_tls: true,
            credentials: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| ProviderError::Config(format!("invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        let host = self.server_host.trim();
        if host.is_empty() {
            return Err(ProviderError::Config("server_host is empty".into()));
        }
        if host.contains("://") {
            return Err(ProviderError::Config(format!(
                "server_host must not include a scheme: {host}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ProviderError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `{http|https}://{server_host}` with any trailing slash removed.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}", self.server_host.trim().trim_end_matches('/'))
    }
}
