//! Service configuration
//!
//! Defaults come from [`ServiceConfig::default`]; [`ServiceConfig::from_env`]
//! layers `NEBULA_*` environment variables on top. Front ends may override
//! individual fields afterwards.

use nebula_core::{Error, Result};
use nebula_params::{Network, NetworkType};
use nebula_rpc::GatewayConfig;
use nebula_vault::{DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Network profile (`mainnet`, `testnet`, `devnet`)
pub const ENV_NETWORK: &str = "NEBULA_NETWORK";
/// Custom RPC endpoint
pub const ENV_RPC_URL: &str = "NEBULA_RPC_URL";
/// Directory holding the wallet vault
pub const ENV_DATA_DIR: &str = "NEBULA_DATA_DIR";
/// Inactivity window in seconds
pub const ENV_INACTIVITY_SECS: &str = "NEBULA_INACTIVITY_SECS";
/// RPC request timeout in seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "NEBULA_REQUEST_TIMEOUT_SECS";
/// Confirmation timeout in seconds
pub const ENV_CONFIRMATION_TIMEOUT_SECS: &str = "NEBULA_CONFIRMATION_TIMEOUT_SECS";
/// PBKDF2 round count for newly sealed wallets
pub const ENV_PBKDF2_ITERATIONS: &str = "NEBULA_PBKDF2_ITERATIONS";

/// Wallet service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Network profile
    pub network: NetworkType,
    /// Custom RPC endpoint replacing the profile's default
    pub rpc_url: Option<String>,
    /// Directory holding the vault file
    pub data_dir: PathBuf,
    /// Inactivity window before the session locks (seconds)
    pub inactivity_timeout_secs: u64,
    /// Limit for one RPC round trip (seconds)
    pub request_timeout_secs: u64,
    /// Limit for a transaction to confirm (seconds)
    pub confirmation_timeout_secs: u64,
    /// Delay between confirmation polls (milliseconds)
    pub poll_interval_ms: u64,
    /// PBKDF2 rounds for newly sealed wallets
    pub pbkdf2_iterations: u32,
    /// Default transaction history page size
    pub history_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            network: NetworkType::default(),
            rpc_url: None,
            data_dir: nebula_vault::default_data_dir().unwrap_or_else(|_| PathBuf::from(".nebula")),
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT.as_secs(),
            request_timeout_secs: gateway.request_timeout.as_secs(),
            confirmation_timeout_secs: gateway.confirmation_timeout.as_secs(),
            poll_interval_ms: gateway.poll_interval.as_millis() as u64,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            history_limit: gateway.history_limit,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `NEBULA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(network) = lookup(ENV_NETWORK) {
            config.network = network.parse()?;
        }
        if let Some(url) = lookup(ENV_RPC_URL).filter(|u| !u.trim().is_empty()) {
            config.rpc_url = Some(url);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_INACTIVITY_SECS) {
            config.inactivity_timeout_secs = parse_number(ENV_INACTIVITY_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_number(ENV_REQUEST_TIMEOUT_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_CONFIRMATION_TIMEOUT_SECS) {
            config.confirmation_timeout_secs =
                parse_number(ENV_CONFIRMATION_TIMEOUT_SECS, &secs)?;
        }
        if let Some(rounds) = lookup(ENV_PBKDF2_ITERATIONS) {
            config.pbkdf2_iterations = parse_number(ENV_PBKDF2_ITERATIONS, &rounds)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.inactivity_timeout_secs == 0 {
            return Err(Error::Config("inactivity timeout must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 || self.confirmation_timeout_secs == 0 {
            return Err(Error::Config("network timeouts must be positive".to_string()));
        }
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::Config(format!(
                "PBKDF2 iterations {} below minimum {}",
                self.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        self.network_profile().map(|_| ())
    }

    /// Network profile with the endpoint override applied
    pub fn network_profile(&self) -> Result<Network> {
        let network = Network::from_type(self.network);
        match &self.rpc_url {
            Some(url) => Ok(network.with_rpc_url(url.as_str())?),
            None => Ok(network),
        }
    }

    /// Inactivity window
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    /// Gateway timings
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            history_limit: self.history_limit,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.network, NetworkType::Devnet);
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(15 * 60));
        assert_eq!(config.pbkdf2_iterations, 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ENV_NETWORK, "mainnet-beta"),
            (ENV_RPC_URL, "https://rpc.example.com/"),
            (ENV_DATA_DIR, "/tmp/nebula-test"),
            (ENV_INACTIVITY_SECS, "60"),
        ]))
        .unwrap();

        assert_eq!(config.network, NetworkType::Mainnet);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nebula-test"));
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(60));
        let network = config.network_profile().unwrap();
        assert!(network.is_production);
        assert_eq!(network.rpc_url, "https://rpc.example.com");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[(ENV_NETWORK, "moonnet")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[(ENV_INACTIVITY_SECS, "soon")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[(ENV_INACTIVITY_SECS, "0")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[(ENV_PBKDF2_ITERATIONS, "1000")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[(ENV_RPC_URL, "ftp://x")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "network": "testnet", "inactivity_timeout_secs": 300 }"#)
                .unwrap();
        assert_eq!(config.network, NetworkType::Testnet);
        assert_eq!(config.inactivity_timeout_secs, 300);
        assert_eq!(config.pbkdf2_iterations, DEFAULT_PBKDF2_ITERATIONS);
    }
}
