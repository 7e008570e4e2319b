// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and
//! validated before anything is bound or opened.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `PRIVY_APP_ID` | Custody authority app identifier | Required |
//! | `PRIVY_APP_SECRET` | Custody authority app secret | Required |
//! | `PRIVY_API_BASE` | Custody authority base URL | `https://api.privy.io` |
//! | `GATEWAY_PUBLIC_URL` | URL handed to Operators in their bundle | `http://localhost:{PORT}` |
//! | `DATA_DIR` | Credential directory | `./data` |
//! | `CREDENTIAL_STORE` | `file` or `redb` | `file` |
//! | `POLICY_STRATEGY` | `minimal-allowlist` or `allowlist-first` | `minimal-allowlist` |
//! | `HL_NETWORK` | `mainnet` or `testnet` | `mainnet` |
//! | `WHITELISTED_ADDRESS` | Comma-separated whitelist applied on policy updates | unset |
//! | `UPSTREAM_TIMEOUT_SECS` | Outbound request timeout | `15` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::custody::privy::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use crate::custody::PrivyConfig;
use crate::policy::{HyperliquidNetwork, RuleStrategy, Whitelist};
use crate::storage::paths::DEFAULT_DATA_DIR;
use crate::storage::StoreBackend;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PRIVY_APP_ID_ENV: &str = "PRIVY_APP_ID";
pub const PRIVY_APP_SECRET_ENV: &str = "PRIVY_APP_SECRET";
pub const PRIVY_API_BASE_ENV: &str = "PRIVY_API_BASE";
pub const GATEWAY_PUBLIC_URL_ENV: &str = "GATEWAY_PUBLIC_URL";

/// Environment variable name for the credential directory path.
///
/// Admin and Gateway private keys are written here in plain text.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const CREDENTIAL_STORE_ENV: &str = "CREDENTIAL_STORE";
pub const POLICY_STRATEGY_ENV: &str = "POLICY_STRATEGY";
pub const HL_NETWORK_ENV: &str = "HL_NETWORK";
pub const WHITELISTED_ADDRESS_ENV: &str = "WHITELISTED_ADDRESS";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Certificate and key (PEM) for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub privy: PrivyConfig,
    pub public_url: String,
    pub data_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub strategy: RuleStrategy,
    pub network: HyperliquidNetwork,
    /// Applied by policy updates that carry no explicit whitelist
    pub whitelist: Option<Whitelist>,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let timeout_secs = parse_or(get(UPSTREAM_TIMEOUT_ENV), UPSTREAM_TIMEOUT_ENV, DEFAULT_TIMEOUT_SECS)?;

        let whitelist = get(WHITELISTED_ADDRESS_ENV)
            .map(|raw| Whitelist::parse_list(&raw))
            .transpose()
            .map_err(|e| ConfigError::Invalid {
                name: WHITELISTED_ADDRESS_ENV,
                reason: e.to_string(),
            })?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: TLS_CERT_PATH_ENV,
                    reason: format!("{TLS_CERT_PATH_ENV} and {TLS_KEY_PATH_ENV} must be set together"),
                })
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got '{other}'"),
                })
            }
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            privy: PrivyConfig {
                api_base: get(PRIVY_API_BASE_ENV)
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                app_id: required(PRIVY_APP_ID_ENV)?,
                app_secret: required(PRIVY_APP_SECRET_ENV)?,
                timeout: Duration::from_secs(timeout_secs),
            },
            public_url: get(GATEWAY_PUBLIC_URL_ENV).unwrap_or_else(|| format!("http://localhost:{port}")),
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()).into(),
            store_backend: parse_or(get(CREDENTIAL_STORE_ENV), CREDENTIAL_STORE_ENV, StoreBackend::default())?,
            strategy: parse_or(get(POLICY_STRATEGY_ENV), POLICY_STRATEGY_ENV, RuleStrategy::default())?,
            network: parse_or(get(HL_NETWORK_ENV), HL_NETWORK_ENV, HyperliquidNetwork::default())?,
            whitelist,
            tls,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| map.get(name).cloned())
    }

    const CREDS: [(&str, &str); 2] = [(PRIVY_APP_ID_ENV, "app"), (PRIVY_APP_SECRET_ENV, "secret")];

    #[test]
    fn defaults_apply() {
        let config = config(&CREDS).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.privy.api_base, DEFAULT_API_BASE);
        assert_eq!(config.privy.timeout, Duration::from_secs(15));
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.store_backend, StoreBackend::File);
        assert_eq!(config.strategy, RuleStrategy::MinimalAllowlist);
        assert_eq!(config.network, HyperliquidNetwork::Mainnet);
        assert_eq!(config.whitelist, None);
        assert_eq!(config.tls, None);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn app_credentials_are_required() {
        assert_eq!(
            config(&[(PRIVY_APP_ID_ENV, "app")]).unwrap_err(),
            ConfigError::Missing(PRIVY_APP_SECRET_ENV)
        );
        assert_eq!(
            config(&[(PRIVY_APP_ID_ENV, "  "), (PRIVY_APP_SECRET_ENV, "s")]).unwrap_err(),
            ConfigError::Missing(PRIVY_APP_ID_ENV)
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = CREDS.to_vec();
        vars.extend([
            (PORT_ENV, "8081"),
            (CREDENTIAL_STORE_ENV, "redb"),
            (POLICY_STRATEGY_ENV, "allowlist-first"),
            (HL_NETWORK_ENV, "testnet"),
            (WHITELISTED_ADDRESS_ENV, "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA, 0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            (PRIVY_API_BASE_ENV, "http://127.0.0.1:9000/"),
            (LOG_FORMAT_ENV, "JSON"),
        ]);
        let config = config(&vars).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.public_url, "http://localhost:8081");
        assert_eq!(config.store_backend, StoreBackend::Redb);
        assert_eq!(config.strategy, RuleStrategy::AllowlistFirst);
        assert_eq!(config.network, HyperliquidNetwork::Testnet);
        assert_eq!(config.whitelist.unwrap().addresses().len(), 2);
        assert_eq!(config.privy.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut vars = CREDS.to_vec();
        vars.push((PORT_ENV, "http"));
        assert!(matches!(config(&vars), Err(ConfigError::Invalid { name: PORT_ENV, .. })));

        let mut vars = CREDS.to_vec();
        vars.push((WHITELISTED_ADDRESS_ENV, "0x123"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: WHITELISTED_ADDRESS_ENV, .. })
        ));

        let mut vars = CREDS.to_vec();
        vars.push((TLS_CERT_PATH_ENV, "/tmp/cert.pem"));
        assert!(config(&vars).is_err());
    }
}
