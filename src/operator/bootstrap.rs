// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault creation from the Operator's machine.
//!
//! The Gateway returns the Operator bundle exactly once, so it is saved to a
//! local file right away. An existing file is only replaced when the caller
//! confirms; declining yields [`CreateOutcome::Cancelled`] without any
//! request being sent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::denial_reason;
use crate::custody::privy::DEFAULT_TIMEOUT_SECS;
use crate::policy::Whitelist;
use crate::storage::{JsonStore, StorageError, StoragePaths};
use crate::vault::OperatorConfig;

pub const OPERATOR_CONFIG_FILE: &str = "operator-config.json";

/// Local copy of the Operator bundle.
#[derive(Debug, Clone)]
pub struct OperatorConfigFile {
    store: JsonStore,
    path: PathBuf,
}

impl OperatorConfigFile {
    /// `{dir}/operator-config.json`; the directory is created on demand.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let paths = StoragePaths::new(dir);
        let path = paths.root().join(OPERATOR_CONFIG_FILE);
        let mut store = JsonStore::new(paths);
        store.initialize()?;
        Ok(Self { store, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.store.exists(&self.path)
    }

    /// The saved bundle; unreadable files count as absent.
    pub fn load(&self) -> Option<OperatorConfig> {
        match self.store.read_json(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable operator config");
                None
            }
        }
    }

    pub fn save(&self, config: &OperatorConfig) -> Result<(), StorageError> {
        self.store.write_json(&self.path, config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(OperatorConfig),
    /// An existing config was kept; nothing was created
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateVaultError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("Failed to create vault: {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to save operator config: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Client(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVaultResponse {
    #[serde(default)]
    success: bool,
    operator_config: Option<OperatorConfig>,
    #[serde(default)]
    error: Option<Value>,
}

/// Creates vaults through a Gateway and keeps the bundle on disk.
#[derive(Debug)]
pub struct VaultBootstrap {
    gateway_url: String,
    http: Client,
    config_file: OperatorConfigFile,
}

impl VaultBootstrap {
    pub fn new(gateway_url: impl Into<String>, config_file: OperatorConfigFile) -> Result<Self, CreateVaultError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CreateVaultError::Client(e.to_string()))?;
        Ok(Self {
            gateway_url: gateway_url.into(),
            http,
            config_file,
        })
    }

    pub fn config_file(&self) -> &OperatorConfigFile {
        &self.config_file
    }

    /// Create a vault whitelisting `whitelist`.
    ///
    /// `confirm_overwrite` is asked only when a config already exists.
    pub async fn create_vault<F>(
        &self,
        whitelist: &Whitelist,
        confirm_overwrite: F,
    ) -> Result<CreateOutcome, CreateVaultError>
    where
        F: FnOnce(&OperatorConfig) -> bool,
    {
        if let Some(existing) = self.config_file.load() {
            if !confirm_overwrite(&existing) {
                info!(wallet_id = %existing.wallet_id, "Vault creation cancelled; keeping existing config");
                return Ok(CreateOutcome::Cancelled);
            }
        }

        let url = format!("{}/v1/vault/create", self.gateway_url.trim_end_matches('/'));
        info!(gateway = %self.gateway_url, destinations = whitelist.addresses().len(), "Creating vault via gateway");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "withdrawWhitelist": whitelist.addresses() }))
            .send()
            .await
            .map_err(|e| CreateVaultError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| CreateVaultError::Unreachable(e.to_string()))?;
        let parsed: Option<CreateVaultResponse> = serde_json::from_value(body.clone()).ok();

        match parsed {
            Some(CreateVaultResponse {
                success: true,
                operator_config: Some(config),
                ..
            }) if status.is_success() => {
                self.config_file.save(&config)?;
                info!(
                    wallet_id = %config.wallet_id,
                    address = %config.wallet_address,
                    path = %self.config_file.path().display(),
                    "Vault created; operator config saved"
                );
                Ok(CreateOutcome::Created(config))
            }
            other => {
                let message = other
                    .and_then(|r| r.error)
                    .map(|error| match error {
                        Value::String(s) => s,
                        other => denial_reason(&json!({ "error": other })),
                    })
                    .unwrap_or_else(|| "Unknown error".to_string());
                Err(CreateVaultError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
