// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::custody::{CustodyAuthority, CustodyError, PrivyClient};
use crate::policy::{compiler_for, RuleCompiler, Whitelist};
use crate::storage::{open_store, CredentialStore, StorageError, StoragePaths, WalletLocks};
use crate::vault::{PolicyUpdater, Provisioner, Relay};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Shared handles for request handlers. Everything is built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub provisioner: Provisioner,
    pub updater: PolicyUpdater,
    pub relay: Relay,
}

impl AppState {
    pub fn new(
        authority: Arc<dyn CustodyAuthority>,
        store: Arc<dyn CredentialStore>,
        compiler: Arc<dyn RuleCompiler>,
        gateway_url: impl Into<String>,
        env_whitelist: Option<Whitelist>,
    ) -> Self {
        Self {
            provisioner: Provisioner::new(authority.clone(), store.clone(), compiler.clone(), gateway_url),
            updater: PolicyUpdater::new(
                authority.clone(),
                store.clone(),
                compiler,
                WalletLocks::new(),
                env_whitelist,
            ),
            relay: Relay::new(authority),
            store,
        }
    }

    /// Wire the Privy client, the configured store and rule compiler.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, StateError> {
        let authority: Arc<dyn CustodyAuthority> = Arc::new(PrivyClient::new(config.privy.clone())?);
        let store = open_store(config.store_backend, StoragePaths::new(&config.data_dir))?;
        let compiler = compiler_for(config.strategy, config.network);
        Ok(Self::new(
            authority,
            store,
            compiler,
            config.public_url.clone(),
            config.whitelist.clone(),
        ))
    }
}
