// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Storage
//!
//! Persists the Admin and Gateway credentials of every vault, keyed by
//! `(role, walletId)`.
//!
//! ## Backends
//!
//! - `file` (default): one pretty-printed JSON file per record in `DATA_DIR`
//! - `redb`: a single embedded database file in `DATA_DIR`
//!
//! ## Important Notes
//!
//! - Private keys are stored in plain text; protect `DATA_DIR` accordingly
//! - Operator credentials are never stored
//! - Records are only deleted to undo a failed provisioning

pub mod credentials;
pub mod json_fs;
pub mod locks;
pub mod paths;
pub mod redb_store;

use std::sync::Arc;

pub use credentials::{
    validate_wallet_id, AdminCredential, CredentialStore, FileCredentialStore, GatewayCredential,
    StoredCredential, VaultSummary,
};
pub use json_fs::{JsonStore, StorageError, StorageResult};
pub use locks::{WalletGuard, WalletLocks};
pub use paths::StoragePaths;
pub use redb_store::RedbCredentialStore;

/// Selectable credential backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    File,
    Redb,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "redb" => Ok(StoreBackend::Redb),
            other => Err(format!("unknown credential store '{other}' (expected file or redb)")),
        }
    }
}

/// Open the configured backend under `paths`.
pub fn open_store(backend: StoreBackend, paths: StoragePaths) -> StorageResult<Arc<dyn CredentialStore>> {
    match backend {
        StoreBackend::File => Ok(Arc::new(FileCredentialStore::open(paths)?)),
        StoreBackend::Redb => Ok(Arc::new(RedbCredentialStore::open(&paths.redb_file())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("FILE".parse::<StoreBackend>(), Ok(StoreBackend::File));
        assert_eq!("redb".parse::<StoreBackend>(), Ok(StoreBackend::Redb));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn open_store_selects_backend() {
        let temp = tempfile::tempdir().unwrap();
        let file = open_store(StoreBackend::File, StoragePaths::new(temp.path())).unwrap();
        assert_eq!(file.backend(), "file");

        let redb = open_store(StoreBackend::Redb, StoragePaths::new(temp.path())).unwrap();
        assert_eq!(redb.backend(), "redb");
        assert!(temp.path().join(paths::REDB_FILE_NAME).is_file());
    }
}
