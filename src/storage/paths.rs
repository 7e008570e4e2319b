// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the credential data directory.
//!
//! ```text
//! {DATA_DIR}/
//!   admin-{walletId}.json            # Admin owner credential
//!   gateway-signer-{walletId}.json   # Gateway signer credential
//!   credentials.redb                 # redb backend (when selected)
//! ```

use std::path::{Path, PathBuf};

use crate::auth::Role;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const ADMIN_FILE_PREFIX: &str = "admin-";
pub const GATEWAY_FILE_PREFIX: &str = "gateway-signer-";
pub const CREDENTIAL_EXTENSION: &str = "json";
pub const REDB_FILE_NAME: &str = "credentials.redb";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File-name prefix for a persisted role; `None` for the Operator.
    pub fn prefix(role: Role) -> Option<&'static str> {
        match role {
            Role::Admin => Some(ADMIN_FILE_PREFIX),
            Role::Gateway => Some(GATEWAY_FILE_PREFIX),
            Role::Operator => None,
        }
    }

    /// Path of the credential file for `(role, wallet_id)`.
    pub fn credential(&self, role: Role, wallet_id: &str) -> Option<PathBuf> {
        Self::prefix(role)
            .map(|prefix| self.root.join(format!("{prefix}{wallet_id}.{CREDENTIAL_EXTENSION}")))
    }

    pub fn admin(&self, wallet_id: &str) -> PathBuf {
        self.root
            .join(format!("{ADMIN_FILE_PREFIX}{wallet_id}.{CREDENTIAL_EXTENSION}"))
    }

    pub fn gateway(&self, wallet_id: &str) -> PathBuf {
        self.root
            .join(format!("{GATEWAY_FILE_PREFIX}{wallet_id}.{CREDENTIAL_EXTENSION}"))
    }

    pub fn redb_file(&self) -> PathBuf {
        self.root.join(REDB_FILE_NAME)
    }

    /// Recover the wallet id from a credential file stem for `role`.
    pub fn wallet_id_from_stem(role: Role, stem: &str) -> Option<String> {
        Self::prefix(role)
            .and_then(|prefix| stem.strip_prefix(prefix))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}
