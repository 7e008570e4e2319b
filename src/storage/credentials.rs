// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-wallet role credentials.
//!
//! One record per `(role, walletId)`. Only the Admin and Gateway roles are
//! ever persisted; the Operator's private key leaves the service in the
//! creation response and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::json_fs::{JsonStore, StorageError, StorageResult};
use super::paths::{StoragePaths, CREDENTIAL_EXTENSION};
use crate::auth::Role;
use crate::policy::RuleStrategy;

/// Admin owner credential. Authorizes policy and signer changes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredential {
    pub wallet_id: String,
    pub admin_private_key: String,
    pub admin_public_key: String,
    pub key_quorum_id: String,
    pub policy_id: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("wallet_id", &self.wallet_id)
            .field("admin_private_key", &"<redacted>")
            .field("admin_public_key", &self.admin_public_key)
            .field("key_quorum_id", &self.key_quorum_id)
            .field("policy_id", &self.policy_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Gateway signer credential, with the whitelist in effect at creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCredential {
    pub wallet_id: String,
    pub wallet_address: String,
    pub signer_private_key: String,
    pub signer_public_key: String,
    pub key_quorum_id: String,
    pub policy_id: String,
    pub withdraw_whitelist: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Absent on records written before strategies were recorded
    #[serde(default)]
    pub rule_strategy: RuleStrategy,
}

impl std::fmt::Debug for GatewayCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredential")
            .field("wallet_id", &self.wallet_id)
            .field("wallet_address", &self.wallet_address)
            .field("signer_private_key", &"<redacted>")
            .field("signer_public_key", &self.signer_public_key)
            .field("key_quorum_id", &self.key_quorum_id)
            .field("policy_id", &self.policy_id)
            .field("withdraw_whitelist", &self.withdraw_whitelist)
            .field("created_at", &self.created_at)
            .field("rule_strategy", &self.rule_strategy)
            .finish()
    }
}

/// Public view of a vault, derived from its Gateway record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultSummary {
    pub wallet_id: String,
    pub wallet_address: String,
    pub policy_id: String,
    pub withdraw_whitelist: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&GatewayCredential> for VaultSummary {
    fn from(record: &GatewayCredential) -> Self {
        Self {
            wallet_id: record.wallet_id.clone(),
            wallet_address: record.wallet_address.clone(),
            policy_id: record.policy_id.clone(),
            withdraw_whitelist: record.withdraw_whitelist.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCredential {
    Admin(AdminCredential),
    Gateway(GatewayCredential),
}

impl StoredCredential {
    pub fn role(&self) -> Role {
        match self {
            StoredCredential::Admin(_) => Role::Admin,
            StoredCredential::Gateway(_) => Role::Gateway,
        }
    }

    pub fn wallet_id(&self) -> &str {
        match self {
            StoredCredential::Admin(c) => &c.wallet_id,
            StoredCredential::Gateway(c) => &c.wallet_id,
        }
    }

    /// JSON bytes of the inner record, the on-disk representation.
    pub fn to_json_vec(&self) -> StorageResult<Vec<u8>> {
        Ok(match self {
            StoredCredential::Admin(c) => serde_json::to_vec_pretty(c)?,
            StoredCredential::Gateway(c) => serde_json::to_vec_pretty(c)?,
        })
    }

    /// Decode a record stored under `role`.
    pub fn from_json_slice(role: Role, bytes: &[u8]) -> StorageResult<Self> {
        match role {
            Role::Admin => Ok(StoredCredential::Admin(serde_json::from_slice(bytes)?)),
            Role::Gateway => Ok(StoredCredential::Gateway(serde_json::from_slice(bytes)?)),
            Role::Operator => Err(StorageError::NotPersisted(Role::Operator)),
        }
    }
}

/// Reject ids that could escape the data directory or collide with keys.
pub fn validate_wallet_id(wallet_id: &str) -> StorageResult<()> {
    let invalid = wallet_id.is_empty()
        || wallet_id.contains(['/', '\\', '\0'])
        || wallet_id.contains("..")
        || wallet_id.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidWalletId(wallet_id.to_string()));
    }
    Ok(())
}

/// Key-value store of role credentials keyed by `(role, walletId)`.
pub trait CredentialStore: Send + Sync {
    /// Insert or replace the record for its `(role, walletId)`.
    fn put(&self, record: &StoredCredential) -> StorageResult<()>;

    fn get(&self, role: Role, wallet_id: &str) -> StorageResult<Option<StoredCredential>>;

    /// Remove the record for `(role, walletId)`; `false` when there was none.
    fn delete(&self, role: Role, wallet_id: &str) -> StorageResult<bool>;

    /// All records for `role`, oldest first.
    fn list(&self, role: Role) -> StorageResult<Vec<StoredCredential>>;

    /// Backend name, for logs.
    fn backend(&self) -> &'static str;

    fn admin(&self, wallet_id: &str) -> StorageResult<Option<AdminCredential>> {
        match self.get(Role::Admin, wallet_id)? {
            Some(StoredCredential::Admin(record)) => Ok(Some(record)),
            Some(_) => Err(StorageError::RoleMismatch {
                role: Role::Admin,
                wallet_id: wallet_id.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn gateway(&self, wallet_id: &str) -> StorageResult<Option<GatewayCredential>> {
        match self.get(Role::Gateway, wallet_id)? {
            Some(StoredCredential::Gateway(record)) => Ok(Some(record)),
            Some(_) => Err(StorageError::RoleMismatch {
                role: Role::Gateway,
                wallet_id: wallet_id.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Summaries of every vault with a Gateway record.
    fn vault_summaries(&self) -> StorageResult<Vec<VaultSummary>> {
        Ok(self
            .list(Role::Gateway)?
            .iter()
            .filter_map(|record| match record {
                StoredCredential::Gateway(g) => Some(VaultSummary::from(g)),
                StoredCredential::Admin(_) => None,
            })
            .collect())
    }
}

pub(crate) fn sort_oldest_first(records: &mut [StoredCredential]) {
    records.sort_by(|a, b| {
        created_at(a)
            .cmp(&created_at(b))
            .then_with(|| a.wallet_id().cmp(b.wallet_id()))
    });
}

fn created_at(record: &StoredCredential) -> DateTime<Utc> {
    match record {
        StoredCredential::Admin(c) => c.created_at,
        StoredCredential::Gateway(c) => c.created_at,
    }
}

/// One JSON file per `(role, walletId)` in the data directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    store: JsonStore,
}

impl FileCredentialStore {
    /// Open the data directory, creating it if needed.
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        let mut store = JsonStore::new(paths);
        store.initialize()?;
        Ok(Self { store })
    }

    pub fn paths(&self) -> &StoragePaths {
        self.store.paths()
    }

    pub fn health_check(&self) -> StorageResult<()> {
        self.store.health_check()
    }

    fn path(&self, role: Role, wallet_id: &str) -> StorageResult<std::path::PathBuf> {
        validate_wallet_id(wallet_id)?;
        self.paths()
            .credential(role, wallet_id)
            .ok_or(StorageError::NotPersisted(role))
    }
}

impl CredentialStore for FileCredentialStore {
    fn put(&self, record: &StoredCredential) -> StorageResult<()> {
        let path = self.path(record.role(), record.wallet_id())?;
        match record {
            StoredCredential::Admin(c) => self.store.write_json(path, c),
            StoredCredential::Gateway(c) => self.store.write_json(path, c),
        }
    }

    fn get(&self, role: Role, wallet_id: &str) -> StorageResult<Option<StoredCredential>> {
        let path = self.path(role, wallet_id)?;
        Ok(match role {
            Role::Admin => self.store.read_json(path)?.map(StoredCredential::Admin),
            Role::Gateway => self.store.read_json(path)?.map(StoredCredential::Gateway),
            Role::Operator => return Err(StorageError::NotPersisted(role)),
        })
    }

    fn delete(&self, role: Role, wallet_id: &str) -> StorageResult<bool> {
        let path = self.path(role, wallet_id)?;
        self.store.remove_json(path)
    }

    fn list(&self, role: Role) -> StorageResult<Vec<StoredCredential>> {
        if !role.is_persisted() {
            return Err(StorageError::NotPersisted(role));
        }
        let mut records = Vec::new();
        for stem in self.store.list_stems(CREDENTIAL_EXTENSION)? {
            let Some(wallet_id) = StoragePaths::wallet_id_from_stem(role, &stem) else {
                continue;
            };
            match self.get(role, &wallet_id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(wallet_id = %wallet_id, role = %role, error = %e, "Skipping unreadable credential"),
            }
        }
        sort_oldest_first(&mut records);
        Ok(records)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    pub(crate) fn admin_record(wallet_id: &str) -> AdminCredential {
        AdminCredential {
            wallet_id: wallet_id.to_string(),
            admin_private_key: "admin-private".to_string(),
            admin_public_key: "admin-public".to_string(),
            key_quorum_id: "kq-admin".to_string(),
            policy_id: "policy-1".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    pub(crate) fn gateway_record(wallet_id: &str, day: u32) -> GatewayCredential {
        GatewayCredential {
            wallet_id: wallet_id.to_string(),
            wallet_address: "0x1111111111111111111111111111111111111111".to_string(),
            signer_private_key: "gateway-private".to_string(),
            signer_public_key: "gateway-public".to_string(),
            key_quorum_id: "kq-gateway".to_string(),
            policy_id: "policy-1".to_string(),
            withdraw_whitelist: vec!["0x36cd9238fd87901661d74c6e7d817debbed034d4".to_string()],
            created_at: Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
            rule_strategy: RuleStrategy::MinimalAllowlist,
        }
    }

    fn setup() -> (TempDir, FileCredentialStore) {
        let temp = TempDir::new().unwrap();
        let store = FileCredentialStore::open(StoragePaths::new(temp.path())).unwrap();
        (temp, store)
    }

    #[test]
    fn put_then_get_by_role() {
        let (_temp, store) = setup();
        store
            .put(&StoredCredential::Admin(admin_record("w1")))
            .unwrap();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
            .unwrap();

        assert_eq!(store.admin("w1").unwrap(), Some(admin_record("w1")));
        assert_eq!(store.gateway("w1").unwrap(), Some(gateway_record("w1", 1)));
        assert!(store.paths().admin("w1").is_file());
        assert!(store.paths().gateway("w1").is_file());
    }

    #[test]
    fn delete_removes_only_that_role() {
        let (_temp, store) = setup();
        store
            .put(&StoredCredential::Admin(admin_record("w1")))
            .unwrap();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
            .unwrap();

        assert!(store.delete(Role::Gateway, "w1").unwrap());
        assert_eq!(store.gateway("w1").unwrap(), None);
        assert!(store.admin("w1").unwrap().is_some());
        assert!(!store.delete(Role::Gateway, "w1").unwrap());
        assert!(store.vault_summaries().unwrap().is_empty());
    }

    #[test]
    fn unknown_wallet_is_none() {
        let (_temp, store) = setup();
        assert_eq!(store.gateway("missing").unwrap(), None);
    }

    #[test]
    fn files_use_camel_case_fields() {
        let (_temp, store) = setup();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
            .unwrap();
        let text = std::fs::read_to_string(store.paths().gateway("w1")).unwrap();
        assert!(text.contains("\"walletId\""));
        assert!(text.contains("\"signerPrivateKey\""));
        assert!(text.contains("\"withdrawWhitelist\""));
    }

    #[test]
    fn records_without_strategy_default_to_minimal() {
        let mut value = serde_json::to_value(gateway_record("w1", 1)).unwrap();
        value.as_object_mut().unwrap().remove("ruleStrategy");
        let record: GatewayCredential = serde_json::from_value(value).unwrap();
        assert_eq!(record.rule_strategy, RuleStrategy::MinimalAllowlist);
    }

    #[test]
    fn list_returns_gateway_records_oldest_first() {
        let (_temp, store) = setup();
        store
            .put(&StoredCredential::Gateway(gateway_record("w-late", 9)))
            .unwrap();
        store
            .put(&StoredCredential::Gateway(gateway_record("w-early", 2)))
            .unwrap();
        store
            .put(&StoredCredential::Admin(admin_record("w-early")))
            .unwrap();

        let summaries = store.vault_summaries().unwrap();
        let ids: Vec<&str> = summaries.iter().map(|s| s.wallet_id.as_str()).collect();
        assert_eq!(ids, vec!["w-early", "w-late"]);
    }

    #[test]
    fn list_skips_unreadable_files() {
        let (_temp, store) = setup();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
            .unwrap();
        std::fs::write(store.paths().gateway("broken"), "{").unwrap();
        assert_eq!(store.list(Role::Gateway).unwrap().len(), 1);
    }

    #[test]
    fn operator_records_are_refused() {
        let (_temp, store) = setup();
        assert!(matches!(
            store.get(Role::Operator, "w1"),
            Err(StorageError::NotPersisted(Role::Operator))
        ));
        assert!(store.list(Role::Operator).is_err());
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let (_temp, store) = setup();
        for bad in ["", "../etc", "a/b", "a\\b", "..", "w\n1"] {
            assert!(
                matches!(store.gateway(bad), Err(StorageError::InvalidWalletId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_wallet_id("cm1abcxyz0001").is_ok());
    }

    #[test]
    fn debug_redacts_private_keys() {
        let debug = format!("{:?}", gateway_record("w1", 1));
        assert!(!debug.contains("gateway-private"));
        let debug = format!("{:?}", admin_record("w1"));
        assert!(!debug.contains("admin-private"));
    }
}
