// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `credentials`: `"{role}:{walletId}"` → JSON bytes of the role's record

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};
use tracing::warn;

use super::credentials::{sort_oldest_first, validate_wallet_id, CredentialStore, StoredCredential};
use super::json_fs::{StorageError, StorageResult};
use crate::auth::Role;

const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");

fn record_key(role: Role, wallet_id: &str) -> String {
    format!("{role}:{wallet_id}")
}

/// Bounds covering every key of `role` (`';'` sorts right after `':'`).
fn role_range(role: Role) -> (String, String) {
    (format!("{role}:"), format!("{role};"))
}

pub struct RedbCredentialStore {
    db: Database,
}

impl RedbCredentialStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions never fail on a new file
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl CredentialStore for RedbCredentialStore {
    fn put(&self, record: &StoredCredential) -> StorageResult<()> {
        validate_wallet_id(record.wallet_id())?;
        let key = record_key(record.role(), record.wallet_id());
        let bytes = record.to_json_vec()?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, role: Role, wallet_id: &str) -> StorageResult<Option<StoredCredential>> {
        validate_wallet_id(wallet_id)?;
        if !role.is_persisted() {
            return Err(StorageError::NotPersisted(role));
        }
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        match table.get(record_key(role, wallet_id).as_str())? {
            Some(value) => Ok(Some(StoredCredential::from_json_slice(role, value.value())?)),
            None => Ok(None),
        }
    }

    fn delete(&self, role: Role, wallet_id: &str) -> StorageResult<bool> {
        validate_wallet_id(wallet_id)?;
        if !role.is_persisted() {
            return Err(StorageError::NotPersisted(role));
        }
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            let removed = table.remove(record_key(role, wallet_id).as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn list(&self, role: Role) -> StorageResult<Vec<StoredCredential>> {
        if !role.is_persisted() {
            return Err(StorageError::NotPersisted(role));
        }
        let (start, end) = role_range(role);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;

        let mut records = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, value) = entry?;
            match StoredCredential::from_json_slice(role, value.value()) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = key.value(), error = %e, "Skipping unreadable credential"),
            }
        }
        sort_oldest_first(&mut records);
        Ok(records)
    }

    fn backend(&self) -> &'static str {
        "redb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::credentials::tests::{admin_record, gateway_record};

    fn temp_db() -> (RedbCredentialStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbCredentialStore::open(&dir.path().join("credentials.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn put_then_get() {
        let (store, _dir) = temp_db();
        store
            .put(&StoredCredential::Admin(admin_record("w1")))
            .unwrap();
        assert_eq!(store.admin("w1").unwrap(), Some(admin_record("w1")));
        assert_eq!(store.gateway("w1").unwrap(), None);
    }

    #[test]
    fn put_replaces_existing_record() {
        let (store, _dir) = temp_db();
        let mut record = gateway_record("w1", 1);
        store.put(&StoredCredential::Gateway(record.clone())).unwrap();
        record.withdraw_whitelist = vec!["0x2222222222222222222222222222222222222222".into()];
        store.put(&StoredCredential::Gateway(record.clone())).unwrap();

        assert_eq!(store.gateway("w1").unwrap(), Some(record));
        assert_eq!(store.list(Role::Gateway).unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_the_record() {
        let (store, _dir) = temp_db();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
            .unwrap();
        store
            .put(&StoredCredential::Admin(admin_record("w1")))
            .unwrap();

        assert!(store.delete(Role::Gateway, "w1").unwrap());
        assert!(!store.delete(Role::Gateway, "w1").unwrap());
        assert!(store.vault_summaries().unwrap().is_empty());
        assert!(store.admin("w1").unwrap().is_some());
    }

    #[test]
    fn list_is_scoped_to_role() {
        let (store, _dir) = temp_db();
        store
            .put(&StoredCredential::Gateway(gateway_record("w2", 5)))
            .unwrap();
        store
            .put(&StoredCredential::Gateway(gateway_record("w1", 3)))
            .unwrap();
        store
            .put(&StoredCredential::Admin(admin_record("w1")))
            .unwrap();

        let gateways = store.list(Role::Gateway).unwrap();
        assert_eq!(gateways.len(), 2);
        assert!(gateways.iter().all(|r| r.role() == Role::Gateway));
        assert_eq!(gateways[0].wallet_id(), "w1");
        assert_eq!(store.list(Role::Admin).unwrap().len(), 1);
    }

    #[test]
    fn reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.redb");
        {
            let store = RedbCredentialStore::open(&path).unwrap();
            store
                .put(&StoredCredential::Gateway(gateway_record("w1", 1)))
                .unwrap();
        }
        let store = RedbCredentialStore::open(&path).unwrap();
        assert_eq!(store.vault_summaries().unwrap().len(), 1);
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let (store, _dir) = temp_db();
        assert!(matches!(
            store.get(Role::Admin, "../x"),
            Err(StorageError::InvalidWalletId(_))
        ));
    }
}
