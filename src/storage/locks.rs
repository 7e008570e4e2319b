// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-wallet writer locks.
//!
//! At most one mutating operation per wallet runs inside the process. A
//! second writer does not queue; it is told the wallet is busy.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of a write; released on drop.
pub type WalletGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default, Clone)]
pub struct WalletLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the writer lock for `wallet_id`, or `None` if it is held.
    pub fn try_acquire(&self, wallet_id: &str) -> Option<WalletGuard> {
        let lock = self
            .locks
            .entry(wallet_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().ok()
    }

    #[cfg(test)]
    pub fn is_locked(&self, wallet_id: &str) -> bool {
        self.locks
            .get(wallet_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_writer_is_refused_until_release() {
        let locks = WalletLocks::new();
        let guard = locks.try_acquire("w1").unwrap();
        assert!(locks.try_acquire("w1").is_none());
        assert!(locks.is_locked("w1"));

        drop(guard);
        assert!(!locks.is_locked("w1"));
        assert!(locks.try_acquire("w1").is_some());
    }

    #[test]
    fn wallets_lock_independently() {
        let locks = WalletLocks::new();
        let _a = locks.try_acquire("w1").unwrap();
        assert!(locks.try_acquire("w2").is_some());
    }

    #[test]
    fn clones_share_lock_state() {
        let locks = WalletLocks::new();
        let other = locks.clone();
        let _guard = locks.try_acquire("w1").unwrap();
        assert!(other.try_acquire("w1").is_none());
    }
}
