// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custody Authority
//!
//! The remote service that owns wallets, key quorums and policies, enforces
//! policies and produces signatures. The gateway only ever talks to it
//! through [`CustodyAuthority`].
//!
//! Owner-authorized operations take the [`AuthorizationKey`] of the quorum
//! that owns the target resource; the implementation signs the exact request
//! it sends with it.

pub mod privy;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::auth::AuthorizationKey;
use crate::policy::{PolicyRule, RuleRef};

pub use privy::{PrivyClient, PrivyConfig};
pub use types::{
    AdditionalSigner, CreateKeyQuorum, CreatePolicy, CreateWallet, CustodyError, KeyQuorum,
    Policy, UpstreamResponse, Wallet,
};

#[async_trait]
pub trait CustodyAuthority: Send + Sync {
    /// Public app identifier sent with every request.
    fn app_id(&self) -> &str;

    async fn create_key_quorum(&self, request: &CreateKeyQuorum) -> Result<KeyQuorum, CustodyError>;

    async fn delete_key_quorum(
        &self,
        quorum_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError>;

    async fn create_policy(&self, request: &CreatePolicy) -> Result<Policy, CustodyError>;

    async fn get_policy(&self, policy_id: &str) -> Result<Policy, CustodyError>;

    async fn delete_policy(
        &self,
        policy_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError>;

    async fn create_rule(
        &self,
        policy_id: &str,
        rule: &PolicyRule,
        authorization: &AuthorizationKey,
    ) -> Result<RuleRef, CustodyError>;

    async fn delete_rule(
        &self,
        policy_id: &str,
        rule_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError>;

    async fn create_wallet(&self, request: &CreateWallet) -> Result<Wallet, CustodyError>;

    /// Replace the wallet's additional signers.
    async fn update_wallet_signers(
        &self,
        wallet_id: &str,
        signers: &[AdditionalSigner],
        authorization: &AuthorizationKey,
    ) -> Result<Wallet, CustodyError>;

    /// Forward a client-signed RPC body.
    ///
    /// Any HTTP answer, including 4xx/5xx, is returned as `Ok`; only failure
    /// to obtain an answer is an error.
    async fn forward_rpc(
        &self,
        wallet_id: &str,
        authorization_signature: &str,
        body: &[u8],
    ) -> Result<UpstreamResponse, CustodyError>;
}
