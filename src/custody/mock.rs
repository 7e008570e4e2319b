// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory custody authority for tests.
//!
//! Keeps quorums, policies and wallets in maps, checks owner authorization
//! against registered quorum keys, records every call and can fail the n-th
//! call of any operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::types::{
    AdditionalSigner, CreateKeyQuorum, CreatePolicy, CreateWallet, CustodyError, KeyQuorum,
    Policy, UpstreamResponse, Wallet,
};
use super::CustodyAuthority;
use crate::auth::AuthorizationKey;
use crate::policy::{PolicyRule, RuleRef};

pub const MOCK_APP_ID: &str = "mock-app";
pub const MOCK_SIGNATURE: &str = "0xfeedface";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateKeyQuorum,
    DeleteKeyQuorum,
    CreatePolicy,
    GetPolicy,
    DeletePolicy,
    CreateRule,
    DeleteRule,
    CreateWallet,
    UpdateWalletSigners,
    ForwardRpc,
}

#[derive(Debug, Clone)]
pub struct ForwardedRpc {
    pub wallet_id: String,
    pub signature: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MockWallet {
    pub wallet: Wallet,
    pub owner_id: String,
    pub additional_signers: Vec<AdditionalSigner>,
}

#[derive(Debug, Default)]
pub struct MockAuthority {
    next_id: AtomicUsize,
    calls: Mutex<Vec<Op>>,
    failures: Mutex<HashMap<Op, usize>>,
    rpc_unreachable: Mutex<bool>,
    rpc_response: Mutex<Option<UpstreamResponse>>,
    dropped_rule: Mutex<Option<usize>>,
    pub quorums: Mutex<HashMap<String, KeyQuorum>>,
    pub policies: Mutex<HashMap<String, Policy>>,
    pub wallets: Mutex<HashMap<String, MockWallet>>,
    pub forwarded: Mutex<Vec<ForwardedRpc>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` (1-based) call of `op` with a 500 rejection.
    pub fn failing(self, op: Op, nth: usize) -> Self {
        self.failures.lock().unwrap().insert(op, nth);
        self
    }

    /// Acknowledge the `nth` (1-based) `create_rule` call without storing it.
    pub fn dropping_rule(self, nth: usize) -> Self {
        *self.dropped_rule.lock().unwrap() = Some(nth);
        self
    }

    /// Make `forward_rpc` fail at the transport level.
    pub fn unreachable(self) -> Self {
        *self.rpc_unreachable.lock().unwrap() = true;
        self
    }

    /// Answer `forward_rpc` with a fixed upstream response.
    pub fn responding(self, status: u16, body: serde_json::Value) -> Self {
        *self.rpc_response.lock().unwrap() = Some(UpstreamResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        });
        self
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn policy(&self, id: &str) -> Option<Policy> {
        self.policies.lock().unwrap().get(id).cloned()
    }

    pub fn wallet(&self, id: &str) -> Option<MockWallet> {
        self.wallets.lock().unwrap().get(id).cloned()
    }

    /// Insert a policy directly, bypassing call accounting.
    pub fn seed_policy(&self, policy: Policy) {
        self.policies.lock().unwrap().insert(policy.id.clone(), policy);
    }

    fn id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}-{}", uuid::Uuid::new_v4().simple())
    }

    fn record(&self, op: Op) -> Result<(), CustodyError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(op);
        let nth = calls.iter().filter(|c| **c == op).count();
        if self.failures.lock().unwrap().get(&op) == Some(&nth) {
            return Err(CustodyError::Rejected {
                status: 500,
                body: format!("{{\"error\":\"injected failure in {op:?}\"}}"),
            });
        }
        Ok(())
    }

    fn check_owner(&self, quorum_id: &str, key: &AuthorizationKey) -> Result<(), CustodyError> {
        let public_key = key.public_key()?;
        let authorized = self
            .quorums
            .lock()
            .unwrap()
            .get(quorum_id)
            .is_some_and(|q| q.public_keys.contains(&public_key));
        if authorized {
            Ok(())
        } else {
            Err(CustodyError::Rejected {
                status: 401,
                body: r#"{"error":"Invalid authorization signature"}"#.to_string(),
            })
        }
    }

    fn policy_owner(&self, policy_id: &str) -> Result<String, CustodyError> {
        self.policies
            .lock()
            .unwrap()
            .get(policy_id)
            .map(|p| p.owner_id.clone().unwrap_or_default())
            .ok_or_else(not_found)
    }
}

fn not_found() -> CustodyError {
    CustodyError::Rejected {
        status: 404,
        body: r#"{"error":"Not found"}"#.to_string(),
    }
}

#[async_trait]
impl CustodyAuthority for MockAuthority {
    fn app_id(&self) -> &str {
        MOCK_APP_ID
    }

    async fn create_key_quorum(&self, request: &CreateKeyQuorum) -> Result<KeyQuorum, CustodyError> {
        self.record(Op::CreateKeyQuorum)?;
        let quorum = KeyQuorum {
            id: self.id("kq"),
            public_keys: request.public_keys.clone(),
            authorization_threshold: Some(request.authorization_threshold),
            display_name: Some(request.display_name.clone()),
        };
        self.quorums
            .lock()
            .unwrap()
            .insert(quorum.id.clone(), quorum.clone());
        Ok(quorum)
    }

    async fn delete_key_quorum(
        &self,
        quorum_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        self.record(Op::DeleteKeyQuorum)?;
        self.check_owner(quorum_id, authorization)?;
        self.quorums.lock().unwrap().remove(quorum_id);
        Ok(())
    }

    async fn create_policy(&self, request: &CreatePolicy) -> Result<Policy, CustodyError> {
        self.record(Op::CreatePolicy)?;
        let rules = request
            .rules
            .iter()
            .map(|rule| PolicyRule {
                id: Some(self.id("rule")),
                ..rule.clone()
            })
            .collect();
        let policy = Policy {
            id: self.id("policy"),
            name: request.name.clone(),
            version: Some(request.version.clone()),
            chain_type: Some(request.chain_type.clone()),
            owner_id: Some(request.owner_id.clone()),
            rules,
        };
        self.seed_policy(policy.clone());
        Ok(policy)
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Policy, CustodyError> {
        self.record(Op::GetPolicy)?;
        self.policy(policy_id).ok_or_else(not_found)
    }

    async fn delete_policy(
        &self,
        policy_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        self.record(Op::DeletePolicy)?;
        let owner = self.policy_owner(policy_id)?;
        self.check_owner(&owner, authorization)?;
        self.policies.lock().unwrap().remove(policy_id);
        Ok(())
    }

    async fn create_rule(
        &self,
        policy_id: &str,
        rule: &PolicyRule,
        authorization: &AuthorizationKey,
    ) -> Result<RuleRef, CustodyError> {
        self.record(Op::CreateRule)?;
        let owner = self.policy_owner(policy_id)?;
        self.check_owner(&owner, authorization)?;

        let id = self.id("rule");
        let mut policies = self.policies.lock().unwrap();
        let policy = policies.get_mut(policy_id).ok_or_else(not_found)?;
        if *self.dropped_rule.lock().unwrap() != Some(self.count(Op::CreateRule)) {
            policy.rules.push(PolicyRule {
                id: Some(id.clone()),
                ..rule.clone()
            });
        }
        Ok(RuleRef {
            id,
            name: rule.name.clone(),
        })
    }

    async fn delete_rule(
        &self,
        policy_id: &str,
        rule_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        self.record(Op::DeleteRule)?;
        let owner = self.policy_owner(policy_id)?;
        self.check_owner(&owner, authorization)?;

        let mut policies = self.policies.lock().unwrap();
        let policy = policies.get_mut(policy_id).ok_or_else(not_found)?;
        let before = policy.rules.len();
        policy.rules.retain(|r| r.id.as_deref() != Some(rule_id));
        if policy.rules.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn create_wallet(&self, request: &CreateWallet) -> Result<Wallet, CustodyError> {
        self.record(Op::CreateWallet)?;
        let id = self.id("wallet");
        let address = format!("0x{}00000000", uuid::Uuid::new_v4().simple());
        let wallet = Wallet {
            id: id.clone(),
            address,
            chain_type: Some(request.chain_type.clone()),
        };
        self.wallets.lock().unwrap().insert(
            id,
            MockWallet {
                wallet: wallet.clone(),
                owner_id: request.owner_id.clone(),
                additional_signers: Vec::new(),
            },
        );
        Ok(wallet)
    }

    async fn update_wallet_signers(
        &self,
        wallet_id: &str,
        signers: &[AdditionalSigner],
        authorization: &AuthorizationKey,
    ) -> Result<Wallet, CustodyError> {
        self.record(Op::UpdateWalletSigners)?;
        let owner = self
            .wallet(wallet_id)
            .map(|w| w.owner_id)
            .ok_or_else(not_found)?;
        self.check_owner(&owner, authorization)?;

        let mut wallets = self.wallets.lock().unwrap();
        let entry = wallets.get_mut(wallet_id).ok_or_else(not_found)?;
        entry.additional_signers = signers.to_vec();
        Ok(entry.wallet.clone())
    }

    async fn forward_rpc(
        &self,
        wallet_id: &str,
        authorization_signature: &str,
        body: &[u8],
    ) -> Result<UpstreamResponse, CustodyError> {
        self.record(Op::ForwardRpc)?;
        if *self.rpc_unreachable.lock().unwrap() {
            return Err(CustodyError::Transport("connection refused".to_string()));
        }
        self.forwarded.lock().unwrap().push(ForwardedRpc {
            wallet_id: wallet_id.to_string(),
            signature: authorization_signature.to_string(),
            body: body.to_vec(),
        });

        let response = self.rpc_response.lock().unwrap().clone();
        Ok(response.unwrap_or_else(|| UpstreamResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: json!({"method": "eth_signTypedData_v4", "data": {"signature": MOCK_SIGNATURE, "encoding": "hex"}})
                .to_string()
                .into_bytes(),
        }))
    }
}
