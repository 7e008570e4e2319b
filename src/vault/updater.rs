// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy rule replacement.
//!
//! Replaces every rule of a vault's policy with a freshly compiled set,
//! authorized by the Admin key. The policy id never changes.
//!
//! The replacement is not atomic on the custody side: rules are deleted
//! first and recreated afterwards. An interruption in between leaves the
//! policy with fewer rules, which only ever denies more. The error carries
//! enough detail to retry.
//!
//! A policy holding a rule without an id is refused before anything is
//! deleted, since that rule could not be removed. After the new rules are
//! created the policy is read back and its fingerprint compared with the
//! compiled set. Only then is the Gateway record updated with the whitelist
//! and strategy now in force.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::auth::{AuthorizationKey, KeyError};
use crate::custody::{CustodyAuthority, CustodyError};
use crate::policy::{rules_fingerprint, RuleCompiler, RuleRef, Whitelist, WhitelistError};
use crate::storage::{
    validate_wallet_id, CredentialStore, GatewayCredential, StorageError, StoredCredential,
    WalletLocks,
};

/// Result of a successful replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    pub policy_id: String,
    pub rules_updated: usize,
    pub rules_deleted: usize,
    pub rules: Vec<RuleRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePhase {
    LoadPolicy,
    DeleteRules,
    CreateRules,
    VerifyRules,
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePhase::LoadPolicy => write!(f, "load-policy"),
            UpdatePhase::DeleteRules => write!(f, "delete-rules"),
            UpdatePhase::CreateRules => write!(f, "create-rules"),
            UpdatePhase::VerifyRules => write!(f, "verify-rules"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Admin config not found for wallet: {0}")]
    NotFound(String),

    #[error("Another policy update is in progress for wallet: {0}")]
    Busy(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Stored admin key is unusable: {0}")]
    Key(#[from] KeyError),

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error("Failed to fingerprint rules: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("Policy {policy_id} has a rule without an id ('{rule}'); it cannot be replaced")]
    UnidentifiedRule { policy_id: String, rule: String },

    #[error("Policy {policy_id} holds {installed} rules that differ from the {expected} compiled rules")]
    RuleMismatch {
        policy_id: String,
        expected: usize,
        installed: usize,
    },

    #[error("Policy update failed during {phase} after deleting {deleted} and creating {created} rules: {source}")]
    Custody {
        phase: UpdatePhase,
        deleted: usize,
        created: usize,
        #[source]
        source: CustodyError,
    },
}

/// Replaces policy rules, one writer per wallet.
#[derive(Clone)]
pub struct PolicyUpdater {
    authority: Arc<dyn CustodyAuthority>,
    store: Arc<dyn CredentialStore>,
    compiler: Arc<dyn RuleCompiler>,
    locks: WalletLocks,
    env_whitelist: Option<Whitelist>,
}

impl PolicyUpdater {
    pub fn new(
        authority: Arc<dyn CustodyAuthority>,
        store: Arc<dyn CredentialStore>,
        compiler: Arc<dyn RuleCompiler>,
        locks: WalletLocks,
        env_whitelist: Option<Whitelist>,
    ) -> Self {
        Self {
            authority,
            store,
            compiler,
            locks,
            env_whitelist,
        }
    }

    pub fn locks(&self) -> &WalletLocks {
        &self.locks
    }

    /// Whitelist precedence: explicit request, configured whitelist, the
    /// snapshot stored at creation, then the built-in default.
    fn resolve_whitelist(
        &self,
        gateway: Option<&GatewayCredential>,
        explicit: Option<Whitelist>,
    ) -> Result<Whitelist, UpdateError> {
        if let Some(whitelist) = explicit {
            return Ok(whitelist);
        }
        if let Some(whitelist) = &self.env_whitelist {
            return Ok(whitelist.clone());
        }
        match gateway {
            Some(record) if !record.withdraw_whitelist.is_empty() => {
                Ok(Whitelist::new(&record.withdraw_whitelist)?)
            }
            _ => Ok(Whitelist::default_destination()),
        }
    }

    pub async fn update_policy(
        &self,
        wallet_id: &str,
        whitelist: Option<Whitelist>,
    ) -> Result<PolicyUpdate, UpdateError> {
        validate_wallet_id(wallet_id)?;
        let admin = self
            .store
            .admin(wallet_id)?
            .ok_or_else(|| UpdateError::NotFound(wallet_id.to_string()))?;

        let _guard = self
            .locks
            .try_acquire(wallet_id)
            .ok_or_else(|| UpdateError::Busy(wallet_id.to_string()))?;

        let admin_key = AuthorizationKey::parse(&admin.admin_private_key)?;
        let gateway = self.store.gateway(wallet_id)?;
        let whitelist = self.resolve_whitelist(gateway.as_ref(), whitelist)?;
        let rules = self.compiler.compile(&whitelist);
        let expected = rules_fingerprint(&rules)?;
        let policy_id = admin.policy_id;

        info!(
            wallet_id = %wallet_id,
            policy_id = %policy_id,
            destinations = whitelist.addresses().len(),
            "Replacing policy rules"
        );

        let policy = self
            .authority
            .get_policy(&policy_id)
            .await
            .map_err(|source| UpdateError::Custody {
                phase: UpdatePhase::LoadPolicy,
                deleted: 0,
                created: 0,
                source,
            })?;

        let mut rule_ids = Vec::with_capacity(policy.rules.len());
        for rule in &policy.rules {
            match rule.id.as_deref() {
                Some(rule_id) => rule_ids.push(rule_id),
                None => {
                    warn!(policy_id = %policy_id, rule = %rule.name, "Refusing to replace a rule without id");
                    return Err(UpdateError::UnidentifiedRule {
                        policy_id,
                        rule: rule.name.clone(),
                    });
                }
            }
        }

        let mut deleted = 0;
        for rule_id in rule_ids {
            if let Err(source) = self
                .authority
                .delete_rule(&policy_id, rule_id, &admin_key)
                .await
            {
                if deleted > 0 {
                    error!(policy_id = %policy_id, deleted, error = %source, "Policy left partially cleared");
                }
                return Err(UpdateError::Custody {
                    phase: UpdatePhase::DeleteRules,
                    deleted,
                    created: 0,
                    source,
                });
            }
            deleted += 1;
        }

        let mut created = Vec::with_capacity(rules.len());
        for rule in &rules {
            match self.authority.create_rule(&policy_id, rule, &admin_key).await {
                Ok(rule_ref) => created.push(rule_ref),
                Err(source) => {
                    error!(
                        policy_id = %policy_id,
                        deleted,
                        created = created.len(),
                        error = %source,
                        "Policy left with an incomplete rule set"
                    );
                    return Err(UpdateError::Custody {
                        phase: UpdatePhase::CreateRules,
                        deleted,
                        created: created.len(),
                        source,
                    });
                }
            }
        }

        let installed = self
            .authority
            .get_policy(&policy_id)
            .await
            .map_err(|source| UpdateError::Custody {
                phase: UpdatePhase::VerifyRules,
                deleted,
                created: created.len(),
                source,
            })?;
        if rules_fingerprint(&installed.rules)? != expected {
            error!(
                policy_id = %policy_id,
                expected = rules.len(),
                installed = installed.rules.len(),
                "Installed rules differ from the compiled set"
            );
            return Err(UpdateError::RuleMismatch {
                policy_id,
                expected: rules.len(),
                installed: installed.rules.len(),
            });
        }
        info!(policy_id = %policy_id, deleted, created = created.len(), "Policy rules replaced");

        if let Some(mut record) = gateway {
            record.withdraw_whitelist = whitelist.to_vec();
            record.rule_strategy = self.compiler.strategy();
            if let Err(e) = self.store.put(&StoredCredential::Gateway(record)) {
                error!(wallet_id = %wallet_id, error = %e, "Rules replaced but the gateway record was not updated");
                return Err(e.into());
            }
        }

        Ok(PolicyUpdate {
            policy_id,
            rules_updated: created.len(),
            rules_deleted: deleted,
            rules: created,
        })
    }
}
