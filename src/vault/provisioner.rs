// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault provisioning.
//!
//! ## Flow
//!
//! 1. Generate one P-256 key pair per role
//! 2. Register a 1-of-1 key quorum per role
//! 3. Compile the rules and create the policy, owned by the Admin quorum
//! 4. Create the wallet, owned by the Admin quorum
//! 5. Attach the Operator and Gateway quorums as additional signers with the
//!    policy as their override policy (Admin-authorized)
//! 6. Persist the Admin then the Gateway credential; return the Operator bundle
//!
//! Every completed step registers a compensation, including each persisted
//! record. When a later step fails the compensations run in reverse,
//! best-effort. Wallets cannot be deleted and are reported as orphaned
//! instead. The Gateway record goes last since it is what lists a vault.
//!
//! Provisioning is not idempotent: two identical calls create two vaults.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::auth::{generate_p256_keypair, AuthorizationKey, KeyError, KeyPair, Role};
use crate::custody::{
    AdditionalSigner, CreateKeyQuorum, CreatePolicy, CreateWallet, CustodyAuthority, CustodyError,
};
use crate::policy::{RuleCompiler, Whitelist, CHAIN_TYPE, POLICY_NAME, POLICY_VERSION};
use crate::storage::{
    AdminCredential, CredentialStore, GatewayCredential, StorageError, StoredCredential,
};

/// Everything an Operator needs to use its vault through the gateway.
///
/// This is the only copy of the Operator private key that ever exists.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    pub gateway_url: String,
    pub privy_app_id: String,
    pub wallet_id: String,
    pub wallet_address: String,
    pub signer_private_key: String,
    pub signer_public_key: String,
    pub key_quorum_id: String,
    pub policy_id: String,
    pub withdraw_whitelist: Vec<String>,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("gateway_url", &self.gateway_url)
            .field("privy_app_id", &self.privy_app_id)
            .field("wallet_id", &self.wallet_id)
            .field("wallet_address", &self.wallet_address)
            .field("signer_private_key", &"<redacted>")
            .field("key_quorum_id", &self.key_quorum_id)
            .field("policy_id", &self.policy_id)
            .field("withdraw_whitelist", &self.withdraw_whitelist)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStep {
    GenerateKeys,
    RegisterQuorums,
    CreatePolicy,
    CreateWallet,
    BindSigners,
    PersistCredentials,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::GenerateKeys => "generate-keys",
            ProvisionStep::RegisterQuorums => "register-quorums",
            ProvisionStep::CreatePolicy => "create-policy",
            ProvisionStep::CreateWallet => "create-wallet",
            ProvisionStep::BindSigners => "bind-signers",
            ProvisionStep::PersistCredentials => "persist-credentials",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionCause {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of running compensations after a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    /// Compensations that succeeded
    pub compensated: Vec<String>,
    /// Compensations that failed; these objects still exist remotely
    pub failed: Vec<String>,
    /// Wallet created before the failure; it cannot be deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned_wallet: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("vault provisioning failed at step '{step}': {cause}")]
pub struct ProvisionError {
    pub step: ProvisionStep,
    #[source]
    pub cause: ProvisionCause,
    pub rollback: RollbackReport,
}

enum Compensation {
    DeleteKeyQuorum {
        role: Role,
        quorum_id: String,
        key: AuthorizationKey,
    },
    DeletePolicy {
        policy_id: String,
        admin_key: AuthorizationKey,
    },
    OrphanedWallet {
        wallet_id: String,
    },
    DeleteCredential {
        role: Role,
        wallet_id: String,
    },
}

#[derive(Default)]
struct Saga {
    compensations: Vec<Compensation>,
}

impl Saga {
    fn record(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }

    async fn compensate(self, authority: &dyn CustodyAuthority, store: &dyn CredentialStore) -> RollbackReport {
        let mut report = RollbackReport::default();
        for compensation in self.compensations.into_iter().rev() {
            match compensation {
                Compensation::DeleteKeyQuorum {
                    role,
                    quorum_id,
                    key,
                } => {
                    let label = format!("delete {role} key quorum {quorum_id}");
                    match authority.delete_key_quorum(&quorum_id, &key).await {
                        Ok(()) => report.compensated.push(label),
                        Err(e) => {
                            warn!(quorum_id = %quorum_id, role = %role, error = %e, "Compensation failed");
                            report.failed.push(label);
                        }
                    }
                }
                Compensation::DeletePolicy {
                    policy_id,
                    admin_key,
                } => {
                    let label = format!("delete policy {policy_id}");
                    match authority.delete_policy(&policy_id, &admin_key).await {
                        Ok(()) => report.compensated.push(label),
                        Err(e) => {
                            warn!(policy_id = %policy_id, error = %e, "Compensation failed");
                            report.failed.push(label);
                        }
                    }
                }
                Compensation::OrphanedWallet { wallet_id } => {
                    warn!(wallet_id = %wallet_id, "Wallet cannot be deleted and is left orphaned");
                    report.orphaned_wallet = Some(wallet_id);
                }
                Compensation::DeleteCredential { role, wallet_id } => {
                    let label = format!("delete {role} credential {wallet_id}");
                    match store.delete(role, &wallet_id) {
                        Ok(_) => report.compensated.push(label),
                        Err(e) => {
                            warn!(wallet_id = %wallet_id, role = %role, error = %e, "Compensation failed");
                            report.failed.push(label);
                        }
                    }
                }
            }
        }
        report
    }
}

type StepResult<T> = Result<T, (ProvisionStep, ProvisionCause)>;

fn at<E: Into<ProvisionCause>>(step: ProvisionStep) -> impl FnOnce(E) -> (ProvisionStep, ProvisionCause) {
    move |e| (step, e.into())
}

struct RoleKeys {
    pair: KeyPair,
    key: AuthorizationKey,
}

impl RoleKeys {
    fn generate() -> Result<Self, KeyError> {
        let pair = generate_p256_keypair()?;
        let key = AuthorizationKey::parse(&pair.private_key)?;
        Ok(Self { pair, key })
    }
}

/// Builds three-party vaults on the custody authority.
#[derive(Clone)]
pub struct Provisioner {
    authority: Arc<dyn CustodyAuthority>,
    store: Arc<dyn CredentialStore>,
    compiler: Arc<dyn RuleCompiler>,
    gateway_url: String,
}

impl Provisioner {
    pub fn new(
        authority: Arc<dyn CustodyAuthority>,
        store: Arc<dyn CredentialStore>,
        compiler: Arc<dyn RuleCompiler>,
        gateway_url: impl Into<String>,
    ) -> Self {
        Self {
            authority,
            store,
            compiler,
            gateway_url: gateway_url.into(),
        }
    }

    /// Provision a vault; `None` uses the built-in default destination.
    pub async fn create_vault(&self, whitelist: Option<Whitelist>) -> Result<OperatorConfig, ProvisionError> {
        let whitelist = whitelist.unwrap_or_else(Whitelist::default_destination);
        info!(
            destinations = whitelist.addresses().len(),
            strategy = %self.compiler.strategy(),
            "Creating vault"
        );

        let mut saga = Saga::default();
        match self.run(&whitelist, &mut saga).await {
            Ok(config) => {
                info!(wallet_id = %config.wallet_id, policy_id = %config.policy_id, "Vault created");
                Ok(config)
            }
            Err((step, cause)) => {
                error!(step = %step, error = %cause, "Vault provisioning failed; compensating");
                let rollback = saga
                    .compensate(self.authority.as_ref(), self.store.as_ref())
                    .await;
                Err(ProvisionError {
                    step,
                    cause,
                    rollback,
                })
            }
        }
    }

    async fn run(&self, whitelist: &Whitelist, saga: &mut Saga) -> StepResult<OperatorConfig> {
        let authority = self.authority.as_ref();

        let admin = RoleKeys::generate().map_err(at(ProvisionStep::GenerateKeys))?;
        let operator = RoleKeys::generate().map_err(at(ProvisionStep::GenerateKeys))?;
        let gateway = RoleKeys::generate().map_err(at(ProvisionStep::GenerateKeys))?;
        info!(step = %ProvisionStep::GenerateKeys, "Generated P-256 key pairs");

        let mut quorum_ids = Vec::with_capacity(Role::ALL.len());
        for (role, keys) in [
            (Role::Admin, &admin),
            (Role::Operator, &operator),
            (Role::Gateway, &gateway),
        ] {
            let quorum = authority
                .create_key_quorum(&CreateKeyQuorum::single(
                    keys.pair.public_key.clone(),
                    role.quorum_display_name(),
                ))
                .await
                .map_err(at(ProvisionStep::RegisterQuorums))?;
            info!(step = %ProvisionStep::RegisterQuorums, role = %role, quorum_id = %quorum.id, "Key quorum registered");
            saga.record(Compensation::DeleteKeyQuorum {
                role,
                quorum_id: quorum.id.clone(),
                key: keys.key.clone(),
            });
            quorum_ids.push(quorum.id);
        }
        let [admin_quorum, operator_quorum, gateway_quorum]: [String; 3] = quorum_ids
            .try_into()
            .map_err(|_| {
                (
                    ProvisionStep::RegisterQuorums,
                    ProvisionCause::Custody(CustodyError::InvalidResponse(
                        "expected three key quorums".to_string(),
                    )),
                )
            })?;

        let policy = authority
            .create_policy(&CreatePolicy {
                version: POLICY_VERSION.to_string(),
                name: POLICY_NAME.to_string(),
                chain_type: CHAIN_TYPE.to_string(),
                owner_id: admin_quorum.clone(),
                rules: self.compiler.compile(whitelist),
            })
            .await
            .map_err(at(ProvisionStep::CreatePolicy))?;
        info!(step = %ProvisionStep::CreatePolicy, policy_id = %policy.id, "Policy created");
        saga.record(Compensation::DeletePolicy {
            policy_id: policy.id.clone(),
            admin_key: admin.key.clone(),
        });

        let wallet = authority
            .create_wallet(&CreateWallet {
                chain_type: CHAIN_TYPE.to_string(),
                owner_id: admin_quorum.clone(),
            })
            .await
            .map_err(at(ProvisionStep::CreateWallet))?;
        info!(step = %ProvisionStep::CreateWallet, wallet_id = %wallet.id, address = %wallet.address, "Wallet created");
        saga.record(Compensation::OrphanedWallet {
            wallet_id: wallet.id.clone(),
        });

        // Only the additional signers carry the override policy; the owner stays unconstrained.
        let signers: Vec<AdditionalSigner> = [&operator_quorum, &gateway_quorum]
            .into_iter()
            .map(|quorum_id| AdditionalSigner {
                signer_id: quorum_id.clone(),
                override_policy_ids: vec![policy.id.clone()],
            })
            .collect();
        authority
            .update_wallet_signers(&wallet.id, &signers, &admin.key)
            .await
            .map_err(at(ProvisionStep::BindSigners))?;
        info!(step = %ProvisionStep::BindSigners, wallet_id = %wallet.id, "Operator and Gateway signers attached");

        let created_at = Utc::now();
        let gateway_record = GatewayCredential {
            wallet_id: wallet.id.clone(),
            wallet_address: wallet.address.clone(),
            signer_private_key: gateway.pair.private_key.clone(),
            signer_public_key: gateway.pair.public_key.clone(),
            key_quorum_id: gateway_quorum,
            policy_id: policy.id.clone(),
            withdraw_whitelist: whitelist.to_vec(),
            created_at,
            rule_strategy: self.compiler.strategy(),
        };
        let admin_record = AdminCredential {
            wallet_id: wallet.id.clone(),
            admin_private_key: admin.pair.private_key.clone(),
            admin_public_key: admin.pair.public_key.clone(),
            key_quorum_id: admin_quorum,
            policy_id: policy.id.clone(),
            created_at,
        };
        for record in [
            StoredCredential::Admin(admin_record),
            StoredCredential::Gateway(gateway_record),
        ] {
            self.store
                .put(&record)
                .map_err(at(ProvisionStep::PersistCredentials))?;
            saga.record(Compensation::DeleteCredential {
                role: record.role(),
                wallet_id: wallet.id.clone(),
            });
        }
        info!(step = %ProvisionStep::PersistCredentials, wallet_id = %wallet.id, backend = self.store.backend(), "Credentials persisted");

        Ok(OperatorConfig {
            gateway_url: self.gateway_url.clone(),
            privy_app_id: authority.app_id().to_string(),
            wallet_id: wallet.id,
            wallet_address: wallet.address,
            signer_private_key: operator.pair.private_key,
            signer_public_key: operator.pair.public_key,
            key_quorum_id: operator_quorum,
            policy_id: policy.id,
            withdraw_whitelist: whitelist.to_vec(),
        })
    }
}
