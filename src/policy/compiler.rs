// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy rule compiler.
//!
//! Turns a withdrawal whitelist into the ordered rule list installed on a
//! vault's override policy. Two strategies exist:
//!
//! | Strategy | Rules (first match wins) |
//! |----------|--------------------------|
//! | `allowlist-first` | allow whitelisted withdrawals, deny zero-`verifyingContract` domains, allow remaining typed data, deny everything |
//! | `minimal-allowlist` | allow `Agent` actions for the configured network, allow whitelisted withdrawals; unmatched requests fall through to the default deny |
//!
//! The schemas embedded in message conditions must be identical to what the
//! signing SDK emits. A schema that differs in any field name, type or order
//! never matches, and the request is silently denied.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{hex, Address};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::types::{
    Condition, ConditionOperator, PolicyRule, RuleAction, TypedDataField, TypedDataSchema,
    TypedDataTypes, ANY_METHOD, SIGN_TYPED_DATA_METHOD,
};
use super::whitelist::Whitelist;
use crate::auth::canonicalize;

/// Display name of every policy the gateway creates.
pub const POLICY_NAME: &str = "Hyperliquid Trading + Whitelisted Withdrawals";

/// Policy schema version understood by the authority.
pub const POLICY_VERSION: &str = "1.0";

/// Chain family all vaults are created on.
pub const CHAIN_TYPE: &str = "ethereum";

/// `current_unix_timestamp lt` this value holds until 2100-01-01.
pub const ALWAYS_TRUE_TIMESTAMP: &str = "4102444800";

/// Primary type of trading (L1 action) signatures.
pub const AGENT_PRIMARY_TYPE: &str = "Agent";

/// Primary type of user-signed withdrawals.
pub const WITHDRAW_PRIMARY_TYPE: &str = "HyperliquidTransaction:Withdraw";

pub const RULE_ALLOW_AGENT: &str = "Allow L1 Actions (Agent)";
pub const RULE_ALLOW_WITHDRAWALS: &str = "Allow Whitelisted Withdrawals";
pub const RULE_DENY_SIGN_TRANSACTION: &str = "Deny All HyperliquidSignTransaction";
pub const RULE_ALLOW_TRADING: &str = "Allow Trading Operations";
pub const RULE_DENY_OTHER: &str = "Deny All Other Operations";

/// Named rule-set strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RuleStrategy {
    AllowlistFirst,
    #[default]
    MinimalAllowlist,
}

impl FromStr for RuleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allowlist-first" => Ok(RuleStrategy::AllowlistFirst),
            "minimal-allowlist" => Ok(RuleStrategy::MinimalAllowlist),
            other => Err(format!(
                "unknown policy strategy '{other}' (expected allowlist-first or minimal-allowlist)"
            )),
        }
    }
}

impl fmt::Display for RuleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStrategy::AllowlistFirst => write!(f, "allowlist-first"),
            RuleStrategy::MinimalAllowlist => write!(f, "minimal-allowlist"),
        }
    }
}

/// Hyperliquid network the vault trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HyperliquidNetwork {
    #[default]
    Mainnet,
    Testnet,
}

impl HyperliquidNetwork {
    /// `source` discriminator carried in `Agent` messages.
    pub fn agent_source(&self) -> &'static str {
        match self {
            HyperliquidNetwork::Mainnet => "a",
            HyperliquidNetwork::Testnet => "b",
        }
    }
}

impl FromStr for HyperliquidNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(HyperliquidNetwork::Mainnet),
            "testnet" => Ok(HyperliquidNetwork::Testnet),
            other => Err(format!("unknown network '{other}' (expected mainnet or testnet)")),
        }
    }
}

/// Compiles a whitelist into an ordered rule list.
pub trait RuleCompiler: Send + Sync + fmt::Debug {
    fn strategy(&self) -> RuleStrategy;

    fn compile(&self, whitelist: &Whitelist) -> Vec<PolicyRule>;
}

/// Build the compiler for a configured strategy.
pub fn compiler_for(strategy: RuleStrategy, network: HyperliquidNetwork) -> Arc<dyn RuleCompiler> {
    match strategy {
        RuleStrategy::AllowlistFirst => Arc::new(AllowlistFirst),
        RuleStrategy::MinimalAllowlist => Arc::new(MinimalAllowlist { network }),
    }
}

/// Allow whitelisted withdrawals, deny other sign-transaction domains,
/// allow remaining typed data, deny everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowlistFirst;

impl RuleCompiler for AllowlistFirst {
    fn strategy(&self) -> RuleStrategy {
        RuleStrategy::AllowlistFirst
    }

    fn compile(&self, whitelist: &Whitelist) -> Vec<PolicyRule> {
        vec![
            whitelisted_withdrawals_rule(whitelist),
            PolicyRule {
                id: None,
                name: RULE_DENY_SIGN_TRANSACTION.to_string(),
                method: SIGN_TYPED_DATA_METHOD.to_string(),
                conditions: vec![Condition::EthereumTypedDataDomain {
                    field: "verifyingContract".to_string(),
                    operator: ConditionOperator::Eq,
                    value: zero_address().as_str().into(),
                }],
                action: RuleAction::Deny,
            },
            PolicyRule {
                id: None,
                name: RULE_ALLOW_TRADING.to_string(),
                method: SIGN_TYPED_DATA_METHOD.to_string(),
                conditions: vec![always_true()],
                action: RuleAction::Allow,
            },
            PolicyRule {
                id: None,
                name: RULE_DENY_OTHER.to_string(),
                method: ANY_METHOD.to_string(),
                conditions: vec![always_true()],
                action: RuleAction::Deny,
            },
        ]
    }
}

/// Allow `Agent` actions and whitelisted withdrawals only.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalAllowlist {
    pub network: HyperliquidNetwork,
}

impl RuleCompiler for MinimalAllowlist {
    fn strategy(&self) -> RuleStrategy {
        RuleStrategy::MinimalAllowlist
    }

    fn compile(&self, whitelist: &Whitelist) -> Vec<PolicyRule> {
        vec![
            PolicyRule {
                id: None,
                name: RULE_ALLOW_AGENT.to_string(),
                method: SIGN_TYPED_DATA_METHOD.to_string(),
                conditions: vec![Condition::EthereumTypedDataMessage {
                    typed_data: agent_schema(),
                    field: "source".to_string(),
                    operator: ConditionOperator::Eq,
                    value: self.network.agent_source().into(),
                }],
                action: RuleAction::Allow,
            },
            whitelisted_withdrawals_rule(whitelist),
        ]
    }
}

fn whitelisted_withdrawals_rule(whitelist: &Whitelist) -> PolicyRule {
    PolicyRule {
        id: None,
        name: RULE_ALLOW_WITHDRAWALS.to_string(),
        method: SIGN_TYPED_DATA_METHOD.to_string(),
        conditions: vec![Condition::EthereumTypedDataMessage {
            typed_data: withdraw_schema(),
            field: "destination".to_string(),
            operator: ConditionOperator::In,
            value: whitelist.to_vec().into(),
        }],
        action: RuleAction::Allow,
    }
}

fn always_true() -> Condition {
    Condition::System {
        field: "current_unix_timestamp".to_string(),
        operator: ConditionOperator::Lt,
        value: ALWAYS_TRUE_TIMESTAMP.into(),
    }
}

/// Lowercase hex zero address, the `verifyingContract` of sign-transaction domains.
pub fn zero_address() -> String {
    format!("{:#x}", Address::ZERO)
}

/// `EIP712Domain` fields, in the order signing SDKs declare them.
pub fn eip712_domain_fields() -> Vec<TypedDataField> {
    vec![
        TypedDataField::new("name", "string"),
        TypedDataField::new("version", "string"),
        TypedDataField::new("chainId", "uint256"),
        TypedDataField::new("verifyingContract", "address"),
    ]
}

/// Schema of L1 action (`Agent`) signatures.
pub fn agent_schema() -> TypedDataSchema {
    TypedDataSchema {
        types: TypedDataTypes(vec![
            ("EIP712Domain".to_string(), eip712_domain_fields()),
            (
                AGENT_PRIMARY_TYPE.to_string(),
                vec![
                    TypedDataField::new("source", "string"),
                    TypedDataField::new("connectionId", "bytes32"),
                ],
            ),
        ]),
        primary_type: AGENT_PRIMARY_TYPE.to_string(),
    }
}

/// Schema of user-signed withdrawals.
pub fn withdraw_schema() -> TypedDataSchema {
    TypedDataSchema {
        types: TypedDataTypes(vec![
            ("EIP712Domain".to_string(), eip712_domain_fields()),
            (
                WITHDRAW_PRIMARY_TYPE.to_string(),
                vec![
                    TypedDataField::new("hyperliquidChain", "string"),
                    TypedDataField::new("destination", "string"),
                    TypedDataField::new("amount", "string"),
                    TypedDataField::new("time", "uint64"),
                ],
            ),
        ]),
        primary_type: WITHDRAW_PRIMARY_TYPE.to_string(),
    }
}

/// SHA-256 over the canonical JSON of a rule list, ignoring rule ids.
///
/// Used to check an installed rule set against a freshly compiled one.
pub fn rules_fingerprint(rules: &[PolicyRule]) -> Result<String, serde_json::Error> {
    let stripped: Vec<PolicyRule> = rules.iter().map(PolicyRule::without_id).collect();
    let value = serde_json::to_value(&stripped)?;
    let digest = Sha256::digest(canonicalize(&value).as_bytes());
    Ok(hex::encode(digest))
}
