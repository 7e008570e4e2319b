// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault roles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The three parties of a vault.
///
/// ## Role Model
///
/// - `Admin` - Owns the wallet and the policy; never constrained by it
/// - `Operator` - Trading entity, constrained by the override policy
/// - `Gateway` - Relay provider, constrained by the same override policy
///
/// Each role owns exactly one P-256 key pair and one key quorum per vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Wallet and policy owner
    Admin,
    /// Customer trading entity
    Operator,
    /// Stateless relay provider
    Gateway,
}

impl Role {
    /// All roles, in provisioning order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Operator, Role::Gateway];

    /// Display name registered for this role's key quorum.
    pub fn quorum_display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Vault Admin Owner",
            Role::Operator => "Operator Signer",
            Role::Gateway => "Gateway Signer",
        }
    }

    /// Whether this role is bound to the override policy.
    ///
    /// Only additional signers are constrained; binding the owner would
    /// lock the Admin out of its own wallet.
    pub fn is_policy_constrained(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// Whether credentials for this role are kept server-side.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Role::Operator)
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            "gateway" => Some(Role::Gateway),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
            Role::Gateway => write!(f, "gateway"),
        }
    }
}
