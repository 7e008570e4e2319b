// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody authority request and response shapes.

use serde::{Deserialize, Serialize};

use crate::auth::KeyError;
use crate::policy::PolicyRule;

/// Request body for `POST /v1/key_quorums`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateKeyQuorum {
    pub public_keys: Vec<String>,
    pub authorization_threshold: u32,
    pub display_name: String,
}

impl CreateKeyQuorum {
    /// A 1-of-1 quorum around a single public key.
    pub fn single(public_key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            public_keys: vec![public_key.into()],
            authorization_threshold: 1,
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyQuorum {
    pub id: String,
    #[serde(default)]
    pub public_keys: Vec<String>,
    #[serde(default)]
    pub authorization_threshold: Option<u32>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request body for `POST /v1/policies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePolicy {
    pub version: String,
    pub name: String,
    pub chain_type: String,
    pub owner_id: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub chain_type: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Request body for `POST /v1/wallets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateWallet {
    pub chain_type: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub chain_type: Option<String>,
}

/// A constrained signer attached to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalSigner {
    pub signer_id: String,
    pub override_policy_ids: Vec<String>,
}

/// Request body for `PATCH /v1/wallets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateWallet {
    pub additional_signers: Vec<AdditionalSigner>,
}

/// Raw upstream answer, passed through untouched by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// The authority could not be reached
    #[error("custody authority unreachable: {0}")]
    Transport(String),

    /// The authority answered with a non-success status
    #[error("custody authority returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The authority answered 2xx with an unexpected payload
    #[error("custody authority response was invalid: {0}")]
    InvalidResponse(String),

    /// The authorization signature could not be produced
    #[error("failed to sign custody request: {0}")]
    Signing(#[from] KeyError),

    /// Client construction failed
    #[error("custody client configuration error: {0}")]
    Client(String),
}

impl CustodyError {
    /// Upstream status, when the authority answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CustodyError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CustodyError::Transport(_))
    }
}
