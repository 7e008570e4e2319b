// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Operator Side of the Relay Protocol
//!
//! The Operator never talks to the custody authority directly. It signs the
//! exact request the authority will see, then hands body and signature to
//! the Gateway, which adds the app credential and forwards it.
//!
//! ## Signed Document
//!
//! ```text
//! { version: 1, method: "POST", url: "{authority}/v1/wallets/{id}/rpc",
//!   headers: { "privy-app-id": appId }, body }
//! ```
//!
//! - [`client`] - [`OperatorClient`] (through the Gateway) and [`AdminClient`] (direct)
//! - [`bootstrap`] - Vault creation through the Gateway and the local operator config file

pub mod bootstrap;
pub mod client;

use serde_json::{json, Value};

use crate::auth::{KeyError, SignatureInput};
use crate::custody::privy::DEFAULT_API_BASE;
use crate::policy::types::SIGN_TYPED_DATA_METHOD;

pub use bootstrap::{CreateOutcome, CreateVaultError, OperatorConfigFile, VaultBootstrap};
pub use client::{AdminClient, OperatorClient};

/// Authority RPC endpoint for `wallet_id` under `api_base`.
pub fn rpc_url(api_base: &str, wallet_id: &str) -> String {
    format!("{}/v1/wallets/{wallet_id}/rpc", api_base.trim_end_matches('/'))
}

/// Signature input for an RPC call against the production authority.
pub fn signature_input(app_id: &str, wallet_id: &str, body: Value) -> SignatureInput {
    SignatureInput::post(app_id, rpc_url(DEFAULT_API_BASE, wallet_id), body)
}

/// Rename `primaryType` to `primary_type`, leaving every other key alone.
pub fn to_privy_typed_data(typed_data: &Value) -> Value {
    let mut converted = typed_data.clone();
    if let Some(object) = converted.as_object_mut() {
        if let Some(primary_type) = object.remove("primaryType") {
            object.insert("primary_type".to_string(), primary_type);
        }
    }
    converted
}

/// RPC body asking the authority to sign `typed_data`.
pub fn sign_typed_data_body(typed_data: &Value) -> Value {
    json!({
        "method": SIGN_TYPED_DATA_METHOD,
        "params": { "typed_data": to_privy_typed_data(typed_data) },
    })
}

/// Why an RPC call produced no signature.
#[derive(Debug, thiserror::Error)]
pub enum RpcFailure {
    /// The authority (or the Gateway's validation) answered with an error
    #[error("RPC denied with status {status}: {}", denial_reason(.body))]
    Denied { status: u16, body: Value },

    /// Nothing answered
    #[error("RPC endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("No signature returned from Privy")]
    MissingSignature(Value),

    #[error("failed to sign request: {0}")]
    Signing(#[from] KeyError),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl RpcFailure {
    pub fn is_denied(&self) -> bool {
        matches!(self, RpcFailure::Denied { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, RpcFailure::Unreachable(_))
    }
}

/// Most specific human-readable reason in an error body.
pub fn denial_reason(body: &Value) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| body.to_string())
}

/// Interpret an RPC response: `data.signature` on 200, a failure otherwise.
pub fn signature_from_response(status: u16, body: &[u8]) -> Result<String, RpcFailure> {
    let parsed: Value = serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
    if status != 200 {
        return Err(RpcFailure::Denied {
            status,
            body: parsed,
        });
    }
    match parsed.pointer("/data/signature").and_then(Value::as_str) {
        Some(signature) => Ok(signature.to_string()),
        None => Err(RpcFailure::MissingSignature(parsed)),
    }
}
