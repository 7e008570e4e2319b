// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault management endpoints.
//!
//! These endpoints are meant for the operator of the gateway itself and
//! carry no authentication; deploy them behind a private network.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    policy::whitelist::{is_eth_address, INVALID_ADDRESS_MESSAGE},
    policy::{RuleRef, Whitelist},
    state::AppState,
    storage::{validate_wallet_id, GatewayCredential, VaultSummary},
    vault::{relay::json_type_name, FieldErrors, OperatorConfig},
};

pub const CREATED_MESSAGE: &str =
    "Vault created successfully. Operator config contains all credentials needed to use the vault.";
pub const POLICY_UPDATED_MESSAGE: &str = "Policy updated successfully";

const WHITELIST_FIELD: &str = "withdrawWhitelist";

/// Request to create a vault.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVaultRequest {
    /// Withdrawal destinations; defaults to the built-in destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdraw_whitelist: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVaultResponse {
    pub success: bool,
    pub operator_config: OperatorConfig,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VaultListResponse {
    pub vaults: Vec<VaultSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePolicyResponse {
    pub success: bool,
    pub policy_id: String,
    pub rules_updated: usize,
    pub rules_deleted: usize,
    pub rules: Vec<RuleRef>,
    pub message: String,
}

/// Lenient body parse: anything that is not JSON counts as `{}`.
fn lenient_json(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Default::default()))
}

/// Validate the optional `withdrawWhitelist` field of a request body.
pub fn parse_whitelist_request(body: &Value) -> Result<Option<Whitelist>, FieldErrors> {
    let object = match body {
        Value::Object(object) => object,
        other => {
            return Err(FieldErrors::form(format!(
                "Expected object, received {}",
                json_type_name(other)
            )))
        }
    };

    let items = match object.get(WHITELIST_FIELD) {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(FieldErrors::field(
                WHITELIST_FIELD,
                format!("Expected array, received {}", json_type_name(other)),
            ))
        }
    };

    let mut errors = FieldErrors::default();
    let mut addresses = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) if is_eth_address(s) => addresses.push(s.as_str()),
            Value::String(_) => errors.push(WHITELIST_FIELD, INVALID_ADDRESS_MESSAGE),
            other => errors.push(
                WHITELIST_FIELD,
                format!("Expected string, received {}", json_type_name(other)),
            ),
        }
    }
    if addresses.is_empty() && errors.is_empty() {
        errors.push(WHITELIST_FIELD, "Array must contain at least 1 element(s)");
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Whitelist::new(addresses)
        .map(Some)
        .map_err(|e| FieldErrors::field(WHITELIST_FIELD, e.to_string()))
}

/// Create a new vault.
///
/// Generates Admin, Operator and Gateway keys, registers their quorums,
/// creates the policy and the wallet, and returns the Operator bundle. The
/// Operator private key is not stored anywhere; this response is its only
/// copy.
#[utoipa::path(
    post,
    path = "/v1/vault/create",
    tag = "Vault",
    request_body = CreateVaultRequest,
    responses(
        (status = 200, description = "Vault created", body = CreateVaultResponse),
        (status = 400, description = "Invalid whitelist", body = FieldErrors),
        (status = 500, description = "Provisioning failed")
    )
)]
pub async fn create_vault(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreateVaultResponse>, ApiError> {
    let whitelist = parse_whitelist_request(&lenient_json(&body))
        .map_err(|fields| ApiError::validation(fields).flagged())?;

    let operator_config = state.provisioner.create_vault(whitelist).await.map_err(|e| {
        error!(step = %e.step, rollback = ?e.rollback, error = %e, "Vault creation error");
        ApiError::from(e)
    })?;

    Ok(Json(CreateVaultResponse {
        success: true,
        operator_config,
        message: CREATED_MESSAGE.to_string(),
    }))
}

/// List all vaults, oldest first.
#[utoipa::path(
    get,
    path = "/v1/vault/list",
    tag = "Vault",
    responses(
        (status = 200, description = "Vault summaries", body = VaultListResponse),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn list_vaults(State(state): State<AppState>) -> Result<Json<VaultListResponse>, ApiError> {
    let vaults = state.store.vault_summaries()?;
    Ok(Json(VaultListResponse { vaults }))
}

/// Gateway signer record of a vault.
#[utoipa::path(
    get,
    path = "/v1/vault/{wallet_id}/biconomy-config",
    tag = "Vault",
    params(
        ("wallet_id" = String, Path, description = "Wallet ID")
    ),
    responses(
        (status = 200, description = "Gateway signer record", body = GatewayCredential),
        (status = 404, description = "Vault not found")
    )
)]
pub async fn biconomy_config(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<GatewayCredential>, ApiError> {
    if validate_wallet_id(&wallet_id).is_err() {
        return Err(ApiError::not_found("Vault not found"));
    }
    state
        .store
        .gateway(&wallet_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Vault not found"))
}

/// Replace the rules of a vault policy.
///
/// Uses the Admin key. The policy id is unchanged. Without a body the
/// configured whitelist (or the one stored at creation) is used.
#[utoipa::path(
    post,
    path = "/v1/vault/{wallet_id}/admin/update-policy",
    tag = "Vault",
    params(
        ("wallet_id" = String, Path, description = "Wallet ID")
    ),
    request_body(content = CreateVaultRequest, description = "Optional replacement whitelist"),
    responses(
        (status = 200, description = "Policy rules replaced", body = UpdatePolicyResponse),
        (status = 400, description = "Invalid whitelist"),
        (status = 404, description = "Vault not found"),
        (status = 409, description = "Another update is in progress"),
        (status = 500, description = "Custody authority failure")
    )
)]
pub async fn update_policy(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdatePolicyResponse>, ApiError> {
    let whitelist = parse_whitelist_request(&lenient_json(&body))
        .map_err(|fields| ApiError::validation(fields).flagged())?;

    let update = state
        .updater
        .update_policy(&wallet_id, whitelist)
        .await
        .map_err(|e| {
            error!(wallet_id = %wallet_id, error = %e, "Policy update error");
            ApiError::from(e)
        })?;

    Ok(Json(UpdatePolicyResponse {
        success: true,
        policy_id: update.policy_id,
        rules_updated: update.rules_updated,
        rules_deleted: update.rules_deleted,
        rules: update.rules,
        message: POLICY_UPDATED_MESSAGE.to_string(),
    }))
}
