// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    state::AppState,
    vault::{FieldErrors, RelayError, SIGNATURE_HEADER},
};

fn error_response(e: RelayError) -> Response {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(e.body())).into_response()
}

/// Relay an Operator-signed RPC request to the custody authority.
///
/// The body must be `{method, params?}` signed by the Operator key over
/// the authority request. The authority's answer is returned unchanged,
/// including policy denials.
#[utoipa::path(
    post,
    path = "/v1/vault/{wallet_id}/rpc",
    tag = "Relay",
    params(
        ("wallet_id" = String, Path, description = "Wallet ID"),
        ("x-privy-authorization-signature" = String, Header, description = "Operator authorization signature")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Authority response, passed through"),
        (status = 400, description = "Missing signature or malformed body", body = FieldErrors),
        (status = 500, description = "Authority unreachable")
    )
)]
pub async fn relay_rpc(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get(SIGNATURE_HEADER).map(HeaderValue::to_str).transpose() {
        Ok(signature) => signature,
        Err(_) => return error_response(RelayError::unreadable_signature()),
    };

    match state.relay.relay(&wallet_id, signature, &body).await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = upstream
                .content_type
                .unwrap_or_else(|| "application/json".to_string());
            (status, [(CONTENT_TYPE, content_type)], Body::from(upstream.body)).into_response()
        }
        Err(e) => error_response(e),
    }
}
