// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

pub const SERVICE_NAME: &str = "vault-gateway";

/// Liveness response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Service descriptor served at `/`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub description: String,
    pub endpoints: ServiceEndpoints,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceEndpoints {
    pub rpc: String,
    pub health: String,
}

/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/v1/vault/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service descriptor", body = ServiceInfo)
    )
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Stateless proxy for Privy API".to_string(),
        endpoints: ServiceEndpoints {
            rpc: "POST /v1/vault/{walletId}/rpc".to_string(),
            health: "GET /v1/vault/health".to_string(),
        },
    })
}
