// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    policy::{RuleRef, RuleStrategy},
    state::AppState,
    storage::{GatewayCredential, VaultSummary},
    vault::{FieldErrors, OperatorConfig},
};

pub mod health;
pub mod rpc;
pub mod vault;

pub fn router(state: AppState) -> Router {
    let vault_routes = Router::new()
        .route("/health", get(health::health))
        .route("/create", post(vault::create_vault))
        .route("/list", get(vault::list_vaults))
        .route("/{wallet_id}/biconomy-config", get(vault::biconomy_config))
        .route("/{wallet_id}/admin/update-policy", post(vault::update_policy))
        .route("/{wallet_id}/rpc", post(rpc::relay_rpc))
        .with_state(state);

    Router::new()
        .route("/", get(health::root))
        .nest("/v1/vault", vault_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::root,
        health::health,
        vault::create_vault,
        vault::list_vaults,
        vault::biconomy_config,
        vault::update_policy,
        rpc::relay_rpc
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ServiceInfo,
            health::ServiceEndpoints,
            vault::CreateVaultRequest,
            vault::CreateVaultResponse,
            vault::VaultListResponse,
            vault::UpdatePolicyResponse,
            OperatorConfig,
            VaultSummary,
            GatewayCredential,
            RuleRef,
            RuleStrategy,
            FieldErrors
        )
    ),
    tags(
        (name = "Health", description = "Liveness and service descriptor"),
        (name = "Vault", description = "Vault provisioning and policy management"),
        (name = "Relay", description = "Operator-signed RPC forwarding")
    )
)]
pub struct ApiDoc;


#[cfg(test)]
mod tests {
    use super::testing::test_state;
    use super::*;
    use crate::custody::mock::MockAuthority;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let (state, _temp) = test_state(Arc::new(MockAuthority::new()));
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (status, body) = get_json("/v1/vault/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "ok", "service": "vault-gateway"}));
    }

    #[tokio::test]
    async fn root_describes_endpoints() {
        let (status, body) = get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["endpoints"]["health"], "GET /v1/vault/health");
    }

    #[tokio::test]
    async fn openapi_document_lists_vault_routes() {
        let (status, body) = get_json("/api-doc/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let paths = body["paths"].as_object().unwrap();
        assert!(paths.contains_key("/v1/vault/create"));
        assert!(paths.contains_key("/v1/vault/{wallet_id}/rpc"));
    }
}
