// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RPC clients for the two key holders that sign requests.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{rpc_url, sign_typed_data_body, signature_from_response, RpcFailure};
use crate::auth::{AuthorizationKey, SignatureInput};
use crate::custody::privy::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use crate::custody::{CustodyAuthority, PrivyClient};
use crate::storage::AdminCredential;
use crate::vault::{OperatorConfig, SIGNATURE_HEADER};

/// Signs locally, sends through the Gateway relay.
pub struct OperatorClient {
    config: OperatorConfig,
    key: AuthorizationKey,
    http: Client,
    authority_base: String,
}

impl std::fmt::Debug for OperatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorClient")
            .field("gateway_url", &self.config.gateway_url)
            .field("wallet_id", &self.config.wallet_id)
            .finish_non_exhaustive()
    }
}

impl OperatorClient {
    pub fn new(config: OperatorConfig) -> Result<Self, RpcFailure> {
        let key = AuthorizationKey::parse(&config.signer_private_key)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RpcFailure::Client(e.to_string()))?;
        Ok(Self {
            config,
            key,
            http,
            authority_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Authority base URL the signature commits to; must match where the
    /// Gateway forwards.
    pub fn with_authority_base(mut self, authority_base: impl Into<String>) -> Self {
        self.authority_base = authority_base.into();
        self
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// `x-privy-authorization-signature` value for `body`.
    pub fn sign_request(&self, body: &Value) -> String {
        SignatureInput::post(
            &self.config.privy_app_id,
            rpc_url(&self.authority_base, &self.config.wallet_id),
            body.clone(),
        )
        .sign(&self.key)
    }

    /// Send a signed RPC body through the Gateway; returns `data.signature`.
    pub async fn rpc(&self, body: &Value) -> Result<String, RpcFailure> {
        let signature = self.sign_request(body);
        let url = format!(
            "{}/v1/vault/{}/rpc",
            self.config.gateway_url.trim_end_matches('/'),
            self.config.wallet_id
        );
        debug!(wallet_id = %self.config.wallet_id, "Sending signed RPC through gateway");

        let response = self
            .http
            .post(&url)
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| RpcFailure::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcFailure::Unreachable(e.to_string()))?;
        signature_from_response(status, &bytes)
    }

    /// Ask for an EIP-712 signature over `typed_data` (viem layout accepted).
    pub async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, RpcFailure> {
        self.rpc(&sign_typed_data_body(typed_data)).await
    }
}

/// Admin access to the authority with app credentials; bypasses the Gateway
/// and the override policy.
#[derive(Debug)]
pub struct AdminClient {
    authority: PrivyClient,
    key: AuthorizationKey,
    wallet_id: String,
}

impl AdminClient {
    pub fn new(authority: PrivyClient, admin: &AdminCredential) -> Result<Self, RpcFailure> {
        Ok(Self {
            key: AuthorizationKey::parse(&admin.admin_private_key)?,
            wallet_id: admin.wallet_id.clone(),
            authority,
        })
    }

    pub async fn rpc(&self, body: &Value) -> Result<String, RpcFailure> {
        let signature = SignatureInput::post(
            self.authority.app_id(),
            rpc_url(self.authority.api_base(), &self.wallet_id),
            body.clone(),
        )
        .sign(&self.key);

        let response = self
            .authority
            .forward_rpc(&self.wallet_id, &signature, body.to_string().as_bytes())
            .await
            .map_err(|e| RpcFailure::Unreachable(e.to_string()))?;
        signature_from_response(response.status, &response.body)
    }

    pub async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, RpcFailure> {
        self.rpc(&sign_typed_data_body(typed_data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::spawn_gateway;
    use crate::auth::{generate_p256_keypair, verify_signature, APP_ID_HEADER, AUTHORIZATION_SIGNATURE_HEADER};
    use crate::custody::mock::{MockAuthority, Op, MOCK_APP_ID, MOCK_SIGNATURE};
    use crate::custody::PrivyConfig;
    use crate::operator::signature_input;
    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn agent_typed_data() -> Value {
        json!({
            "domain": {
                "name": "Exchange",
                "version": "1",
                "chainId": 1337,
                "verifyingContract": "0x0000000000000000000000000000000000000000"
            },
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "Agent": [
                    {"name": "source", "type": "string"},
                    {"name": "connectionId", "type": "bytes32"}
                ]
            },
            "primaryType": "Agent",
            "message": {
                "source": "a",
                "connectionId": "0x0000000000000000000000000000000000000000000000000000000000000001"
            }
        })
    }

    #[tokio::test]
    async fn operator_signs_through_gateway() {
        let authority = Arc::new(MockAuthority::new());
        let gateway = spawn_gateway(authority.clone()).await;
        let config = gateway.create_vault().await;
        let public_key = config.signer_public_key.clone();
        let wallet_id = config.wallet_id.clone();

        let client = OperatorClient::new(config).unwrap();
        let signature = client.sign_typed_data(&agent_typed_data()).await.unwrap();
        assert_eq!(signature, MOCK_SIGNATURE);

        assert_eq!(authority.count(Op::ForwardRpc), 1);
        let forwarded = authority.forwarded.lock().unwrap()[0].clone();
        assert_eq!(forwarded.wallet_id, wallet_id);
        let body: Value = serde_json::from_slice(&forwarded.body).unwrap();
        assert_eq!(body["params"]["typed_data"]["primary_type"], "Agent");

        let input = signature_input(MOCK_APP_ID, &wallet_id, body);
        verify_signature(&public_key, &input, &forwarded.signature).unwrap();
    }

    #[tokio::test]
    async fn signature_commits_to_the_authority_base() {
        let authority = Arc::new(MockAuthority::new());
        let gateway = spawn_gateway(authority).await;
        let config = gateway.create_vault().await;
        let public_key = config.signer_public_key.clone();
        let wallet_id = config.wallet_id.clone();
        let body = json!({"method": "eth_signTypedData_v4", "params": {}});

        let client = OperatorClient::new(config)
            .unwrap()
            .with_authority_base("http://127.0.0.1:9999");
        let signature = client.sign_request(&body);

        let staging = SignatureInput::post(
            MOCK_APP_ID,
            rpc_url("http://127.0.0.1:9999", &wallet_id),
            body.clone(),
        );
        verify_signature(&public_key, &staging, &signature).unwrap();

        let production = signature_input(MOCK_APP_ID, &wallet_id, body);
        assert!(verify_signature(&public_key, &production, &signature).is_err());
    }

    #[tokio::test]
    async fn authority_denial_is_reported_as_denied() {
        let denial = json!({"error": "Policy violation"});
        let authority = Arc::new(MockAuthority::new().responding(403, denial));
        let gateway = spawn_gateway(authority.clone()).await;
        let config = gateway.create_vault().await;

        let failure = OperatorClient::new(config)
            .unwrap()
            .sign_typed_data(&agent_typed_data())
            .await
            .unwrap_err();
        match failure {
            RpcFailure::Denied { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body["error"], "Policy violation");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dead_gateway_is_reported_as_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pair = generate_p256_keypair().unwrap();
        let config = OperatorConfig {
            gateway_url: format!("http://{addr}"),
            privy_app_id: "app".to_string(),
            wallet_id: "w1".to_string(),
            wallet_address: "0x0".to_string(),
            signer_private_key: pair.private_key,
            signer_public_key: pair.public_key,
            key_quorum_id: "kq".to_string(),
            policy_id: "p".to_string(),
            withdraw_whitelist: vec![],
        };
        let failure = OperatorClient::new(config)
            .unwrap()
            .sign_typed_data(&agent_typed_data())
            .await
            .unwrap_err();
        assert!(failure.is_unreachable());
    }

    #[tokio::test]
    async fn admin_calls_authority_directly_with_app_credentials() {
        let pair = generate_p256_keypair().unwrap();
        let public_key = pair.public_key.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let signed_url = format!("{base}/v1/wallets/w-admin/rpc");

        let app = Router::new().route(
            "/v1/wallets/{wallet_id}/rpc",
            post(move |Path(wallet_id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                let public_key = public_key.clone();
                let signed_url = signed_url.clone();
                async move {
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string()
                    };
                    let input = SignatureInput::post(header(APP_ID_HEADER), signed_url, body);
                    let verified = wallet_id == "w-admin"
                        && header("authorization").starts_with("Basic ")
                        && verify_signature(&public_key, &input, &header(AUTHORIZATION_SIGNATURE_HEADER)).is_ok();
                    if verified {
                        (axum::http::StatusCode::OK, Json(json!({"data": {"signature": "0xadmin"}})))
                    } else {
                        (axum::http::StatusCode::UNAUTHORIZED, Json(json!({"error": "bad signature"})))
                    }
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let privy = PrivyClient::new(PrivyConfig {
            api_base: base,
            app_id: "app-1".to_string(),
            app_secret: "secret".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let admin = AdminCredential {
            wallet_id: "w-admin".to_string(),
            admin_private_key: pair.private_key,
            admin_public_key: pair.public_key,
            key_quorum_id: "kq".to_string(),
            policy_id: "p".to_string(),
            created_at: Utc::now(),
        };

        let client = AdminClient::new(privy, &admin).unwrap();
        assert_eq!(client.sign_typed_data(&agent_typed_data()).await.unwrap(), "0xadmin");
    }

    #[test]
    fn malformed_operator_key_is_rejected() {
        let config = OperatorConfig {
            gateway_url: "http://localhost:3000".to_string(),
            privy_app_id: "app".to_string(),
            wallet_id: "w1".to_string(),
            wallet_address: "0x0".to_string(),
            signer_private_key: "not-a-key".to_string(),
            signer_public_key: String::new(),
            key_quorum_id: "kq".to_string(),
            policy_id: "p".to_string(),
            withdraw_whitelist: vec![],
        };
        assert!(matches!(OperatorClient::new(config), Err(RpcFailure::Signing(_))));
    }
}
