// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Privy wallet API client.
//!
//! Every request carries the app credential:
//!
//! - `Authorization: Basic base64(appId:appSecret)`
//! - `privy-app-id: <appId>`
//!
//! Owner-authorized requests additionally carry
//! `privy-authorization-signature`, computed over the exact method, URL and
//! body being sent.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{
    AdditionalSigner, CreateKeyQuorum, CreatePolicy, CreateWallet, CustodyError, KeyQuorum,
    Policy, UpdateWallet, UpstreamResponse, Wallet,
};
use super::CustodyAuthority;
use crate::auth::{AuthorizationKey, SignatureInput, APP_ID_HEADER, AUTHORIZATION_SIGNATURE_HEADER};
use crate::policy::{PolicyRule, RuleRef};

pub const DEFAULT_API_BASE: &str = "https://api.privy.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings for [`PrivyClient`].
#[derive(Clone)]
pub struct PrivyConfig {
    pub api_base: String,
    pub app_id: String,
    pub app_secret: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PrivyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivyConfig")
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PrivyClient {
    config: PrivyConfig,
    http: Client,
}

impl PrivyClient {
    pub fn new(config: PrivyConfig) -> Result<Self, CustodyError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CustodyError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base(), path)
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.config.app_id, self.config.app_secret);
        format!("Basic {}", Base64::encode_string(credentials.as_bytes()))
    }

    /// Builder carrying the app credential headers.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, self.basic_auth())
            .header(APP_ID_HEADER, &self.config.app_id)
    }

    /// Builder carrying app credentials plus an owner authorization signature.
    fn authorized<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        key: &AuthorizationKey,
    ) -> Result<RequestBuilder, CustodyError> {
        let body_value = body.map(serde_json::to_value).transpose().map_err(|e| {
            CustodyError::Client(format!("failed to serialize request body: {e}"))
        })?;
        let signature = SignatureInput::new(
            method.as_str(),
            self.config.app_id.clone(),
            url,
            body_value,
        )
        .sign(key);

        let builder = self
            .request(method, url)
            .header(AUTHORIZATION_SIGNATURE_HEADER, signature);
        Ok(match body {
            Some(body) => builder.json(body),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder, label: &str) -> Result<reqwest::Response, CustodyError> {
        debug!(request = label, "Calling custody authority");
        let response = builder
            .send()
            .await
            .map_err(|e| CustodyError::Transport(format!("{label} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(request = label, status, "Custody authority rejected request");
            return Err(CustodyError::Rejected { status, body });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        label: &str,
    ) -> Result<T, CustodyError> {
        self.send(builder, label)
            .await?
            .json()
            .await
            .map_err(|e| CustodyError::InvalidResponse(format!("{label} invalid JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl CustodyAuthority for PrivyClient {
    fn app_id(&self) -> &str {
        &self.config.app_id
    }

    async fn create_key_quorum(&self, request: &CreateKeyQuorum) -> Result<KeyQuorum, CustodyError> {
        let url = self.url("/v1/key_quorums");
        self.send_json(self.request(Method::POST, &url).json(request), "POST /v1/key_quorums")
            .await
    }

    async fn delete_key_quorum(
        &self,
        quorum_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        let url = self.url(&format!("/v1/key_quorums/{quorum_id}"));
        let builder = self.authorized::<()>(Method::DELETE, &url, None, authorization)?;
        self.send(builder, "DELETE /v1/key_quorums/{id}").await?;
        Ok(())
    }

    async fn create_policy(&self, request: &CreatePolicy) -> Result<Policy, CustodyError> {
        let url = self.url("/v1/policies");
        self.send_json(self.request(Method::POST, &url).json(request), "POST /v1/policies")
            .await
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Policy, CustodyError> {
        let url = self.url(&format!("/v1/policies/{policy_id}"));
        self.send_json(self.request(Method::GET, &url), "GET /v1/policies/{id}")
            .await
    }

    async fn delete_policy(
        &self,
        policy_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        let url = self.url(&format!("/v1/policies/{policy_id}"));
        let builder = self.authorized::<()>(Method::DELETE, &url, None, authorization)?;
        self.send(builder, "DELETE /v1/policies/{id}").await?;
        Ok(())
    }

    async fn create_rule(
        &self,
        policy_id: &str,
        rule: &PolicyRule,
        authorization: &AuthorizationKey,
    ) -> Result<RuleRef, CustodyError> {
        let url = self.url(&format!("/v1/policies/{policy_id}/rules"));
        let body = rule.without_id();
        let builder = self.authorized(Method::POST, &url, Some(&body), authorization)?;
        self.send_json(builder, "POST /v1/policies/{id}/rules").await
    }

    async fn delete_rule(
        &self,
        policy_id: &str,
        rule_id: &str,
        authorization: &AuthorizationKey,
    ) -> Result<(), CustodyError> {
        let url = self.url(&format!("/v1/policies/{policy_id}/rules/{rule_id}"));
        let builder = self.authorized::<()>(Method::DELETE, &url, None, authorization)?;
        self.send(builder, "DELETE /v1/policies/{id}/rules/{rule_id}")
            .await?;
        Ok(())
    }

    async fn create_wallet(&self, request: &CreateWallet) -> Result<Wallet, CustodyError> {
        let url = self.url("/v1/wallets");
        self.send_json(self.request(Method::POST, &url).json(request), "POST /v1/wallets")
            .await
    }

    async fn update_wallet_signers(
        &self,
        wallet_id: &str,
        signers: &[AdditionalSigner],
        authorization: &AuthorizationKey,
    ) -> Result<Wallet, CustodyError> {
        let url = self.url(&format!("/v1/wallets/{wallet_id}"));
        let body = UpdateWallet {
            additional_signers: signers.to_vec(),
        };
        let builder = self.authorized(Method::PATCH, &url, Some(&body), authorization)?;
        self.send_json(builder, "PATCH /v1/wallets/{id}").await
    }

    async fn forward_rpc(
        &self,
        wallet_id: &str,
        authorization_signature: &str,
        body: &[u8],
    ) -> Result<UpstreamResponse, CustodyError> {
        let url = self.url(&format!("/v1/wallets/{wallet_id}/rpc"));
        debug!(wallet_id, "Forwarding signed RPC request");

        let response = self
            .request(Method::POST, &url)
            .header(AUTHORIZATION_SIGNATURE_HEADER, authorization_signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| CustodyError::Transport(format!("POST /v1/wallets/{{id}}/rpc failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| CustodyError::Transport(format!("reading RPC response failed: {e}")))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
