// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signature relay.
//!
//! Moves an Operator-signed RPC request to the custody authority, adding
//! the Gateway's app credentials. The Operator signature is opaque here:
//! it is never verified or re-derived.
//!
//! ## States
//!
//! `Validating → Forwarding → Responded`. A validation failure goes straight
//! to `Responded` with a 400 and no outbound call. A transport failure
//! answers 500 with a fixed message. Anything the authority answers,
//! including denials, is returned with its own status and body.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::custody::{CustodyAuthority, CustodyError, UpstreamResponse};

/// Header carrying the Operator's authorization signature.
pub const SIGNATURE_HEADER: &str = "x-privy-authorization-signature";

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON body";
pub const FORWARD_FAILURE_MESSAGE: &str = "Failed to forward request to Privy";

const REQUIRED: &str = "Required";
const TOO_SHORT: &str = "String must contain at least 1 character(s)";
const NOT_VISIBLE_ASCII: &str = "Header value must be visible ASCII";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Validating,
    Forwarding,
    Responded,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Validating => write!(f, "validating"),
            RelayState::Forwarding => write!(f, "forwarding"),
            RelayState::Responded => write!(f, "responded"),
        }
    }
}

/// Form and field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            form_errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(name, message);
        errors
    }

    pub fn push(&mut self, name: &str, message: impl Into<String>) {
        self.field_errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }
}

/// JSON type name used in validation messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The forwarded RPC envelope. Unknown top-level keys are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcBody {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcBody {
    fn from_object(object: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let method = match object.get("method") {
            None => return Err(FieldErrors::field("method", REQUIRED)),
            Some(Value::String(m)) if m.is_empty() => {
                return Err(FieldErrors::field("method", TOO_SHORT))
            }
            Some(Value::String(m)) => m.clone(),
            Some(other) => {
                return Err(FieldErrors::field(
                    "method",
                    format!("Expected string, received {}", json_type_name(other)),
                ))
            }
        };
        Ok(Self {
            method,
            params: object.get("params").cloned(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid authorization signature header")]
    InvalidHeader(FieldErrors),

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("invalid rpc body")]
    InvalidBody(FieldErrors),

    #[error("Failed to forward request to Privy: {0}")]
    Forward(#[source] CustodyError),
}

impl RelayError {
    /// The signature header is present but its bytes are not visible ASCII.
    pub fn unreadable_signature() -> Self {
        RelayError::InvalidHeader(FieldErrors::field(SIGNATURE_HEADER, NOT_VISIBLE_ASCII))
    }

    pub fn status(&self) -> u16 {
        match self {
            RelayError::InvalidHeader(_) | RelayError::InvalidJson | RelayError::InvalidBody(_) => 400,
            RelayError::Forward(_) => 500,
        }
    }

    /// Response body; never includes the transport detail.
    pub fn body(&self) -> Value {
        match self {
            RelayError::InvalidHeader(errors) | RelayError::InvalidBody(errors) => {
                json!({ "error": errors })
            }
            RelayError::InvalidJson => json!({ "error": INVALID_JSON_MESSAGE }),
            RelayError::Forward(_) => json!({ "error": FORWARD_FAILURE_MESSAGE }),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRpc {
    pub signature: String,
    pub body: RpcBody,
}

/// Check the signature header and body shape. No I/O.
pub fn validate(signature: Option<&str>, raw_body: &[u8]) -> Result<ValidatedRpc, RelayError> {
    let signature = match signature {
        None => return Err(RelayError::InvalidHeader(FieldErrors::field(SIGNATURE_HEADER, REQUIRED))),
        Some("") => {
            return Err(RelayError::InvalidHeader(FieldErrors::field(
                SIGNATURE_HEADER,
                TOO_SHORT,
            )))
        }
        Some(s) => s.to_string(),
    };

    let value: Value = serde_json::from_slice(raw_body).map_err(|_| RelayError::InvalidJson)?;
    let body = match &value {
        Value::Object(object) => RpcBody::from_object(object).map_err(RelayError::InvalidBody)?,
        other => {
            return Err(RelayError::InvalidBody(FieldErrors::form(format!(
                "Expected object, received {}",
                json_type_name(other)
            ))))
        }
    };

    Ok(ValidatedRpc { signature, body })
}

/// Stateless forwarder; holds only the shared authority client.
#[derive(Clone)]
pub struct Relay {
    authority: Arc<dyn CustodyAuthority>,
}

impl Relay {
    pub fn new(authority: Arc<dyn CustodyAuthority>) -> Self {
        Self { authority }
    }

    pub async fn relay(
        &self,
        wallet_id: &str,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<UpstreamResponse, RelayError> {
        debug!(wallet_id, state = %RelayState::Validating, "Relaying RPC request");
        let request = match validate(signature, raw_body) {
            Ok(request) => request,
            Err(e) => {
                info!(wallet_id, state = %RelayState::Responded, status = e.status(), error = %e, "Rejected RPC request");
                return Err(e);
            }
        };

        debug!(wallet_id, state = %RelayState::Forwarding, method = %request.body.method, "Forwarding RPC request");
        let forwarded = serde_json::to_vec(&request.body)
            .map_err(|e| RelayError::Forward(CustodyError::Client(format!("encoding rpc body: {e}"))))?;

        match self
            .authority
            .forward_rpc(wallet_id, &request.signature, &forwarded)
            .await
        {
            Ok(response) => {
                info!(
                    wallet_id,
                    state = %RelayState::Responded,
                    method = %request.body.method,
                    status = response.status,
                    "Upstream responded"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(wallet_id, state = %RelayState::Responded, error = %e, "Error forwarding to custody authority");
                Err(RelayError::Forward(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::mock::{MockAuthority, Op, MOCK_SIGNATURE};

    fn relay_with(authority: MockAuthority) -> (Relay, Arc<MockAuthority>) {
        let authority = Arc::new(authority);
        (Relay::new(authority.clone()), authority)
    }

    const BODY: &[u8] =
        br#"{"method":"eth_signTypedData_v4","params":{"typed_data":{"primary_type":"Agent"}}}"#;

    #[tokio::test]
    async fn missing_header_is_rejected_without_outbound_call() {
        let (relay, authority) = relay_with(MockAuthority::new());
        let err = relay.relay("w1", None, BODY).await.unwrap_err();

        assert_eq!(err.status(), 400);
        assert_eq!(
            err.body(),
            json!({"error": {"formErrors": [], "fieldErrors": {"x-privy-authorization-signature": ["Required"]}}})
        );
        assert_eq!(authority.count(Op::ForwardRpc), 0);
    }

    #[tokio::test]
    async fn empty_header_is_rejected() {
        let (relay, authority) = relay_with(MockAuthority::new());
        let err = relay.relay("w1", Some(""), BODY).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidHeader(_)));
        assert_eq!(authority.total_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let (relay, authority) = relay_with(MockAuthority::new());
        let err = relay.relay("w1", Some("sig"), b"{not json").await.unwrap_err();
        assert_eq!(err.body(), json!({"error": "Invalid JSON body"}));
        assert_eq!(authority.total_calls(), 0);
    }

    #[tokio::test]
    async fn empty_method_is_rejected() {
        let (relay, authority) = relay_with(MockAuthority::new());
        let err = relay
            .relay("w1", Some("sig"), br#"{"method":"","params":{}}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(
            err.body()["error"]["fieldErrors"]["method"],
            json!([TOO_SHORT])
        );
        assert_eq!(authority.total_calls(), 0);
    }

    #[test]
    fn body_shape_errors() {
        let err = validate(Some("sig"), br#"{"params":{}}"#).unwrap_err();
        assert_eq!(err.body()["error"]["fieldErrors"]["method"], json!(["Required"]));

        let err = validate(Some("sig"), br#"{"method":7}"#).unwrap_err();
        assert_eq!(
            err.body()["error"]["fieldErrors"]["method"],
            json!(["Expected string, received number"])
        );

        let err = validate(Some("sig"), b"[1,2]").unwrap_err();
        assert_eq!(
            err.body()["error"]["formErrors"],
            json!(["Expected object, received array"])
        );
    }

    #[test]
    fn params_are_optional_and_extra_keys_dropped() {
        let ok = validate(Some("sig"), br#"{"method":"eth_sign","extra":1}"#).unwrap();
        assert_eq!(ok.body.params, None);
        assert_eq!(
            serde_json::to_value(&ok.body).unwrap(),
            json!({"method": "eth_sign"})
        );
    }

    #[tokio::test]
    async fn forwards_once_with_operator_signature() {
        let (relay, authority) = relay_with(MockAuthority::new());
        let response = relay.relay("w1", Some("op-sig"), BODY).await.unwrap();

        assert_eq!(response.status, 200);
        let parsed: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed["data"]["signature"], MOCK_SIGNATURE);

        assert_eq!(authority.count(Op::ForwardRpc), 1);
        let forwarded = authority.forwarded.lock().unwrap()[0].clone();
        assert_eq!(forwarded.wallet_id, "w1");
        assert_eq!(forwarded.signature, "op-sig");
        let body: Value = serde_json::from_slice(&forwarded.body).unwrap();
        let original: Value = serde_json::from_slice(BODY).unwrap();
        assert_eq!(body, original);
    }

    #[tokio::test]
    async fn upstream_denial_passes_through() {
        let denial = json!({"error": "Policy violation: request denied"});
        let (relay, _) = relay_with(MockAuthority::new().responding(403, denial.clone()));
        let response = relay.relay("w1", Some("sig"), BODY).await.unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(serde_json::from_slice::<Value>(&response.body).unwrap(), denial);
    }

    #[tokio::test]
    async fn transport_failure_hides_detail() {
        let (relay, authority) = relay_with(MockAuthority::new().unreachable());
        let err = relay.relay("w1", Some("sig"), BODY).await.unwrap_err();

        assert_eq!(err.status(), 500);
        assert_eq!(err.body(), json!({"error": FORWARD_FAILURE_MESSAGE}));
        assert_eq!(authority.count(Op::ForwardRpc), 1);
    }
}
