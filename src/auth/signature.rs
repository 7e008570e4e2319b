// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization signatures over canonical requests.
//!
//! A signer proves intent over one specific request by signing a canonical
//! JSON document describing it:
//!
//! ```text
//! { "body": <request body>, "headers": { "privy-app-id": <app id> },
//!   "method": "POST", "url": <absolute url>, "version": 1 }
//! ```
//!
//! Canonicalization sorts object keys lexicographically and emits no
//! insignificant whitespace, so the client and the authority hash the same
//! bytes regardless of how the body was originally laid out.

use base64ct::{Base64, Encoding};
use p256::ecdsa::{signature::Verifier, Signature};
use serde_json::{json, Value};

use super::error::KeyError;
use super::keys::{decode_public_key, AuthorizationKey};

/// Header carrying the authorization signature on authority requests.
pub const AUTHORIZATION_SIGNATURE_HEADER: &str = "privy-authorization-signature";

/// Header carrying the public app identifier.
pub const APP_ID_HEADER: &str = "privy-app-id";

/// Only supported signature payload version.
pub const SIGNATURE_VERSION: u8 = 1;

/// The request description that gets signed.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInput {
    pub method: String,
    pub url: String,
    pub app_id: String,
    pub body: Option<Value>,
}

impl SignatureInput {
    /// Describe a `POST` request with a JSON body.
    pub fn post(app_id: impl Into<String>, url: impl Into<String>, body: Value) -> Self {
        Self::new("POST", app_id, url, Some(body))
    }

    pub fn new(
        method: impl Into<String>,
        app_id: impl Into<String>,
        url: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            app_id: app_id.into(),
            body,
        }
    }

    /// The JSON document that is canonicalized and signed.
    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "version": SIGNATURE_VERSION,
            "method": self.method,
            "url": self.url,
            "headers": { APP_ID_HEADER: self.app_id },
        });
        if let (Some(body), Some(obj)) = (&self.body, payload.as_object_mut()) {
            obj.insert("body".to_string(), body.clone());
        }
        payload
    }

    /// Canonical bytes of [`Self::payload`].
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonicalize(&self.payload()).into_bytes()
    }

    /// Sign this request with `key`, returning the header value.
    pub fn sign(&self, key: &AuthorizationKey) -> String {
        key.sign(&self.canonical_bytes())
    }
}

/// Canonical JSON text: sorted keys, compact separators.
///
/// Key order is enforced here rather than relying on the map type backing
/// `serde_json::Value`, which changes when `preserve_order` is enabled.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.encode_utf16().cmp(b.0.encode_utf16()));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Verify a base64 DER signature against a base64 SPKI public key.
pub fn verify_signature(
    public_key: &str,
    input: &SignatureInput,
    signature: &str,
) -> Result<(), KeyError> {
    let verifying_key = decode_public_key(public_key)?;
    let der = Base64::decode_vec(signature.trim())
        .map_err(|e| KeyError::MalformedSignature(format!("invalid base64: {e}")))?;
    let signature = Signature::from_der(&der)
        .map_err(|e| KeyError::MalformedSignature(format!("invalid DER: {e}")))?;
    verifying_key
        .verify(&input.canonical_bytes(), &signature)
        .map_err(|_| KeyError::VerificationFailed)
}
