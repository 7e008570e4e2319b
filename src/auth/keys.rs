// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! P-256 authorization key material.
//!
//! Every vault role (Admin, Operator, Gateway) owns one P-256 key pair. The
//! custody authority identifies signers by the public key registered in a key
//! quorum and checks request signatures against it.
//!
//! ## Encoding
//!
//! - Public keys: base64 of the SPKI DER encoding
//! - Private keys: base64 of the PKCS#8 DER encoding
//!
//! Parsing additionally accepts the `wallet-auth:` prefix used by the
//! authority's dashboard and PEM-armoured PKCS#8 keys.

use base64ct::{Base64, Encoding};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::error::KeyError;

/// Prefix the authority uses when displaying authorization private keys.
pub const WALLET_AUTH_PREFIX: &str = "wallet-auth:";

/// A freshly generated authorization key pair.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    /// Base64 SPKI DER public key
    pub public_key: String,
    /// Base64 PKCS#8 DER private key
    pub private_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a new P-256 key pair.
pub fn generate_p256_keypair() -> Result<KeyPair, KeyError> {
    let signing_key = SigningKey::random(&mut OsRng);

    let private_der = signing_key
        .to_pkcs8_der()
        .map_err(|e| KeyError::Encoding(format!("PKCS#8: {e}")))?;
    let public_der = signing_key
        .verifying_key()
        .to_public_key_der()
        .map_err(|e| KeyError::Encoding(format!("SPKI: {e}")))?;

    Ok(KeyPair {
        public_key: Base64::encode_string(public_der.as_bytes()),
        private_key: Base64::encode_string(private_der.as_bytes()),
    })
}

/// Decode a base64 SPKI public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
    let der = Base64::decode_vec(encoded.trim())
        .map_err(|e| KeyError::InvalidPublicKey(format!("invalid base64: {e}")))?;
    VerifyingKey::from_public_key_der(&der)
        .map_err(|e| KeyError::InvalidPublicKey(format!("invalid SPKI: {e}")))
}

/// A private key able to produce authorization signatures.
#[derive(Clone)]
pub struct AuthorizationKey {
    signing_key: SigningKey,
}

impl std::fmt::Debug for AuthorizationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthorizationKey(<redacted>)")
    }
}

impl AuthorizationKey {
    /// Parse a private key from base64 PKCS#8 (optionally `wallet-auth:`
    /// prefixed) or from a PEM document.
    pub fn parse(encoded: &str) -> Result<Self, KeyError> {
        let trimmed = encoded.trim();

        let der = if trimmed.starts_with("-----BEGIN") {
            let pem = pem::parse(trimmed)
                .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid PEM: {e}")))?;
            pem.contents().to_vec()
        } else {
            let b64 = trimmed.strip_prefix(WALLET_AUTH_PREFIX).unwrap_or(trimmed);
            Base64::decode_vec(b64)
                .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid base64: {e}")))?
        };

        let signing_key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid PKCS#8: {e}")))?;

        Ok(Self { signing_key })
    }

    /// The matching verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base64 SPKI encoding of the matching public key.
    pub fn public_key(&self) -> Result<String, KeyError> {
        let der = self
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| KeyError::Encoding(format!("SPKI: {e}")))?;
        Ok(Base64::encode_string(der.as_bytes()))
    }

    /// Sign `message` (ECDSA P-256 over SHA-256), returning base64 DER.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(message);
        Base64::encode_string(signature.to_der().as_bytes())
    }
}
