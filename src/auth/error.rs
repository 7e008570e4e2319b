// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material and authorization-signature errors.

/// Errors raised while generating, decoding or using authorization keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Key generation or DER encoding failed
    #[error("failed to encode key: {0}")]
    Encoding(String),

    /// Private key could not be decoded (base64, PEM or PKCS#8)
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Public key could not be decoded (base64 or SPKI)
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature bytes are not valid base64 / DER
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature does not verify against the payload
    #[error("signature verification failed")]
    VerificationFailed,

    /// Request payload could not be serialized for signing
    #[error("failed to serialize signature payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl KeyError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            KeyError::Encoding(_) => "key_encoding",
            KeyError::InvalidPrivateKey(_) => "invalid_private_key",
            KeyError::InvalidPublicKey(_) => "invalid_public_key",
            KeyError::MalformedSignature(_) => "malformed_signature",
            KeyError::VerificationFailed => "verification_failed",
            KeyError::Payload(_) => "payload_serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            KeyError::InvalidPrivateKey("x".into()).error_code(),
            "invalid_private_key"
        );
        assert_eq!(KeyError::VerificationFailed.error_code(), "verification_failed");
    }

    #[test]
    fn display_includes_detail() {
        let err = KeyError::InvalidPublicKey("bad spki".into());
        assert_eq!(err.to_string(), "invalid public key: bad spki");
    }
}
