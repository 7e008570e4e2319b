// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Key material and request signatures for the three vault roles.
//!
//! ## Signing Flow
//!
//! 1. Each role gets a P-256 key pair at provisioning time
//! 2. The public key is registered with the custody authority as a
//!    1-of-1 key quorum
//! 3. A signer describes the exact request it wants executed
//!    (method, url, app id, body), canonicalizes it and signs it
//! 4. The authority verifies the signature against the quorum and applies
//!    the signer's policy
//!
//! ## Security
//!
//! - Operator private keys never touch server-side storage
//! - Private keys are redacted from `Debug` output
//! - Signatures are opaque to the gateway; it never re-derives them

pub mod error;
pub mod keys;
pub mod roles;
pub mod signature;

pub use error::KeyError;
pub use keys::{generate_p256_keypair, AuthorizationKey, KeyPair};
pub use roles::Role;
pub use signature::{
    canonicalize, verify_signature, SignatureInput, APP_ID_HEADER,
    AUTHORIZATION_SIGNATURE_HEADER,
};
