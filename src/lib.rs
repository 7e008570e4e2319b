// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault Gateway - Three-Party Custodial Vault Service
//!
//! Provisions policy-constrained wallets on a remote custody authority and
//! relays Operator-signed requests to it. Each vault has three key holders:
//! an unconstrained Admin owner, and an Operator and a Gateway that are both
//! bound to the same override policy.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - P-256 authorization keys, roles and request signatures
//! - `custody` - Custody authority client (Privy)
//! - `operator` - Client side of the relay protocol
//! - `policy` - Rule compiler and evaluator
//! - `storage` - Admin and Gateway credential persistence
//! - `vault` - Provisioning, policy updates and the signature relay

pub mod api;
pub mod auth;
pub mod config;
pub mod custody;
pub mod error;
pub mod operator;
pub mod policy;
pub mod state;
pub mod storage;
pub mod vault;
