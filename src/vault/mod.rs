// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Operations
//!
//! - [`provisioner`] - Creates a wallet with Admin/Operator/Gateway roles and its policy
//! - [`updater`] - Replaces the rules of an existing vault policy
//! - [`relay`] - Forwards Operator-signed RPC requests to the custody authority

pub mod provisioner;
pub mod relay;
pub mod updater;

pub use provisioner::{OperatorConfig, ProvisionError, ProvisionStep, Provisioner, RollbackReport};
pub use relay::{FieldErrors, Relay, RelayError, SIGNATURE_HEADER};
pub use updater::{PolicyUpdate, PolicyUpdater, UpdateError, UpdatePhase};
