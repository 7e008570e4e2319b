// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Module
//!
//! Declarative signing policies installed on each vault.
//!
//! - [`types`] - Rule and condition model shared with the custody authority
//! - [`whitelist`] - Withdrawal destination validation and normalization
//! - [`compiler`] - Whitelist to ordered rule list, per strategy
//! - [`eval`] - First-match-wins evaluation of a rule list

pub mod compiler;
pub mod eval;
pub mod types;
pub mod whitelist;

pub use compiler::{
    compiler_for, rules_fingerprint, HyperliquidNetwork, RuleCompiler, RuleStrategy,
    CHAIN_TYPE, POLICY_NAME, POLICY_VERSION,
};
pub use eval::{evaluate, SigningRequest, Verdict};
pub use types::{PolicyRule, RuleAction, RuleRef};
pub use whitelist::{Whitelist, WhitelistError};
