// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Withdrawal destination whitelist.

use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Destination used when a vault is created without an explicit whitelist.
pub const DEFAULT_WITHDRAW_DESTINATION: &str = "0x36CD9238Fd87901661d74c6E7d817DEBbEd034d4";

/// Message attached to address validation failures.
pub const INVALID_ADDRESS_MESSAGE: &str = "Invalid Ethereum address";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WhitelistError {
    #[error("withdraw whitelist must contain at least one address")]
    Empty,

    #[error("Invalid Ethereum address at index {index}: {value}")]
    InvalidAddress { index: usize, value: String },
}

/// Whether `value` is `0x` followed by exactly 40 hex characters.
pub fn is_eth_address(value: &str) -> bool {
    value.len() == 42 && value.starts_with("0x") && Address::from_str(value).is_ok()
}

/// A validated, lowercased, de-duplicated set of withdrawal destinations.
///
/// The authority compares message fields against the lowercase form that
/// signing SDKs emit, so addresses are normalized before they can reach a
/// rule. First-occurrence order is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Whitelist(Vec<String>);

impl Whitelist {
    pub fn new<I, S>(addresses: I) -> Result<Self, WhitelistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for (index, raw) in addresses.into_iter().enumerate() {
            let raw = raw.as_ref().trim();
            if !is_eth_address(raw) {
                return Err(WhitelistError::InvalidAddress {
                    index,
                    value: raw.to_string(),
                });
            }
            let lowered = raw.to_lowercase();
            if !normalized.contains(&lowered) {
                normalized.push(lowered);
            }
        }

        if normalized.is_empty() {
            return Err(WhitelistError::Empty);
        }
        Ok(Self(normalized))
    }

    /// Parse a comma-separated list (as found in environment variables).
    pub fn parse_list(raw: &str) -> Result<Self, WhitelistError> {
        Self::new(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// The built-in single-address default.
    pub fn default_destination() -> Self {
        Self(vec![DEFAULT_WITHDRAW_DESTINATION.to_lowercase()])
    }

    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, address: &str) -> bool {
        let lowered = address.to_lowercase();
        self.0.iter().any(|a| *a == lowered)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl TryFrom<Vec<String>> for Whitelist {
    type Error = WhitelistError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Whitelist> for Vec<String> {
    fn from(value: Whitelist) -> Self {
        value.0
    }
}
