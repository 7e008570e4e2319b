// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Declarative policy rule model.
//!
//! The shapes here are exactly what the custody authority accepts on
//! `POST /v1/policies` and returns on `GET /v1/policies/{id}`:
//!
//! ```json
//! {
//!   "name": "Allow Whitelisted Withdrawals",
//!   "method": "eth_signTypedData_v4",
//!   "conditions": [{
//!     "field_source": "ethereum_typed_data_message",
//!     "typed_data": { "types": { ... }, "primary_type": "..." },
//!     "field": "destination",
//!     "operator": "in",
//!     "value": ["0x..."]
//!   }],
//!   "action": "ALLOW"
//! }
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

/// RPC method for EIP-712 typed-data signing.
pub const SIGN_TYPED_DATA_METHOD: &str = "eth_signTypedData_v4";

/// Wildcard matching every RPC method.
pub const ANY_METHOD: &str = "*";

/// Outcome attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// Comparison applied between a request field and a condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

/// Right-hand side of a condition: a scalar for comparisons, a list for `in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::One(value.to_string())
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(values: Vec<String>) -> Self {
        ConditionValue::Many(values)
    }
}

/// One member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedDataField {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// EIP-712 `types` map.
///
/// Backed by a `Vec` so that both the type-name order and the field order
/// survive serialization round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypedDataTypes(pub Vec<(String, Vec<TypedDataField>)>);

impl TypedDataTypes {
    pub fn get(&self, name: &str) -> Option<&[TypedDataField]> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, fields)| fields.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TypedDataTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, fields) in &self.0 {
            map.serialize_entry(name, fields)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TypedDataTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TypesVisitor;

        impl<'de> Visitor<'de> for TypesVisitor {
            type Value = TypedDataTypes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of EIP-712 type names to field lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut types = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, fields)) =
                    access.next_entry::<String, Vec<TypedDataField>>()?
                {
                    types.push((name, fields));
                }
                Ok(TypedDataTypes(types))
            }
        }

        deserializer.deserialize_map(TypesVisitor)
    }
}

/// The schema a message condition is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataSchema {
    pub types: TypedDataTypes,
    pub primary_type: String,
}

impl TypedDataSchema {
    /// Whether a live request's `types`/`primary_type` hash to this schema.
    ///
    /// Type-name order is irrelevant to EIP-712 hashing; field order and
    /// field types are not.
    pub fn matches(&self, types: &Value, primary_type: &str) -> bool {
        if self.primary_type != primary_type {
            return false;
        }
        let Some(request_types) = types.as_object() else {
            return false;
        };
        if request_types.len() != self.types.len() {
            return false;
        }
        self.types.0.iter().all(|(name, fields)| {
            let Some(request_fields) = request_types.get(name).and_then(Value::as_array) else {
                return false;
            };
            request_fields.len() == fields.len()
                && request_fields.iter().zip(fields).all(|(got, want)| {
                    got.get("name").and_then(Value::as_str) == Some(want.name.as_str())
                        && got.get("type").and_then(Value::as_str) == Some(want.kind.as_str())
                })
        })
    }
}

/// A single predicate inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field_source", rename_all = "snake_case")]
pub enum Condition {
    /// Field of the typed-data message, guarded by an exact schema match.
    EthereumTypedDataMessage {
        typed_data: TypedDataSchema,
        field: String,
        operator: ConditionOperator,
        value: ConditionValue,
    },
    /// Field of the typed-data domain separator.
    EthereumTypedDataDomain {
        field: String,
        operator: ConditionOperator,
        value: ConditionValue,
    },
    /// Fact supplied by the authority (e.g. `current_unix_timestamp`).
    System {
        field: String,
        operator: ConditionOperator,
        value: ConditionValue,
    },
}

/// One ordered allow/deny rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Assigned by the authority; absent on rules that were never created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub method: String,
    pub conditions: Vec<Condition>,
    pub action: RuleAction,
}

impl PolicyRule {
    /// Copy of this rule without the authority-assigned id.
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Identifier/name pair reported after rule creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RuleRef {
    pub id: String,
    pub name: String,
}
