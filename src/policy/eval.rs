// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local policy evaluator.
//!
//! Mirrors how the custody authority matches a signing request against an
//! ordered rule list. It is never used to gate relayed traffic; the authority
//! does that. It exists so rule sets can be checked before they are
//! installed and so the compiler's output can be tested against concrete
//! requests.
//!
//! Matching semantics:
//! - a rule applies when its `method` equals the request method or is `*`
//! - every condition of a rule must hold
//! - message conditions require the request schema to equal the embedded one
//! - request-side values are compared in lowercase
//! - ordering operators compare numerically when both sides are integers
//! - first match wins; no match means deny

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Condition, ConditionOperator, ConditionValue, PolicyRule, RuleAction, ANY_METHOD};

/// System field resolved from the evaluation clock.
pub const SYSTEM_TIMESTAMP_FIELD: &str = "current_unix_timestamp";

/// EIP-712 payload of a typed-data signing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedDataRequest {
    #[serde(default)]
    pub domain: Value,
    pub types: Value,
    #[serde(alias = "primaryType")]
    pub primary_type: String,
    #[serde(default)]
    pub message: Value,
}

/// A signing request as seen by the policy engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningRequest {
    pub method: String,
    pub typed_data: Option<TypedDataRequest>,
}

impl SigningRequest {
    pub fn typed_data(typed_data: TypedDataRequest) -> Self {
        Self {
            method: super::types::SIGN_TYPED_DATA_METHOD.to_string(),
            typed_data: Some(typed_data),
        }
    }
}

/// Evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub action: RuleAction,
    /// Name of the matching rule; `None` for the default deny.
    pub matched_rule: Option<String>,
    pub rule_index: Option<usize>,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.action == RuleAction::Allow
    }

    fn default_deny() -> Self {
        Self {
            action: RuleAction::Deny,
            matched_rule: None,
            rule_index: None,
        }
    }
}

/// Evaluate `request` against `rules` at instant `now`.
pub fn evaluate(rules: &[PolicyRule], request: &SigningRequest, now: DateTime<Utc>) -> Verdict {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule_matches(rule, request, now))
        .map(|(index, rule)| Verdict {
            action: rule.action,
            matched_rule: Some(rule.name.clone()),
            rule_index: Some(index),
        })
        .unwrap_or_else(Verdict::default_deny)
}

fn rule_matches(rule: &PolicyRule, request: &SigningRequest, now: DateTime<Utc>) -> bool {
    (rule.method == ANY_METHOD || rule.method == request.method)
        && rule
            .conditions
            .iter()
            .all(|condition| condition_holds(condition, request, now))
}

fn condition_holds(condition: &Condition, request: &SigningRequest, now: DateTime<Utc>) -> bool {
    match condition {
        Condition::EthereumTypedDataMessage {
            typed_data,
            field,
            operator,
            value,
        } => {
            let Some(td) = &request.typed_data else {
                return false;
            };
            if !typed_data.matches(&td.types, &td.primary_type) {
                return false;
            }
            td.message
                .get(field)
                .and_then(scalar)
                .is_some_and(|actual| compare(&actual, *operator, value))
        }
        Condition::EthereumTypedDataDomain {
            field,
            operator,
            value,
        } => request
            .typed_data
            .as_ref()
            .and_then(|td| td.domain.get(field))
            .and_then(scalar)
            .is_some_and(|actual| compare(&actual, *operator, value)),
        Condition::System {
            field,
            operator,
            value,
        } => match field.as_str() {
            SYSTEM_TIMESTAMP_FIELD => compare(&now.timestamp().to_string(), *operator, value),
            _ => false,
        },
    }
}

/// Lowercased string form of a JSON scalar.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(actual: &str, operator: ConditionOperator, expected: &ConditionValue) -> bool {
    match (operator, expected) {
        (ConditionOperator::In, ConditionValue::Many(values)) => {
            values.iter().any(|v| equals(actual, v))
        }
        (ConditionOperator::In, ConditionValue::One(v)) => equals(actual, v),
        (_, ConditionValue::Many(_)) => false,
        (ConditionOperator::Eq, ConditionValue::One(v)) => equals(actual, v),
        (ConditionOperator::Neq, ConditionValue::One(v)) => !equals(actual, v),
        (op, ConditionValue::One(v)) => {
            let ordering = match (actual.parse::<i128>(), v.parse::<i128>()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => actual.cmp(v.as_str()),
            };
            match op {
                ConditionOperator::Lt => ordering.is_lt(),
                ConditionOperator::Lte => ordering.is_le(),
                ConditionOperator::Gt => ordering.is_gt(),
                ConditionOperator::Gte => ordering.is_ge(),
                _ => false,
            }
        }
    }
}

fn equals(actual: &str, expected: &str) -> bool {
    match (actual.parse::<i128>(), expected.parse::<i128>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => actual == expected,
    }
}
