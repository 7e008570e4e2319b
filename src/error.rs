// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;
use crate::vault::{FieldErrors, ProvisionError, UpdateError};

/// HTTP error: `{"error": ...}`, optionally prefixed with `"success": false`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Field-level detail; replaces `message` in the body when present
    pub fields: Option<FieldErrors>,
    /// Vault mutation routes answer with a `success` flag
    pub flagged: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Fields(FieldErrors),
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    error: ErrorDetail,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
            flagged: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 400 with form and field errors.
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            fields: Some(fields),
            ..Self::bad_request("Validation failed")
        }
    }

    /// Add `"success": false` to the body.
    pub fn flagged(mut self) -> Self {
        self.flagged = true;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match self.fields {
            Some(fields) => ErrorDetail::Fields(fields),
            None => ErrorDetail::Message(self.message),
        };
        let body = Json(ErrorBody {
            success: self.flagged.then_some(false),
            error,
        });
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidWalletId(_) => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        ApiError::internal(e.to_string()).flagged()
    }
}

impl From<UpdateError> for ApiError {
    fn from(e: UpdateError) -> Self {
        let message = e.to_string();
        let error = match e {
            UpdateError::NotFound(_) => ApiError::not_found(message),
            UpdateError::Busy(_) => ApiError::conflict(message),
            UpdateError::Whitelist(_) => ApiError::bad_request(message),
            UpdateError::Storage(storage) => ApiError::from(storage),
            UpdateError::Key(_)
            | UpdateError::Fingerprint(_)
            | UpdateError::UnidentifiedRule { .. }
            | UpdateError::RuleMismatch { .. }
            | UpdateError::Custody { .. } => ApiError::internal(message),
        };
        error.flagged()
    }
}
