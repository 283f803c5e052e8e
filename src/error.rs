//! Error types for RefactorIQ
//!
//! Every failure the HTTP layer can see is an `AppError`. Each variant maps
//! to exactly one status code and one stable machine-readable code in
//! [`AppError::status_and_code`]; nothing else in the crate picks status
//! codes.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::StoreError;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid or expired credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Valid identity without the required role, permission or active state (403)
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent (404)
    #[error("{entity} not found")]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    /// Uniqueness violation or concurrent-create race (409)
    #[error("{0}")]
    Conflict(String),

    /// OAuth provider failure (502)
    #[error("{message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    /// Malformed input (422)
    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/decryption error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: Some(id.to_string()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field_validation(field: &str, problem: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![problem.into()]);
        AppError::Validation {
            message: "Request validation failed".to_string(),
            fields,
        }
    }

    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Fixed kind → transport mapping.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::ExternalService { .. } => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR")
            }
            AppError::Validation { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        self.status_and_code().1
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::NotFound { entity, id } => {
                let mut details = serde_json::json!({ "entity_type": entity.to_ascii_lowercase() });
                if let Some(id) = id {
                    details["entity_id"] = serde_json::Value::String(id.clone());
                }
                Some(details)
            }
            AppError::ExternalService { service, .. } => {
                Some(serde_json::json!({ "service": service }))
            }
            AppError::Validation { fields, .. } if !fields.is_empty() => {
                Some(serde_json::json!({ "fields": fields }))
            }
            _ => None,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound {
                entity: "User",
                id: None,
            },
            StoreError::Duplicate(field) => {
                AppError::Conflict(format!("User with this {field} already exists"))
            }
            StoreError::Operation(source) => {
                AppError::Internal(anyhow::Error::new(source).context("database operation failed"))
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field_validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::field_validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::field_validation("path", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    /// Render the error envelope
    ///
    /// Unclassified errors are logged in full and returned as a generic
    /// message.
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Unhandled internal error");
            "An internal server error occurred".to_string()
        } else {
            tracing::debug!(code, error = %self, "Request failed");
            self.to_string()
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[code])
            .inc();

        let body = crate::api::ApiResponse::<()>::error(code, message, self.details());
        (status, axum::Json(body)).into_response()
    }
}
