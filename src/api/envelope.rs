//! Uniform JSON response envelope
//!
//! ```text
//! success: {"success": true,  "data": ..., "meta": {"timestamp": ..., "pagination"?: ...}}
//! error:   {"success": false, "error": {"code", "message", "details"?}, "meta": {...}}
//! ```

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::AccountPage;

/// Pagination summary attached to list responses
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl From<&AccountPage> for PaginationMeta {
    fn from(page: &AccountPage) -> Self {
        Self {
            page: page.page,
            limit: page.size,
            total_pages: page.pages,
            total_count: page.total,
            has_next_page: i64::from(page.page) < page.pages,
            has_previous_page: page.page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            pagination: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Response body for every JSON endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ResponseMeta::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationMeta) -> Self {
        self.meta.pagination = Some(pagination);
        self
    }
}

impl ApiResponse<()> {
    pub fn error(
        code: &str,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details,
            }),
            meta: ResponseMeta::default(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `{"message": ...}` payload
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error() {
        let body = serde_json::to_value(ApiResponse::success(MessageResponse::new("ok"))).unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["message"], "ok");
        assert!(body.get("error").is_none());
        assert!(body["meta"]["timestamp"].is_string());
        assert!(body["meta"].get("pagination").is_none());
    }

    #[test]
    fn error_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::error(
            "NOT_FOUND",
            "User not found",
            Some(serde_json::json!({ "entity_type": "user" })),
        ))
        .unwrap();

        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["details"]["entity_type"], "user");
    }

    #[test]
    fn pagination_flags() {
        let page = AccountPage::new(vec![], 45, 2, 20);
        let meta = PaginationMeta::from(&page);

        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_previous_page);

        let last = PaginationMeta::from(&AccountPage::new(vec![], 45, 3, 20));
        assert!(!last.has_next_page);
    }
}
