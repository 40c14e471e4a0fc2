//! API error responses with stable error codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use coldspec_catalog::CatalogError;
use coldspec_ingestion::IngestionError;
use coldspec_recommend::RecommendError;
use coldspec_retrieval::RetrievalError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(m) => ApiError::not_found(m),
            CatalogError::ConflictClosed(m) => {
                ApiError::new(StatusCode::CONFLICT, "conflict_closed", m)
            }
            CatalogError::DuplicateKey(m) => {
                ApiError::new(StatusCode::CONFLICT, "duplicate_key", m)
            }
            CatalogError::InvalidWrite(m) => ApiError::validation(m),
            CatalogError::StoreUnavailable(m) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", m)
            }
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::RetrievalUnavailable(m) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "retrieval_unavailable", m)
            }
            RetrievalError::Cancelled => {
                ApiError::new(StatusCode::REQUEST_TIMEOUT, "cancelled", "query cancelled")
            }
            RetrievalError::Provider(e) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "provider_error", e.to_string())
            }
        }
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self {
        match e {
            RecommendError::NotFound(m) => ApiError::not_found(m),
            RecommendError::Catalog(e) => e.into(),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::ValidationError(m) => ApiError::validation(m),
            IngestionError::UnsupportedFormat(m) => {
                ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", m)
            }
            IngestionError::Catalog(e) => e.into(),
            other => ApiError::internal(other.to_string()),
        }
    }
}
