use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Envelope for every JSON response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    /// Confirmation text for mutating calls
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Standard result type for JSON handlers
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

/// Result type for handlers that create something
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub fn ok_with_message<T>(data: T, message: impl Into<String>) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data).with_message(message)))
}

pub fn created<T>(data: T, message: impl Into<String>) -> CreatedResult<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(data).with_message(message)),
    ))
}
