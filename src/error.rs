//! # Error Handling
//!
//! Problem+json responses for the JSON endpoints ([`ApiError`]) and the
//! linking-flow taxonomy ([`LinkError`]) that the callback turns into
//! settings-page redirects.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::providers::{AdapterError, RegistryError};
use crate::state_token::StateError;
use crate::store::StoreError;
use crate::telemetry;

/// Message shown to users whenever the state cannot be tied to a session
pub const AUTHENTICATION_FAILED_MESSAGE: &str =
    "Authentication failed. Please sign in and try connecting again.";
const PERSISTENCE_FAILED_MESSAGE: &str = "Failed to save the connection. Please try again.";

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::Unauthorized => "UNAUTHORIZED",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code(),
            error_type.to_string(),
        )
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(_)) = error.sql_err() {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(db_err) => db_err.into(),
            StoreError::Unavailable(reason) => {
                tracing::error!(%reason, "Connection store unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Connection store unavailable",
                )
            }
            other => {
                tracing::error!(error = %other, "Connection store error");
                ErrorType::InternalServerError.into()
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::ProviderNotFound { platform } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Platform '{}' is not available", platform),
            ),
            other => {
                tracing::error!(error = %other, "Provider registry misconfigured");
                ErrorType::InternalServerError.into()
            }
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        message.unwrap_or("Authentication required"),
    )
}

/// Create a not found error (404)
pub fn not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Failures of the account-linking flow
#[derive(Debug, Error)]
pub enum LinkError {
    /// The callback carried no authorization code
    #[error("No code provided")]
    MissingCode,
    /// The state could not be tied to the user who started the flow
    #[error("authentication failed: {0}")]
    Authentication(#[source] StateError),
    #[error("token exchange failed: {0}")]
    ProviderExchange(#[source] AdapterError),
    #[error("profile fetch failed: {0}")]
    ProfileFetch(#[source] AdapterError),
    #[error("persisting connection failed: {0}")]
    Persistence(#[source] StoreError),
}

impl LinkError {
    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::MissingCode => "missing_code",
            LinkError::Authentication(_) => "authentication",
            LinkError::ProviderExchange(_) => "provider_exchange",
            LinkError::ProfileFetch(_) => "profile_fetch",
            LinkError::Persistence(_) => "persistence",
        }
    }

    /// Message carried back to the settings page; never contains credentials
    pub fn user_message(&self) -> String {
        match self {
            LinkError::MissingCode => "No code provided".to_string(),
            LinkError::Authentication(_) => AUTHENTICATION_FAILED_MESSAGE.to_string(),
            LinkError::ProviderExchange(err) => err.to_string(),
            LinkError::ProfileFetch(err) => format!("Failed to fetch profile: {}", err),
            LinkError::Persistence(_) => PERSISTENCE_FAILED_MESSAGE.to_string(),
        }
    }
}
