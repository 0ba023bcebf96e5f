//! # OAuth Callback Handler
//!
//! Provider redirect target. Everything except a missing `code` ends in a
//! redirect to the settings page carrying the outcome.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, LinkError};
use crate::handlers::found;
use crate::linking::CallbackParams;
use crate::server::AppState;

/// Body returned when the provider redirect carries no code
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackErrorBody {
    pub error: String,
}

/// Complete the linking flow for a platform
#[utoipa::path(
    get,
    path = "/callback/{platform}",
    params(
        ("platform" = String, Path, description = "Platform identifier, e.g. 'linkedin'"),
        CallbackParams
    ),
    responses(
        (status = 302, description = "Redirect to the settings page with status=success or status=error"),
        (status = 400, description = "No authorization code provided", body = CallbackErrorBody,
            example = json!({"error": "No code provided"})),
        (status = 404, description = "Platform unknown or not enabled", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let adapter = state.registry.get_by_name(&platform)?;

    let outcome = state.callbacks.handle(adapter.as_ref(), &params).await;
    if let Err(LinkError::MissingCode) = outcome {
        tracing::info!(platform = %adapter.platform(), "Callback without authorization code");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(CallbackErrorBody {
                error: LinkError::MissingCode.user_message(),
            }),
        )
            .into_response());
    }

    let location = state
        .callbacks
        .redirect_location(adapter.platform(), &outcome);
    Ok(found(&location))
}
