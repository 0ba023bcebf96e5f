//! # Connect Handlers
//!
//! Start an account-linking flow for the signed-in user.

use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::handlers::found;
use crate::server::AppState;

/// OAuth authorization URL response for API clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeUrlResponse {
    /// Complete authorization URL for user redirection
    /// HTTPS, no fragment, at most 2048 characters
    pub authorize_url: String,
}

/// Redirect the browser to the provider's consent page
#[utoipa::path(
    get,
    path = "/connect/{platform}",
    security(("session" = [])),
    params(
        ("platform" = String, Path, description = "Platform identifier, e.g. 'linkedin'")
    ),
    responses(
        (status = 302, description = "Redirect to the provider authorize URL"),
        (status = 401, description = "No valid session", body = ApiError),
        (status = 404, description = "Platform unknown or not enabled", body = ApiError),
        (status = 500, description = "Authorize URL could not be built", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn connect_redirect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<Response, ApiError> {
    let request = state.authorizer.build(&user, &platform)?;
    Ok(found(request.url.as_str()))
}

/// Return the provider authorize URL for single-page clients
#[utoipa::path(
    post,
    path = "/connect/{platform}",
    security(("session" = [])),
    params(
        ("platform" = String, Path, description = "Platform identifier, e.g. 'linkedin'")
    ),
    responses(
        (status = 200, description = "Authorization URL generated", body = AuthorizeUrlResponse),
        (status = 401, description = "No valid session", body = ApiError),
        (status = 404, description = "Platform unknown or not enabled", body = ApiError),
        (status = 500, description = "Authorize URL could not be built", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn start_connect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<Json<AuthorizeUrlResponse>, ApiError> {
    let request = state.authorizer.build(&user, &platform)?;
    Ok(Json(AuthorizeUrlResponse {
        authorize_url: request.url.to_string(),
    }))
}
