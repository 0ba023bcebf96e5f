//! # Connections API Handlers
//!
//! Lists and unlinks the signed-in user's connections. Token material never
//! leaves the store through these endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, not_found};
use crate::providers::Platform;
use crate::server::AppState;
use crate::store::Connection;

/// Connection information for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionInfo {
    /// Unique identifier for the connection
    pub id: Uuid,
    pub platform: Platform,
    /// Account identifier on the platform
    pub platform_user_id: String,
    /// Display name on the platform
    pub platform_user_name: String,
    /// Granted scopes, sorted
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Indicates whether a refresh token is stored
    #[schema(example = true)]
    pub has_refresh_token: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Connection> for ConnectionInfo {
    fn from(connection: Connection) -> Self {
        Self {
            id: connection.id,
            platform: connection.platform,
            platform_user_id: connection.platform_user_id,
            platform_user_name: connection.platform_user_name,
            scopes: connection.scopes.into_iter().collect(),
            expires_at: connection.expires_at,
            has_refresh_token: connection.refresh_token.is_some(),
            created_at: connection.created_at,
            updated_at: connection.updated_at,
        }
    }
}

/// Response containing the caller's connections
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsResponse {
    pub connections: Vec<ConnectionInfo>,
}

/// List the caller's linked accounts
#[utoipa::path(
    get,
    path = "/connections",
    security(("session" = [])),
    responses(
        (status = 200, description = "Linked accounts ordered by platform", body = ConnectionsResponse),
        (status = 401, description = "No valid session", body = ApiError),
        (status = 503, description = "Connection store unavailable", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn list_connections(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ConnectionsResponse>, ApiError> {
    let connections = state.connections.list_for_user(&user.user_id).await?;
    Ok(Json(ConnectionsResponse {
        connections: connections.into_iter().map(ConnectionInfo::from).collect(),
    }))
}

/// Unlink the caller's account on a platform
#[utoipa::path(
    delete,
    path = "/connections/{platform}",
    security(("session" = [])),
    params(
        ("platform" = String, Path, description = "Platform identifier, e.g. 'linkedin'")
    ),
    responses(
        (status = 204, description = "Connection removed"),
        (status = 401, description = "No valid session", body = ApiError),
        (status = 404, description = "No connection for this platform", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn delete_connection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<StatusCode, ApiError> {
    let platform: Platform = platform
        .parse()
        .map_err(|_| not_found(&format!("Platform '{}' is not supported", platform)))?;

    if state.connections.delete(&user.user_id, platform).await? {
        tracing::info!(user_id = %user.user_id, platform = %platform, "Unlinked social account");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&format!("No {} connection to remove", platform)))
    }
}
