//! # Providers API Handlers
//!
//! Lists the platforms this deployment can link.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::providers::ProviderMetadata;
use crate::server::AppState;

/// Response containing the enabled platforms
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    /// Capability descriptors sorted by platform name
    pub providers: Vec<ProviderMetadata>,
}

/// Public endpoint to list the enabled platforms
#[utoipa::path(
    get,
    path = "/providers",
    responses(
        (status = 200, description = "Enabled platforms", body = ProvidersResponse, example = json!({
            "providers": [
                {
                    "platform": "twitter",
                    "authorize_url": "https://twitter.com/i/oauth2/authorize",
                    "token_url": "https://api.twitter.com/2/oauth2/token",
                    "auth_style": "http_basic_auth",
                    "requires_pkce": true,
                    "supports_refresh": true,
                    "scopes": ["tweet.read", "tweet.write", "users.read", "offline.access"]
                }
            ]
        }))
    ),
    tag = "providers"
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.list_metadata(),
    })
}
