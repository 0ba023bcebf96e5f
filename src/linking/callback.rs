//! Second leg of the flow: the provider redirect back to the service.
//!
//! A callback moves through `Received → Validated → Exchanged →
//! ProfileFetched → Persisted` and always ends in a redirect to the settings
//! page, except for a missing `code` which is answered with a 400. Every
//! failure is terminal; nothing is retried.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::form_urlencoded;
use utoipa::IntoParams;

use crate::config::AppConfig;
use crate::error::LinkError;
use crate::http_client::HttpClient;
use crate::providers::{Platform, PlatformProfile, ProviderAdapter, TokenGrant};
use crate::state_token::{StateClaims, StateCodec, StateError};
use crate::store::{Connection, ConnectionStore, NewConnection, StateNonceStore};

/// Query parameters of the provider redirect
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by the provider
    pub code: Option<String>,
    /// Sealed state issued when the flow started
    pub state: Option<String>,
    /// Error code when the user denied access
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Progress of a single callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    Received,
    Validated,
    Exchanged,
    ProfileFetched,
    Persisted,
    Redirected,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackStage::Received => "received",
            CallbackStage::Validated => "validated",
            CallbackStage::Exchanged => "exchanged",
            CallbackStage::ProfileFetched => "profile_fetched",
            CallbackStage::Persisted => "persisted",
            CallbackStage::Redirected => "redirected",
        };
        f.write_str(name)
    }
}

/// Drives a callback from the provider redirect to a stored connection
#[derive(Clone)]
pub struct CallbackHandler {
    state_codec: Arc<StateCodec>,
    nonces: Arc<dyn StateNonceStore>,
    connections: Arc<dyn ConnectionStore>,
    http: Arc<dyn HttpClient>,
    config: Arc<AppConfig>,
}

impl CallbackHandler {
    pub fn new(
        state_codec: Arc<StateCodec>,
        nonces: Arc<dyn StateNonceStore>,
        connections: Arc<dyn ConnectionStore>,
        http: Arc<dyn HttpClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            state_codec,
            nonces,
            connections,
            http,
            config,
        }
    }

    /// Run the callback for `adapter`'s platform up to a persisted connection.
    pub async fn handle(
        &self,
        adapter: &dyn ProviderAdapter,
        params: &CallbackParams,
    ) -> Result<Connection, LinkError> {
        let platform = adapter.platform();
        enter(CallbackStage::Received, platform);
        if let Some(error) = params.error.as_deref() {
            warn!(
                platform = %platform,
                provider_error = error,
                description = params.error_description.as_deref().unwrap_or(""),
                "Provider redirected with an error"
            );
        }

        let code = params
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(LinkError::MissingCode)?;
        let claims = self.validate_state(platform, params.state.as_deref()).await?;
        enter(CallbackStage::Validated, platform);

        let redirect_uri = self.config.redirect_uri(platform);
        let grant = adapter
            .exchange_code(
                self.http.as_ref(),
                code,
                &redirect_uri,
                claims.pkce_verifier.as_deref(),
            )
            .await
            .map_err(LinkError::ProviderExchange)?;
        enter(CallbackStage::Exchanged, platform);

        let profile = adapter
            .fetch_profile(self.http.as_ref(), &grant.access_token)
            .await
            .map_err(LinkError::ProfileFetch)?;
        enter(CallbackStage::ProfileFetched, platform);

        let record = assemble_connection(adapter, &claims.user_id, grant, profile, Utc::now());
        let connection = self
            .connections
            .upsert(record)
            .await
            .map_err(LinkError::Persistence)?;
        enter(CallbackStage::Persisted, platform);

        info!(
            user_id = %connection.user_id,
            platform = %platform,
            platform_user_id = %connection.platform_user_id,
            "Linked social account"
        );
        Ok(connection)
    }

    /// Open the state, then burn its nonce so it cannot be presented again.
    async fn validate_state(
        &self,
        platform: Platform,
        state: Option<&str>,
    ) -> Result<StateClaims, LinkError> {
        let state = state.ok_or(LinkError::Authentication(StateError::Missing))?;
        let now = Utc::now();
        let claims = self
            .state_codec
            .open(state, platform, now)
            .map_err(LinkError::Authentication)?;

        let first_use = self
            .nonces
            .consume(&claims.nonce, &claims.user_id, platform, claims.expires_at(), now)
            .await
            .map_err(LinkError::Persistence)?;
        if !first_use {
            return Err(LinkError::Authentication(StateError::Replayed));
        }
        Ok(claims)
    }

    /// Settings-page location reporting the outcome of a callback
    pub fn redirect_location(
        &self,
        platform: Platform,
        outcome: &Result<Connection, LinkError>,
    ) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("connection", platform.as_str());
        match outcome {
            Ok(_) => {
                query.append_pair("status", "success");
            }
            Err(err) => {
                warn!(
                    platform = %platform,
                    kind = err.kind(),
                    error = %err,
                    "Account linking failed"
                );
                query
                    .append_pair("status", "error")
                    .append_pair("message", &err.user_message());
            }
        }
        enter(CallbackStage::Redirected, platform);
        format!("{}?{}", self.config.settings_path, query.finish())
    }
}

fn enter(stage: CallbackStage, platform: Platform) {
    debug!(stage = %stage, platform = %platform, "Callback stage reached");
}

/// Normalize an exchanged grant into the record the store keeps.
pub fn assemble_connection(
    adapter: &dyn ProviderAdapter,
    user_id: &str,
    grant: TokenGrant,
    profile: PlatformProfile,
    now: DateTime<Utc>,
) -> NewConnection {
    let config = adapter.config();

    let scopes: BTreeSet<String> = match grant.granted_scopes {
        Some(granted) if !granted.is_empty() => granted.into_iter().collect(),
        _ => config.scopes.iter().cloned().collect(),
    };

    NewConnection {
        user_id: user_id.to_string(),
        platform: config.platform,
        platform_user_id: profile.platform_user_id,
        platform_user_name: profile.platform_user_name,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token.filter(|_| config.supports_refresh),
        expires_at: grant
            .expires_in_seconds
            .filter(|seconds| *seconds > 0)
            .map(|seconds| now + Duration::seconds(seconds)),
        scopes,
    }
}
