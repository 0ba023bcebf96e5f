//! First leg of the flow: the provider authorize redirect.

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::info;
use url::{Host, Url};

use crate::auth::AuthenticatedUser;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::providers::{AdapterError, Platform, ProviderRegistry, RegistryError};
use crate::state_token::{StateCodec, StateError, generate_pkce};

const MAX_AUTHORIZE_URL_LEN: usize = 2048;

/// Errors raised while building an authorize redirect
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("adapter could not build authorize URL: {0}")]
    Adapter(#[from] AdapterError),
    #[error("could not issue state: {0}")]
    State(#[from] StateError),
    #[error("generated authorize URL is invalid: {0}")]
    InvalidUrl(&'static str),
}

impl From<AuthorizeError> for ApiError {
    fn from(error: AuthorizeError) -> Self {
        match error {
            AuthorizeError::Registry(err) => err.into(),
            AuthorizeError::InvalidUrl(reason) => {
                tracing::error!(reason, "Adapter produced an invalid authorize URL");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    format!("Adapter bug: {}", reason),
                )
            }
            other => {
                tracing::error!(error = %other, "Failed to build authorize URL");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Failed to generate authorization URL",
                )
            }
        }
    }
}

/// A ready-to-follow authorize redirect
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub platform: Platform,
    pub url: Url,
}

/// Builds provider authorize URLs bound to the signed-in user
#[derive(Clone)]
pub struct AuthorizationRequestBuilder {
    registry: Arc<ProviderRegistry>,
    state_codec: Arc<StateCodec>,
    config: Arc<AppConfig>,
}

impl AuthorizationRequestBuilder {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        state_codec: Arc<StateCodec>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            registry,
            state_codec,
            config,
        }
    }

    /// Build the redirect for `user` to link `platform_name`.
    ///
    /// PKCE platforms get a fresh verifier sealed into the state; only the
    /// challenge appears in the URL.
    pub fn build(
        &self,
        user: &AuthenticatedUser,
        platform_name: &str,
    ) -> Result<AuthorizationRequest, AuthorizeError> {
        let adapter = self.registry.get_by_name(platform_name)?;
        let platform = adapter.platform();

        let pkce = adapter.config().requires_pkce.then(generate_pkce);
        let state = self.state_codec.issue(
            &user.user_id,
            platform,
            pkce.as_ref().map(|pair| pair.verifier.clone()),
        )?;

        let redirect_uri = self.config.redirect_uri(platform);
        let url = adapter.authorize_url(
            &redirect_uri,
            &state,
            pkce.as_ref().map(|pair| pair.challenge.as_str()),
        )?;
        validate_authorize_url(&url)?;

        info!(
            user_id = %user.user_id,
            platform = %platform,
            pkce = pkce.is_some(),
            "Authorization flow initiated"
        );

        Ok(AuthorizationRequest { platform, url })
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// HTTPS (or loopback HTTP), no fragment, bounded length
pub fn validate_authorize_url(url: &Url) -> Result<(), AuthorizeError> {
    match url.scheme() {
        "https" => {}
        "http" if is_loopback(url) => {}
        _ => return Err(AuthorizeError::InvalidUrl("authorize URL must use HTTPS")),
    }

    // RFC 6749 section 3.1
    if url.fragment().is_some() {
        return Err(AuthorizeError::InvalidUrl(
            "authorize URL must not include a fragment",
        ));
    }

    if url.as_str().len() > MAX_AUTHORIZE_URL_LEN {
        return Err(AuthorizeError::InvalidUrl(
            "authorize URL exceeds 2048 characters",
        ));
    }

    Ok(())
}
