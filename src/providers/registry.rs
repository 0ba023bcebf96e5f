//! Provider registry
//!
//! Immutable map from [`Platform`] to its adapter, built once from
//! configuration and shared through application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::config::{AppConfig, PlatformSettings};
use crate::providers::{
    AuthStyle, FacebookAdapter, InstagramAdapter, LinkedinAdapter, Platform, ProviderAdapter,
    ProviderConfig, ProviderMetadata, TwitterAdapter, facebook, instagram, linkedin, twitter,
};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{platform}' not found")]
    ProviderNotFound { platform: String },
    #[error("{platform} is enabled but {field} is not configured")]
    MissingCredential {
        platform: Platform,
        field: &'static str,
    },
    #[error("{platform} {field} '{value}' is not a valid URL")]
    InvalidEndpoint {
        platform: Platform,
        field: &'static str,
        value: String,
    },
}

/// Built-in endpoints and capabilities of a platform, before overrides
#[derive(Debug, Clone, Copy)]
pub struct ProviderDefaults {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub api_base: &'static str,
    pub scopes: &'static [&'static str],
    pub auth_style: AuthStyle,
    pub requires_pkce: bool,
    pub supports_refresh: bool,
}

impl ProviderDefaults {
    /// Merge configured credentials and overrides onto the defaults.
    pub fn resolve(
        &self,
        platform: Platform,
        settings: &PlatformSettings,
    ) -> Result<ProviderConfig, RegistryError> {
        let credential = |value: &Option<String>, field: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(RegistryError::MissingCredential { platform, field })
        };
        let endpoint = |value: &Option<String>, default: &str, field: &'static str| {
            let raw = value.as_deref().unwrap_or(default);
            Url::parse(raw).map_err(|_| RegistryError::InvalidEndpoint {
                platform,
                field,
                value: raw.to_string(),
            })
        };

        Ok(ProviderConfig {
            platform,
            client_id: credential(&settings.client_id, "client_id")?,
            client_secret: credential(&settings.client_secret, "client_secret")?,
            authorize_url: endpoint(&settings.authorize_url, self.authorize_url, "authorize_url")?,
            token_url: endpoint(&settings.token_url, self.token_url, "token_url")?,
            api_base: endpoint(&settings.api_base, self.api_base, "api_base")?,
            scopes: settings
                .scopes
                .clone()
                .filter(|scopes| !scopes.is_empty())
                .unwrap_or_else(|| self.scopes.iter().map(|s| s.to_string()).collect()),
            auth_style: self.auth_style,
            requires_pkce: self.requires_pkce,
            supports_refresh: self.supports_refresh,
        })
    }
}

/// Defaults for a platform
pub fn defaults_for(platform: Platform) -> &'static ProviderDefaults {
    match platform {
        Platform::Linkedin => &linkedin::DEFAULTS,
        Platform::Instagram => &instagram::DEFAULTS,
        Platform::Twitter => &twitter::DEFAULTS,
        Platform::Facebook => &facebook::DEFAULTS,
    }
}

/// Construct the adapter variant for a resolved configuration.
pub fn build_adapter(config: ProviderConfig) -> Arc<dyn ProviderAdapter> {
    match config.platform {
        Platform::Linkedin => Arc::new(LinkedinAdapter::new(config)),
        Platform::Instagram => Arc::new(InstagramAdapter::new(config)),
        Platform::Twitter => Arc::new(TwitterAdapter::new(config)),
        Platform::Facebook => Arc::new(FacebookAdapter::new(config)),
    }
}

/// Registry of enabled platform adapters
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<Platform, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the enabled platforms in configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for platform in Platform::ALL {
            if !config.is_enabled(platform) {
                if config.platform_settings.contains_key(&platform) {
                    warn!(
                        platform = %platform,
                        "Platform has settings but is not listed in LINKER_PLATFORMS; skipping"
                    );
                }
                continue;
            }

            let provider_config =
                defaults_for(platform).resolve(platform, &config.platform_settings(platform))?;
            registry.register(build_adapter(provider_config));
        }

        info!(
            platforms = ?registry.adapters.keys().collect::<Vec<_>>(),
            "Provider registry initialized"
        );
        Ok(registry)
    }

    /// Register an adapter, replacing any previous adapter for its platform
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    /// Get an adapter by platform
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn ProviderAdapter>, RegistryError> {
        self.adapters
            .get(&platform)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                platform: platform.to_string(),
            })
    }

    /// Resolve a platform name from a URL path segment
    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, RegistryError> {
        let platform = name
            .parse::<Platform>()
            .map_err(|_| RegistryError::ProviderNotFound {
                platform: name.to_string(),
            })?;
        self.get(platform)
    }

    /// Get metadata for all providers, sorted by name for stable ordering
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        let mut metadata: Vec<_> = self.adapters.values().map(|a| a.metadata()).collect();
        metadata.sort_by(|a, b| a.platform.as_str().cmp(b.platform.as_str()));
        metadata
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("platforms", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
