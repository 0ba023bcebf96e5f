//! # Data Models
//!
//! SeaORM entities and shared API response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod connection;
pub mod oauth_state_nonce;

pub use connection::Entity as SocialConnection;
pub use oauth_state_nonce::Entity as OAuthStateNonce;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "social-linker".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
