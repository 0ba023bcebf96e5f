//! Social platform adapters
//!
//! One adapter per supported platform, all behind [`ProviderAdapter`], plus
//! the registry that resolves a [`Platform`] to its adapter.

pub mod adapter;
pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod metadata;
pub mod registry;
pub mod twitter;

pub use adapter::{AdapterError, PlatformProfile, ProviderAdapter, ProviderConfig, TokenGrant};
pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedinAdapter;
pub use metadata::{AuthStyle, Platform, ProviderMetadata, UnknownPlatform};
pub use registry::{ProviderDefaults, ProviderRegistry, RegistryError};
pub use twitter::TwitterAdapter;
