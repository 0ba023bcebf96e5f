//! # Social Linker Library
//!
//! Links users' social platform accounts through OAuth: provider adapters,
//! the authorize/callback flow, encrypted connection storage, and the HTTP
//! API around them.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http_client;
pub mod linking;
pub mod models;
pub mod providers;
pub mod repositories;
pub mod server;
pub mod state_token;
pub mod store;
pub mod telemetry;
pub use migration;
