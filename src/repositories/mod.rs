//! # Repository Layer
//!
//! SeaORM implementations of the persistence seams in [`crate::store`].

pub mod connection;
pub mod oauth_state;

pub use connection::ConnectionRepository;
pub use oauth_state::OAuthStateRepository;
