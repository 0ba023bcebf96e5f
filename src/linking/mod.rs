//! # Account Linking
//!
//! The two legs of the authorization-code flow: building the provider
//! redirect, and turning the provider's callback into a stored connection.

pub mod authorize;
pub mod callback;

pub use authorize::{
    AuthorizationRequest, AuthorizationRequestBuilder, AuthorizeError, validate_authorize_url,
};
pub use callback::{CallbackHandler, CallbackParams, CallbackStage, assemble_connection};
