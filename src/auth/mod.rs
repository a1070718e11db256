//! # Authentication
//!
//! Bearer token validation for the HTTP transport: offline JWT sanity
//! checks, optional OIDC provider verification, and the axum authorization
//! middleware.

pub mod claims;
pub mod middleware;
pub mod oidc;

pub use claims::JwtClaims;
pub use middleware::{authorize, AuthState, CallerIdentity, TokenScopes};
pub use oidc::OidcProvider;
