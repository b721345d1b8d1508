//! Authentication primitives shared by HTTP handlers
//!
//! Pure functions only: password hashing and bearer token issue/validation.
//! The axum extractors that enforce them live in the server crate.

pub mod auth;

pub use auth::{hash_password, verify_password, AuthError, Claims, TokenKeys};
