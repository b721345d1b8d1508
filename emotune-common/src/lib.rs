//! # Emotune Common Library
//!
//! Shared code for the Emotune music catalog service:
//! - Catalog store (music entries and user accounts over SQLite)
//! - Domain models and the closed set of emotion labels
//! - Password hashing and bearer token primitives
//! - Bootstrap configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod mood;

pub use error::{Error, Result};
pub use mood::Emotion;
