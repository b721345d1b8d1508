//! HTTP API handlers for emotune-server

pub mod auth;
pub mod health;
pub mod json;
pub mod music;
pub mod users;

pub use auth::{AdminUser, AuthUser};
pub use health::health_routes;
pub use json::ApiJson;
pub use music::music_routes;
pub use users::user_routes;
