//! Catalog store
//!
//! Typed queries over the `music` and `users` tables. Each function takes the
//! pool explicitly; per-row atomicity is left to SQLite.

pub mod init;
pub mod music;
pub mod users;

pub use init::*;
pub use music::*;
pub use users::*;

use crate::Result;
use sqlx::SqlitePool;

/// Round-trip a trivial query to confirm the database is reachable
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
