//! User account queries

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{NewUser, UserAccount};
use crate::{Error, Result};

const USER_COLUMNS: &str = "guid, username, email, password_hash, is_admin, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    guid: String,
    username: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        UserAccount {
            id: row.guid,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

/// Register a new (non-admin) account
///
/// Returns `Error::Conflict` when the email is already registered.
pub async fn insert_user(pool: &SqlitePool, new: &NewUser) -> Result<UserAccount> {
    let user = UserAccount {
        id: Uuid::new_v4().to_string(),
        username: new.username.clone(),
        email: new.email.clone(),
        password_hash: new.password_hash.clone(),
        is_admin: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO users (guid, username, email, password_hash, is_admin, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::Conflict(format!("User with email {} already exists", new.email))
        }
        other => Error::Database(other),
    })?;

    Ok(user)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserAccount>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(UserAccount::from))
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<UserAccount>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {} FROM users WHERE guid = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(UserAccount::from))
}

/// All accounts in registration order
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserAccount>> {
    let rows: Vec<UserRow> =
        sqlx::query_as(&format!("SELECT {} FROM users ORDER BY rowid ASC", USER_COLUMNS))
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(UserAccount::from).collect())
}

/// Accounts created in `[start, end)`
pub async fn find_users_created_between(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<UserAccount>> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE created_at >= ? AND created_at < ? ORDER BY created_at ASC",
        USER_COLUMNS
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(UserAccount::from).collect())
}

/// Set or clear the admin flag
///
/// Not reachable over HTTP; used by operators and tests.
pub async fn set_admin(pool: &SqlitePool, id: &str, is_admin: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET is_admin = ? WHERE guid = ?")
        .bind(is_admin)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an account; returns whether a row was removed
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
