//! Account endpoints: registration, login, profile and admin listings

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use emotune_common::api::{hash_password, verify_password};
use emotune_common::db;
use emotune_common::models::{NewUser, UserAccount};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::{AdminUser, AuthUser};
use super::json::ApiJson;
use super::music::{parse_id, MessageResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Registrations per calendar month, serialized January through December
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MonthlyRegistrations {
    pub january: i64,
    pub february: i64,
    pub march: i64,
    pub april: i64,
    pub may: i64,
    pub june: i64,
    pub july: i64,
    pub august: i64,
    pub september: i64,
    pub october: i64,
    pub november: i64,
    pub december: i64,
}

impl From<[i64; 12]> for MonthlyRegistrations {
    fn from(c: [i64; 12]) -> Self {
        Self {
            january: c[0],
            february: c[1],
            march: c[2],
            april: c[3],
            may: c[4],
            june: c[5],
            july: c[6],
            august: c[7],
            september: c[8],
            october: c[9],
            november: c[10],
            december: c[11],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub message: String,
    pub year: i32,
    pub monthly_registrations: MonthlyRegistrations,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserAccount>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /user/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let (Some(username), Some(password), Some(email)) = (
        non_empty(request.username),
        non_empty(request.password),
        non_empty(request.email),
    ) else {
        warn!("Registration rejected: missing fields");
        return Err(ApiError::BadRequest("Missing fields".to_string()));
    };
    let email = email.trim().to_string();

    if db::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let cost = state.password_cost;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))??;

    let user = db::insert_user(
        &state.db,
        &NewUser {
            username,
            email,
            password_hash,
        },
    )
    .await
    .map_err(|e| match e {
        // Lost a race with a concurrent registration
        emotune_common::Error::Conflict(_) => ApiError::Conflict("User already exists".to_string()),
        other => other.into(),
    })?;

    info!("Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// POST /user/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (Some(email), Some(password)) = (non_empty(request.email), non_empty(request.password))
    else {
        return Err(ApiError::BadRequest("Missing credentials".to_string()));
    };

    let user = db::find_user_by_email(&state.db, email.trim()).await?;

    let verified = match user {
        Some(user) => {
            let hash = user.password_hash.clone();
            let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(|e| ApiError::Internal(format!("password check task failed: {}", e)))?;
            ok.then_some(user)
        }
        None => None,
    };

    let Some(user) = verified else {
        warn!("Failed login for {}", email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    let access_token = state
        .tokens
        .issue(&user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        access_token,
        message: "Login successful".to_string(),
    }))
}

/// POST /user/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(_user: AuthUser) -> Json<MessageResponse> {
    MessageResponse::new("Logout successful")
}

/// GET /user/profile
pub async fn profile(
    State(state): State<AppState>,
    AuthUser { user_id }: AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = db::find_user_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email.trim().to_string(),
        is_admin: user.is_admin,
    }))
}

/// Count registrations per calendar month of `year`
pub async fn monthly_registrations(
    pool: &sqlx::SqlitePool,
    year: i32,
) -> ApiResult<[i64; 12]> {
    let start = year_start(year)?;
    let end = year_start(year + 1)?;

    let mut counts = [0i64; 12];
    for user in db::find_users_created_between(pool, start, end).await? {
        counts[user.created_at.month0() as usize] += 1;
    }
    Ok(counts)
}

fn year_start(year: i32) -> ApiResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ApiError::Internal(format!("invalid year {}", year)))
}

/// GET /user/stats
pub async fn user_stats(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<UserStatsResponse>> {
    let year = Utc::now().year();
    let counts = monthly_registrations(&state.db, year).await?;

    Ok(Json(UserStatsResponse {
        message: "Monthly user registration stats retrieved successfully".to_string(),
        year,
        monthly_registrations: counts.into(),
    }))
}

/// GET /user/all
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<UsersResponse>> {
    let users = db::list_users(&state.db).await?;
    Ok(Json(UsersResponse { users }))
}

/// DELETE /user/delete/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser { user: admin }: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "Invalid user ID provided.")?;

    if !db::delete_user(&state.db, &id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!("User {} deleted by {}", id, admin.id);
    Ok(MessageResponse::new("User deleted successfully"))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/profile", get(profile))
        .route("/user/stats", get(user_stats))
        .route("/user/all", get(list_users))
        .route("/user/delete/:id", delete(delete_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_registrations_serialize_in_calendar_order() {
        let mut counts = [0i64; 12];
        counts[0] = 3;
        counts[11] = 1;

        let json = serde_json::to_string(&MonthlyRegistrations::from(counts)).unwrap();
        assert!(json.starts_with("{\"January\":3,\"February\":0"));
        assert!(json.ends_with("\"December\":1}"));
    }

    #[test]
    fn test_year_start() {
        assert_eq!(year_start(2024).unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
