//! Music catalog endpoints
//!
//! `/music/getimg` is public: it classifies a selfie and returns songs for
//! the detected mood. Catalog mutation and listing are admin-only; the
//! distinct type/singer listings are public.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use emotune_common::db::{self, CatalogField};
use emotune_common::models::{MusicEntry, MusicFilter, MusicUpdate, NewMusicEntry};
use emotune_common::Emotion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::auth::AdminUser;
use super::json::ApiJson;
use crate::emotion::{self, MoodMatch};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of `POST /music/getimg`
#[derive(Debug, Deserialize)]
pub struct ImageSearchRequest {
    /// `<header>,<base64-payload>`
    pub image: Option<String>,
    pub singer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MusicListResponse {
    pub data: Vec<MusicEntry>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub music_link: String,
}

/// Body of `PUT /music/update/:id`; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct MusicUpdateRequest {
    pub musictype: Option<String>,
    pub singer: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub music: MusicEntry,
}

#[derive(Debug, Serialize)]
pub struct TypesResponse {
    pub music_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SingersResponse {
    pub music_singers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_songs: i64,
    pub music_stats: BTreeMap<String, i64>,
}

/// Parse a path id, normalizing it to the stored form
pub(crate) fn parse_id(raw: &str, message: &str) -> ApiResult<String> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::BadRequest(message.to_string()))
}

fn parse_mood(raw: &str) -> ApiResult<Emotion> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid music type".to_string()))
}

/// POST /music/getimg
pub async fn search_by_image(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImageSearchRequest>,
) -> ApiResult<Json<MusicListResponse>> {
    let image = request
        .image
        .ok_or_else(|| ApiError::BadRequest("No image data provided.".to_string()))?;

    let input = emotion::decode_data_url(&image)?;
    let mood = emotion::classify(state.classifier.clone(), input).await?;
    debug!("Detected mood {}", mood);

    match emotion::music_for_mood(&state.db, mood, request.singer.as_deref()).await? {
        MoodMatch::Found(data) => Ok(Json(MusicListResponse { data })),
        MoodMatch::NoMusic(mood) => Err(ApiError::NoMusicForMood(mood)),
    }
}

/// Fields collected from the upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    musictype: Option<String>,
    singer: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.file = Some((file_name, bytes.to_vec()));
                continue;
            }

            let slot = match name.as_str() {
                "musictype" => &mut form.musictype,
                "singer" => &mut form.singer,
                "title" => &mut form.title,
                "description" => &mut form.description,
                _ => continue,
            };
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            *slot = Some(text.trim().to_string()).filter(|s| !s.is_empty());
        }

        Ok(form)
    }
}

/// POST /music/upload
///
/// Stores the file externally, then records the entry. If the entry cannot
/// be recorded the stored object is destroyed again.
pub async fn upload(
    State(state): State<AppState>,
    AdminUser { user }: AdminUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(|_| ApiError::BadRequest("No file part".to_string()))?;
    let form = UploadForm::read(multipart).await?;

    let (file_name, bytes) = form
        .file
        .ok_or_else(|| ApiError::BadRequest("No file part".to_string()))?;
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("No selected file".to_string()));
    }

    let (Some(musictype), Some(singer), Some(title), Some(description)) =
        (form.musictype, form.singer, form.title, form.description)
    else {
        return Err(ApiError::BadRequest("Missing fields".to_string()));
    };
    let mood_type = parse_mood(&musictype)?;

    let stored = state.storage.upload(&file_name, bytes).await?;

    let new = NewMusicEntry {
        uploader_id: user.id,
        storage_public_id: stored.public_id.clone(),
        audio_url: stored.url,
        mood_type,
        singer,
        title,
        description,
    };

    match db::insert_music(&state.db, &new).await {
        Ok(entry) => {
            info!("Added music {} ({}) by {}", entry.id, entry.title, entry.uploader_id);
            Ok(Json(UploadResponse {
                message: "Music uploaded successfully".to_string(),
                music_link: entry.audio_url,
            }))
        }
        Err(e) => {
            if let Err(cleanup) = state.storage.destroy(&stored.public_id).await {
                error!(
                    "Failed to remove media {} after insert failure: {}",
                    stored.public_id, cleanup
                );
            }
            Err(e.into())
        }
    }
}

/// DELETE /music/delete/:id
///
/// The external object goes first; if that fails the entry is kept.
pub async fn delete_music(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "Invalid music ID provided.")?;

    let entry = db::find_music_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Music not found".to_string()))?;

    state.storage.destroy(&entry.storage_public_id).await?;

    if !db::delete_music(&state.db, &id).await? {
        return Err(ApiError::NotFound("Music not found".to_string()));
    }

    info!("Deleted music {} ({})", id, entry.title);
    Ok(MessageResponse::new("Music deleted successfully"))
}

/// GET /music/all
pub async fn list_music(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<MusicEntry>>> {
    let entries = db::find_music(&state.db, &MusicFilter::default()).await?;
    Ok(Json(entries))
}

/// PUT /music/update/:id
pub async fn update_music(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<MusicUpdateRequest>,
) -> ApiResult<Json<UpdateResponse>> {
    let id = parse_id(&id, "Invalid music ID provided.")?;

    if db::find_music_by_id(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound("Music not found".to_string()));
    }

    let update = MusicUpdate {
        mood_type: request.musictype.as_deref().map(parse_mood).transpose()?,
        singer: request.singer,
        title: request.title,
        description: request.description,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No changes provided.".to_string()));
    }

    let music = db::update_music(&state.db, &id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Music not found".to_string()))?;

    info!("Updated music {}", id);
    Ok(Json(UpdateResponse {
        message: "Music updated successfully".to_string(),
        music,
    }))
}

/// GET /music/types
pub async fn music_types(State(state): State<AppState>) -> ApiResult<Json<TypesResponse>> {
    let music_types = db::distinct_values(&state.db, CatalogField::MoodType).await?;
    Ok(Json(TypesResponse { music_types }))
}

/// GET /music/singers
pub async fn music_singers(State(state): State<AppState>) -> ApiResult<Json<SingersResponse>> {
    let music_singers = db::distinct_values(&state.db, CatalogField::Singer).await?;
    Ok(Json(SingersResponse { music_singers }))
}

/// GET /music/stats
pub async fn music_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<StatsResponse>> {
    let music_stats = db::count_by_mood_type(&state.db).await?;
    let total_songs = db::count_music(&state.db).await?;
    Ok(Json(StatsResponse {
        total_songs,
        music_stats,
    }))
}

pub fn music_routes() -> Router<AppState> {
    Router::new()
        .route("/music/getimg", post(search_by_image))
        .route("/music/upload", post(upload))
        .route("/music/delete/:id", delete(delete_music))
        .route("/music/all", get(list_music))
        .route("/music/update/:id", put(update_music))
        .route("/music/types", get(music_types))
        .route("/music/singers", get(music_singers))
        .route("/music/stats", get(music_stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_normalizes_case() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(parse_id(&id.to_uppercase(), "bad").unwrap(), id);
        assert!(matches!(
            parse_id("not-a-uuid", "bad"),
            Err(ApiError::BadRequest(msg)) if msg == "bad"
        ));
    }

    #[test]
    fn test_parse_mood() {
        assert_eq!(parse_mood("Happy").unwrap(), Emotion::Happy);
        assert!(parse_mood("ecstatic").is_err());
    }
}
