//! Catalog and account models
//!
//! Field names on the wire follow the existing frontend contract
//! (`_id`, `user_id`, `public_id`, `music_link`, `type`), so the Rust
//! names are mapped with serde renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Emotion;

/// One uploaded audio track and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicEntry {
    #[serde(rename = "_id")]
    pub id: String,
    /// Account that uploaded the track
    #[serde(rename = "user_id")]
    pub uploader_id: String,
    /// Identifier of the audio object in external storage
    #[serde(rename = "public_id")]
    pub storage_public_id: String,
    /// Public URL of the audio object
    #[serde(rename = "music_link")]
    pub audio_url: String,
    #[serde(rename = "type")]
    pub mood_type: Emotion,
    pub singer: String,
    pub title: String,
    pub description: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields required to create a catalog entry
#[derive(Debug, Clone)]
pub struct NewMusicEntry {
    pub uploader_id: String,
    pub storage_public_id: String,
    pub audio_url: String,
    pub mood_type: Emotion,
    pub singer: String,
    pub title: String,
    pub description: String,
}

/// Partial update of a catalog entry; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MusicUpdate {
    pub mood_type: Option<Emotion>,
    pub singer: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl MusicUpdate {
    pub fn is_empty(&self) -> bool {
        self.mood_type.is_none()
            && self.singer.is_none()
            && self.title.is_none()
            && self.description.is_none()
    }
}

/// Filter for catalog lookups; every `Some` field must match exactly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MusicFilter {
    pub mood_type: Option<Emotion>,
    pub singer: Option<String>,
}

/// Registered user account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to register an account
///
/// New accounts are never admins; the flag is only set out of band.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
