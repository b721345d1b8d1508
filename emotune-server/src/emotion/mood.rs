//! Detected emotion to catalog lookup

use emotune_common::db;
use emotune_common::models::{MusicEntry, MusicFilter};
use emotune_common::{Emotion, Result};
use sqlx::SqlitePool;

/// Outcome of looking up music for a detected mood
#[derive(Debug, Clone, PartialEq)]
pub enum MoodMatch {
    /// Matching entries in catalog order; never empty
    Found(Vec<MusicEntry>),
    /// Nothing matched; carries the mood that was detected
    NoMusic(Emotion),
}

/// Build the catalog filter for a mood and an optional singer
///
/// The singer only constrains the query when it is non-empty after trimming.
pub fn mood_filter(mood: Emotion, singer: Option<&str>) -> MusicFilter {
    let singer = singer
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    MusicFilter {
        mood_type: Some(mood),
        singer,
    }
}

/// Find catalog entries whose type is `mood` (and singer, if given)
pub async fn music_for_mood(
    pool: &SqlitePool,
    mood: Emotion,
    singer: Option<&str>,
) -> Result<MoodMatch> {
    let entries = db::find_music(pool, &mood_filter(mood, singer)).await?;

    if entries.is_empty() {
        Ok(MoodMatch::NoMusic(mood))
    } else {
        Ok(MoodMatch::Found(entries))
    }
}
