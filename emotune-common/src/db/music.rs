//! Catalog entry queries
//!
//! Lookups return entries in insertion order (SQLite rowid), which is the
//! order clients see in listing and search responses.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{MusicEntry, MusicFilter, MusicUpdate, NewMusicEntry};
use crate::{Emotion, Error, Result};

const MUSIC_COLUMNS: &str = "guid, uploader_id, public_id, music_link, mood_type, singer, \
                             title, description, uploaded_at, updated_at";

/// Catalog column that can be grouped on for distinct-value listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogField {
    MoodType,
    Singer,
}

impl CatalogField {
    fn column(self) -> &'static str {
        match self {
            CatalogField::MoodType => "mood_type",
            CatalogField::Singer => "singer",
        }
    }
}

#[derive(sqlx::FromRow)]
struct MusicRow {
    guid: String,
    uploader_id: String,
    public_id: String,
    music_link: String,
    mood_type: String,
    singer: String,
    title: String,
    description: String,
    uploaded_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<MusicRow> for MusicEntry {
    type Error = Error;

    fn try_from(row: MusicRow) -> Result<Self> {
        let mood_type: Emotion = row.mood_type.parse().map_err(|_| {
            Error::Internal(format!(
                "Music entry {} has unknown type '{}'",
                row.guid, row.mood_type
            ))
        })?;

        Ok(MusicEntry {
            id: row.guid,
            uploader_id: row.uploader_id,
            storage_public_id: row.public_id,
            audio_url: row.music_link,
            mood_type,
            singer: row.singer,
            title: row.title,
            description: row.description,
            uploaded_at: row.uploaded_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_entries(rows: Vec<MusicRow>) -> Result<Vec<MusicEntry>> {
    rows.into_iter().map(MusicEntry::try_from).collect()
}

/// Insert a new catalog entry and return it with its generated id
pub async fn insert_music(pool: &SqlitePool, new: &NewMusicEntry) -> Result<MusicEntry> {
    let entry = MusicEntry {
        id: Uuid::new_v4().to_string(),
        uploader_id: new.uploader_id.clone(),
        storage_public_id: new.storage_public_id.clone(),
        audio_url: new.audio_url.clone(),
        mood_type: new.mood_type,
        singer: new.singer.clone(),
        title: new.title.clone(),
        description: new.description.clone(),
        uploaded_at: Utc::now(),
        updated_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO music (guid, uploader_id, public_id, music_link, mood_type, singer,
                           title, description, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.uploader_id)
    .bind(&entry.storage_public_id)
    .bind(&entry.audio_url)
    .bind(entry.mood_type.as_str())
    .bind(&entry.singer)
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(entry.uploaded_at)
    .execute(pool)
    .await?;

    Ok(entry)
}

pub async fn find_music_by_id(pool: &SqlitePool, id: &str) -> Result<Option<MusicEntry>> {
    let row: Option<MusicRow> =
        sqlx::query_as(&format!("SELECT {} FROM music WHERE guid = ?", MUSIC_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    row.map(MusicEntry::try_from).transpose()
}

/// Find all entries matching `filter`, in insertion order
///
/// An empty filter matches the whole catalog.
pub async fn find_music(pool: &SqlitePool, filter: &MusicFilter) -> Result<Vec<MusicEntry>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM music WHERE 1 = 1", MUSIC_COLUMNS));

    if let Some(mood) = filter.mood_type {
        qb.push(" AND mood_type = ").push_bind(mood.as_str());
    }
    if let Some(singer) = &filter.singer {
        qb.push(" AND singer = ").push_bind(singer.clone());
    }
    qb.push(" ORDER BY rowid ASC");

    let rows = qb.build_query_as::<MusicRow>().fetch_all(pool).await?;
    into_entries(rows)
}

/// Apply a partial update, stamping `updated_at`
///
/// Returns the updated entry, or `None` when no entry has this id.
pub async fn update_music(
    pool: &SqlitePool,
    id: &str,
    update: &MusicUpdate,
) -> Result<Option<MusicEntry>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE music SET updated_at = ");
    qb.push_bind(Utc::now());

    if let Some(mood) = update.mood_type {
        qb.push(", mood_type = ").push_bind(mood.as_str());
    }
    if let Some(singer) = &update.singer {
        qb.push(", singer = ").push_bind(singer.clone());
    }
    if let Some(title) = &update.title {
        qb.push(", title = ").push_bind(title.clone());
    }
    if let Some(description) = &update.description {
        qb.push(", description = ").push_bind(description.clone());
    }
    qb.push(" WHERE guid = ").push_bind(id.to_string());

    let result = qb.build().execute(pool).await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find_music_by_id(pool, id).await
}

/// Delete an entry; returns whether a row was removed
pub async fn delete_music(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM music WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Distinct non-null values of a column, sorted ascending
pub async fn distinct_values(pool: &SqlitePool, field: CatalogField) -> Result<Vec<String>> {
    let column = field.column();
    let values: Vec<(String,)> = sqlx::query_as(&format!(
        "SELECT DISTINCT {col} FROM music WHERE {col} IS NOT NULL ORDER BY {col} ASC",
        col = column
    ))
    .fetch_all(pool)
    .await?;

    Ok(values.into_iter().map(|(v,)| v).collect())
}

/// Number of entries per mood type, keyed and ordered by type
pub async fn count_by_mood_type(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT mood_type, COUNT(*) FROM music GROUP BY mood_type ORDER BY mood_type ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

pub async fn count_music(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM music")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
