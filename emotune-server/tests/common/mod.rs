//! Shared fixtures for router tests: in-memory catalog, fixed classifier,
//! recording media storage.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use emotune_common::api::{hash_password, TokenKeys};
use emotune_common::db;
use emotune_common::models::{MusicEntry, NewMusicEntry, NewUser, UserAccount};
use emotune_common::Emotion;
use emotune_server::emotion::{encode_data_url, ClassifierError, EmotionClassifier};
use emotune_server::storage::{MediaStorage, StorageError, StoredMedia};
use emotune_server::{build_router, AppState};
use http_body_util::BodyExt;
use ndarray::Array3;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "correct horse";

/// Classifier that always returns the same scores
pub struct FixedClassifier(pub Vec<f32>);

impl FixedClassifier {
    /// Scores with all weight on `mood`
    pub fn predicting(mood: Emotion) -> Self {
        let mut scores = vec![0.0; Emotion::COUNT];
        scores[mood.index()] = 1.0;
        Self(scores)
    }
}

impl EmotionClassifier for FixedClassifier {
    fn predict(&self, input: &Array3<f32>) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(input.shape(), &[1, 128, 128]);
        Ok(self.0.clone())
    }
}

/// Storage call, in the order received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Upload(String),
    Destroy(String),
}

/// In-memory storage that records calls and can be told to fail destroys
#[derive(Default)]
pub struct RecordingStorage {
    pub calls: Mutex<Vec<StorageCall>>,
    pub fail_destroy: bool,
}

impl RecordingStorage {
    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStorage for RecordingStorage {
    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<StoredMedia, StorageError> {
        let public_id = format!("audio/{}", file_name);
        self.calls
            .lock()
            .unwrap()
            .push(StorageCall::Upload(public_id.clone()));
        Ok(StoredMedia {
            url: format!("https://cdn.test/{}", public_id),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StorageError> {
        self.calls
            .lock()
            .unwrap()
            .push(StorageCall::Destroy(public_id.to_string()));
        if self.fail_destroy {
            return Err(StorageError::DestroyFailed {
                public_id: public_id.to_string(),
                result: "error".to_string(),
            });
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub tokens: TokenKeys,
    pub storage: Arc<RecordingStorage>,
}

impl TestApp {
    pub async fn new(classifier: FixedClassifier) -> Self {
        Self::with_storage(classifier, RecordingStorage::default()).await
    }

    pub async fn with_storage(classifier: FixedClassifier, storage: RecordingStorage) -> Self {
        let db = db::init_memory_database().await.unwrap();
        let tokens = TokenKeys::new("test-secret", chrono::Duration::hours(1)).unwrap();
        let storage = Arc::new(storage);

        let state = AppState::new(
            db.clone(),
            tokens.clone(),
            Arc::new(classifier),
            storage.clone(),
            4,
        );

        Self {
            router: build_router(state),
            db,
            tokens,
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    pub async fn user(&self, email: &str, is_admin: bool) -> (UserAccount, String) {
        let user = db::insert_user(
            &self.db,
            &NewUser {
                username: email.split('@').next().unwrap().to_string(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD, 4).unwrap(),
            },
        )
        .await
        .unwrap();
        if is_admin {
            db::set_admin(&self.db, &user.id, true).await.unwrap();
        }
        let token = self.tokens.issue(&user.id).unwrap();
        (user, token)
    }

    pub async fn music(&self, mood: Emotion, singer: &str, title: &str) -> MusicEntry {
        db::insert_music(
            &self.db,
            &NewMusicEntry {
                uploader_id: "admin".to_string(),
                storage_public_id: format!("audio/{}", title),
                audio_url: format!("https://cdn.test/audio/{}", title),
                mood_type: mood,
                singer: singer.to_string(),
                title: title.to_string(),
                description: format!("{} by {}", title, singer),
            },
        )
        .await
        .unwrap()
    }
}

pub async fn read_json(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("DELETE").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_token(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

pub const BOUNDARY: &str = "emotune-test-boundary";

/// Build a multipart/form-data request body
pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: audio/mpeg\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(body: Vec<u8>, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/music/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// A small PNG selfie as a data-URL
pub fn selfie_data_url() -> String {
    let img = image::RgbImage::from_fn(40, 30, |x, y| image::Rgb([(x * 6) as u8, (y * 8) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    encode_data_url(&buf.into_inner(), "image/png")
}
