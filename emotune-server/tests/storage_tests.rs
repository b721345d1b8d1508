//! Cloudinary client tests against a local stand-in for the upload API

mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use common::*;
use emotune_common::api::{hash_password, TokenKeys};
use emotune_common::db;
use emotune_common::models::{NewMusicEntry, NewUser};
use emotune_common::Emotion;
use emotune_server::storage::{CloudinaryStorage, MediaStorage, StorageError};
use emotune_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::util::ServiceExt;

#[derive(Clone)]
struct FakeCloud {
    destroy_result: &'static str,
    hits: Arc<Mutex<Vec<String>>>,
}

async fn fake_endpoint(
    State(cloud): State<FakeCloud>,
    Path((cloud_name, resource_type, action)): Path<(String, String, String)>,
) -> Json<Value> {
    cloud
        .hits
        .lock()
        .unwrap()
        .push(format!("{}/{}/{}", cloud_name, resource_type, action));

    match action.as_str() {
        "upload" => Json(json!({
            "public_id": "audio/track",
            "secure_url": "https://cdn.test/audio/track",
            "url": "http://cdn.test/audio/track",
        })),
        _ => Json(json!({ "result": cloud.destroy_result })),
    }
}

/// Serve the stand-in on an ephemeral port; returns a client for it and the request log
async fn fake_cloud(destroy_result: &'static str) -> (CloudinaryStorage, Arc<Mutex<Vec<String>>>) {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/v1_1/:cloud/:resource_type/:action", post(fake_endpoint))
        .with_state(FakeCloud {
            destroy_result,
            hits: hits.clone(),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let storage = CloudinaryStorage::new(format!("http://{}", addr), "demo", "key", "secret");
    (storage, hits)
}

#[tokio::test]
async fn test_upload_and_destroy_use_same_resource_type() {
    let (storage, hits) = fake_cloud("ok").await;

    let stored = storage
        .upload("track.mp3", b"ID3 fake audio".to_vec())
        .await
        .unwrap();
    assert_eq!(stored.public_id, "audio/track");
    assert_eq!(stored.url, "https://cdn.test/audio/track");

    storage.destroy(&stored.public_id).await.unwrap();

    assert_eq!(
        *hits.lock().unwrap(),
        vec!["demo/video/upload".to_string(), "demo/video/destroy".to_string()]
    );
}

#[tokio::test]
async fn test_destroy_of_missing_object_succeeds() {
    let (storage, _) = fake_cloud("not found").await;
    assert!(storage.destroy("audio/gone").await.is_ok());
}

#[tokio::test]
async fn test_destroy_reports_other_results() {
    let (storage, _) = fake_cloud("error").await;
    match storage.destroy("audio/track").await {
        Err(StorageError::DestroyFailed { public_id, result }) => {
            assert_eq!(public_id, "audio/track");
            assert_eq!(result, "error");
        }
        other => panic!("expected DestroyFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_route_removes_entry_whose_media_is_gone() {
    let (storage, hits) = fake_cloud("not found").await;

    let pool = db::init_memory_database().await.unwrap();
    let tokens = TokenKeys::new("test-secret", chrono::Duration::hours(1)).unwrap();
    let router = build_router(AppState::new(
        pool.clone(),
        tokens.clone(),
        Arc::new(FixedClassifier::predicting(Emotion::Happy)),
        Arc::new(storage),
        4,
    ));

    let admin = db::insert_user(
        &pool,
        &NewUser {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: hash_password(PASSWORD, 4).unwrap(),
        },
    )
    .await
    .unwrap();
    db::set_admin(&pool, &admin.id, true).await.unwrap();
    let token = tokens.issue(&admin.id).unwrap();

    let entry = db::insert_music(
        &pool,
        &NewMusicEntry {
            uploader_id: admin.id.clone(),
            storage_public_id: "audio/gone".to_string(),
            audio_url: "https://cdn.test/audio/gone".to_string(),
            mood_type: Emotion::Sad,
            singer: "Adele".to_string(),
            title: "Gone".to_string(),
            description: "Already removed upstream".to_string(),
        },
    )
    .await
    .unwrap();

    let response = router
        .oneshot(delete(&format!("/music/delete/{}", entry.id), Some(&token)))
        .await
        .unwrap();
    let (status, body) = read_json(response).await;

    assert_eq!(status, 200);
    assert_eq!(body["message"], "Music deleted successfully");
    assert_eq!(*hits.lock().unwrap(), vec!["demo/video/destroy".to_string()]);
    assert!(db::find_music_by_id(&pool, &entry.id).await.unwrap().is_none());
}
