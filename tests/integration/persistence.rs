//! Snapshot round trip: state survives a restart, sessions do not.

use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;

use dicebet::storage::{self, MemoryStore};

use crate::harness::{num, TestApp};

#[tokio::test]
async fn test_store_survives_restart() {
    let path = std::env::temp_dir().join(format!("dicebet-snapshot-{}.json", uuid::Uuid::new_v4()));
    let path = path.to_str().unwrap().to_string();

    let app = TestApp::new(&[3]);
    let (bearer, _) = app.register("heidi").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/game/roll",
            &[("authorization", bearer.as_str())],
            Some(json!({ "betAmount": 20, "betOption": "small", "multiplier": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    storage::save_snapshot(&app.store.snapshot().await, &path).unwrap();
    let restored = storage::load_snapshot(&path).unwrap().expect("snapshot exists");
    storage::delete_snapshot(&path).unwrap();

    let app = TestApp::with_store(&[1], Arc::new(MemoryStore::from_snapshot(restored)));

    // Sessions are process-local.
    let (status, _) = app
        .send(Method::GET, "/api/users/profile", &[("authorization", bearer.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/users/login",
            &[],
            Some(json!({ "username": "heidi", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(num(&json["user"]["balance"]), 139.0);
    assert_eq!(json["user"]["totalWins"], 1);

    let bearer = format!("Bearer {}", json["token"].as_str().unwrap());
    let (_, json) = app
        .send(Method::GET, "/api/game/history", &[("authorization", bearer.as_str())], None)
        .await;
    assert_eq!(json["records"].as_array().unwrap().len(), 1);
    assert_eq!(json["records"][0]["betOption"], "small");
}

#[tokio::test]
async fn test_missing_snapshot_is_fresh_start() {
    let path = std::env::temp_dir().join(format!("dicebet-missing-{}.json", uuid::Uuid::new_v4()));
    assert!(storage::load_snapshot(path.to_str().unwrap()).unwrap().is_none());
}
