//! Shared test harness: a scripted die and a request helper.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use dicebet::api::{build_router, AppContext};
use dicebet::config::AppConfig;
use dicebet::game::DiceRoller;
use dicebet::storage::MemoryStore;

pub const ADMIN_TOKEN: &str = "integration-admin";

/// Die that yields a fixed script of faces, then repeats the last one.
#[derive(Clone)]
pub struct ScriptedDice {
    faces: Arc<Mutex<VecDeque<u8>>>,
    last: Arc<Mutex<u8>>,
    rolls: Arc<Mutex<usize>>,
}

impl ScriptedDice {
    pub fn new(faces: &[u8]) -> Self {
        Self {
            faces: Arc::new(Mutex::new(faces.iter().copied().collect())),
            last: Arc::new(Mutex::new(faces.last().copied().unwrap_or(1))),
            rolls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of times the die has been rolled.
    pub fn rolls(&self) -> usize {
        *self.rolls.lock().unwrap()
    }
}

impl DiceRoller for ScriptedDice {
    fn roll(&self) -> u8 {
        *self.rolls.lock().unwrap() += 1;
        let mut last = self.last.lock().unwrap();
        if let Some(face) = self.faces.lock().unwrap().pop_front() {
            *last = face;
        }
        *last
    }
}

pub struct TestApp {
    pub router: Router,
    pub dice: ScriptedDice,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(faces: &[u8]) -> Self {
        Self::with_store(faces, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(faces: &[u8], store: Arc<MemoryStore>) -> Self {
        let mut cfg = AppConfig::default();
        cfg.accounts.admin_token = Some(SecretString::new(ADMIN_TOKEN.into()));
        let dice = ScriptedDice::new(faces);
        let state = Arc::new(AppContext::new(&cfg, store.clone(), Arc::new(dice.clone())).unwrap());
        Self {
            router: build_router(state),
            dice,
            store,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register a player and return `(bearer header value, user id)`.
    pub async fn register(&self, username: &str) -> (String, String) {
        let (status, json) = self
            .send(
                Method::POST,
                "/api/users/register",
                &[],
                Some(serde_json::json!({
                    "username": username,
                    "password": "hunter22",
                    "confirmPassword": "hunter22",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        (
            format!("Bearer {}", json["token"].as_str().unwrap()),
            json["user"]["_id"].as_str().unwrap().to_string(),
        )
    }
}

/// Read a JSON number as f64 (money serialises as a float).
pub fn num(v: &Value) -> f64 {
    v.as_f64().unwrap_or_else(|| panic!("not a number: {v}"))
}
