//! Accounts: registration, login, bearer sessions, and profile edits.
//!
//! Passwords are stored as salted SHA-256 digests. Sessions are opaque
//! random tokens held in memory with a fixed lifetime; they do not
//! survive a restart.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{AccountStore, KeyedLocks};
use crate::types::{
    Account, AccountStatus, PlayerStats, ServiceError, ServiceResult, StoreError, UserView,
};

const MIN_PASSWORD_LEN: usize = 6;
const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Profile changes. Only `username` and `password` may be sent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// Parse a raw JSON body, reporting any unexpected key as a
    /// validation error rather than a decode failure.
    pub fn from_json(body: serde_json::Value) -> ServiceResult<Self> {
        let invalid = || ServiceError::Validation("Invalid update fields".into());
        let object = body.as_object().ok_or_else(invalid)?;
        if object.keys().any(|k| k != "username" && k != "password") {
            return Err(invalid());
        }
        serde_json::from_value(body).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub user: UserView,
    pub token: String,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Session {
    account_id: String,
    expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    locks: Arc<KeyedLocks>,
    sessions: RwLock<HashMap<String, Session>>,
    initial_balance: Decimal,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        locks: Arc<KeyedLocks>,
        initial_balance: Decimal,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            locks,
            sessions: RwLock::new(HashMap::new()),
            initial_balance,
            session_ttl: Duration::seconds(session_ttl_secs),
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<AuthOutcome> {
        let (Some(username), Some(password), Some(confirm)) =
            (req.username, req.password, req.confirm_password)
        else {
            return Err(ServiceError::Validation("All fields are required".into()));
        };
        if username.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(ServiceError::Validation("All fields are required".into()));
        }
        if password != confirm {
            return Err(ServiceError::Validation("Passwords do not match".into()));
        }
        validate_password(&password)?;
        let username = normalize_username(&username)?;

        let salt = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().simple().to_string(),
            username: username.clone(),
            password_hash: hash_password(&salt, &password),
            password_salt: salt,
            balance: self.initial_balance,
            stats: PlayerStats::default(),
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_account(account.clone()).await {
            Ok(()) => {}
            Err(StoreError::DuplicateUsername(_)) => {
                return Err(ServiceError::Conflict("Username already exists".into()))
            }
            Err(e) => return Err(e.into()),
        }

        info!(user = %account.username, balance = %account.balance, "Account registered");
        let token = self.issue_token(&account.id).await;
        Ok(AuthOutcome {
            user: account.view(),
            token,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<AuthOutcome> {
        let (Some(username), Some(password)) = (req.username, req.password) else {
            return Err(ServiceError::Validation(
                "Username and password are required".into(),
            ));
        };
        let bad_credentials = || ServiceError::Unauthorized("Invalid username or password".into());

        let account = self
            .store
            .account_by_username(&username.trim().to_lowercase())
            .await?
            .ok_or_else(bad_credentials)?;
        if !account.is_active() {
            return Err(ServiceError::Forbidden("Account is frozen".into()));
        }
        if hash_password(&account.password_salt, &password) != account.password_hash {
            debug!(user = %account.username, "Login failed: bad password");
            return Err(bad_credentials());
        }

        let token = self.issue_token(&account.id).await;
        info!(user = %account.username, "Login");
        Ok(AuthOutcome {
            user: account.view(),
            token,
        })
    }

    /// Resolve a bearer token to its account id.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<String> {
        let expired = || ServiceError::Unauthorized("Invalid or expired token".into());
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(s) if s.expires_at > now => return Ok(s.account_id.clone()),
                Some(_) => {}
                None => return Err(expired()),
            }
        }
        self.sessions.write().await.remove(token);
        Err(expired())
    }

    pub async fn profile(&self, account_id: &str) -> ServiceResult<UserView> {
        Ok(self.load(account_id).await?.view())
    }

    pub async fn update_profile(&self, account_id: &str, update: ProfileUpdate) -> ServiceResult<UserView> {
        let _guard = self.locks.lock(account_id).await;
        let mut account = self.load(account_id).await?;

        if let Some(password) = update.password {
            validate_password(&password)?;
            account.password_salt = Uuid::new_v4().simple().to_string();
            account.password_hash = hash_password(&account.password_salt, &password);
        }
        if let Some(username) = update.username {
            account.username = normalize_username(&username)?;
        }
        account.updated_at = Utc::now();

        match self.store.save_account(&account).await {
            Ok(()) => {}
            Err(StoreError::DuplicateUsername(_)) => {
                return Err(ServiceError::Conflict("Username already exists".into()))
            }
            Err(e) => return Err(e.into()),
        }
        info!(user = %account.username, "Profile updated");
        Ok(account.view())
    }

    /// Drop expired sessions. Returns how many were removed.
    pub async fn prune_sessions(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    async fn load(&self, account_id: &str) -> ServiceResult<Account> {
        self.store
            .account(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    async fn issue_token(&self, account_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(
            token.clone(),
            Session {
                account_id: account_id.to_string(),
                expires_at: Utc::now() + self.session_ttl,
            },
        );
        token
    }
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

fn normalize_username(username: &str) -> ServiceResult<String> {
    let username = username.trim().to_lowercase();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ServiceError::Validation(format!(
            "Username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(username)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
