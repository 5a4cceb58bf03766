//! API route handlers.
//!
//! All endpoints return JSON with a `message` field. State is shared via
//! `Arc<AppContext>`.

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::{AdminUser, AuthUser};
use super::error::{ApiJson, ApiQuery};
use crate::accounts::{AccountService, LoginRequest, ProfileUpdate, RegisterRequest};
use crate::config::AppConfig;
use crate::game::service::GameService;
use crate::game::DiceRoller;
use crate::leaderboard::Leaderboard;
use crate::storage::{AccountStore, KeyedLocks};
use crate::transactions::{
    DepositRequest, HistoryQuery, PageQuery, ProcessRequest, TransactionService, WithdrawRequest,
};
use crate::types::{BetRequest, ServiceResult};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Services reachable from every handler.
pub struct AppContext {
    pub games: GameService,
    pub accounts: AccountService,
    pub transactions: TransactionService,
    pub leaderboard: Leaderboard,
    pub admin_token: Option<SecretString>,
    /// Origin allowed by CORS.
    pub client_origin: HeaderValue,
}

impl AppContext {
    /// Wire the services over one store and one lock table. Fails when the
    /// client URL cannot be sent as an `Access-Control-Allow-Origin` value.
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn AccountStore>,
        roller: Arc<dyn DiceRoller>,
    ) -> anyhow::Result<Self> {
        let client_origin = cfg
            .server
            .client_url
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid client URL {:?}", cfg.server.client_url))?;
        let locks = Arc::new(KeyedLocks::new());
        Ok(Self {
            games: GameService::new(cfg.game_config(), store.clone(), locks.clone(), roller),
            accounts: AccountService::new(
                store.clone(),
                locks.clone(),
                cfg.accounts.initial_balance,
                cfg.accounts.session_ttl_secs,
            ),
            transactions: TransactionService::new(store.clone(), locks, cfg.transactions.clone()),
            leaderboard: Leaderboard::new(store),
            admin_token: cfg.accounts.admin_token.clone(),
            client_origin,
        })
    }
}

pub type AppState = Arc<AppContext>;

type ApiResult = ServiceResult<Json<Value>>;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// POST /api/users/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ServiceResult<(StatusCode, Json<Value>)> {
    let out = state.accounts.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": out.user, "token": out.token })),
    ))
}

/// POST /api/users/login
pub async fn login(State(state): State<AppState>, ApiJson(req): ApiJson<LoginRequest>) -> ApiResult {
    let out = state.accounts.login(req).await?;
    Ok(Json(json!({ "message": "Login successful", "user": out.user, "token": out.token })))
}

/// GET /api/users/profile
pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let profile = state.accounts.profile(&user.account_id).await?;
    Ok(Json(json!({ "message": "Profile retrieved successfully", "user": profile })))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult {
    let update = ProfileUpdate::from_json(body)?;
    let profile = state.accounts.update_profile(&user.account_id, update).await?;
    Ok(Json(json!({ "message": "Profile updated successfully", "user": profile })))
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// GET /api/game/config
pub async fn get_game_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Game configuration retrieved successfully",
        "config": state.games.config(),
    }))
}

/// POST /api/game/roll
pub async fn roll_dice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<BetRequest>,
) -> ApiResult {
    let outcome = state.games.roll(&user.account_id, &req).await?;
    Ok(Json(json!({
        "message": "Game completed successfully",
        "result": outcome.result,
        "user": outcome.user,
    })))
}

/// GET /api/game/history?limit=N
pub async fn get_game_history(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult {
    let records = state.games.history(&user.account_id, q.limit).await?;
    Ok(Json(json!({ "message": "Game history retrieved successfully", "records": records })))
}

/// GET /api/game/stats
pub async fn get_game_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let stats = state.games.stats(&user.account_id).await?;
    Ok(Json(json!({ "message": "Game statistics retrieved successfully", "stats": stats })))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// POST /api/transactions/deposit
pub async fn submit_deposit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<DepositRequest>,
) -> ServiceResult<(StatusCode, Json<Value>)> {
    let tx = state.transactions.submit_deposit(&user.account_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Deposit request submitted successfully", "transaction": tx })),
    ))
}

/// POST /api/transactions/withdraw
pub async fn submit_withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<WithdrawRequest>,
) -> ServiceResult<(StatusCode, Json<Value>)> {
    let tx = state.transactions.submit_withdrawal(&user.account_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Withdrawal request submitted successfully", "transaction": tx })),
    ))
}

/// GET /api/transactions/history?type=&status=&page=&limit=
pub async fn get_transaction_history(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(q): ApiQuery<HistoryQuery>,
) -> ApiResult {
    let page = state.transactions.history(&user.account_id, q).await?;
    Ok(Json(json!({
        "message": "Transaction history retrieved successfully",
        "transactions": page.items,
        "pagination": page.pagination,
    })))
}

/// GET /api/transactions/admin/deposits/pending
pub async fn get_pending_deposits(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(q): ApiQuery<PageQuery>,
) -> ApiResult {
    let page = state.transactions.pending_deposits(q).await?;
    Ok(Json(json!({
        "message": "Pending deposits retrieved successfully",
        "deposits": page.items,
        "pagination": page.pagination,
    })))
}

/// POST /api/transactions/admin/deposit/process
pub async fn process_deposit(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(req): ApiJson<ProcessRequest>,
) -> ApiResult {
    let tx = state.transactions.process_deposit(req, &admin.name).await?;
    let verb = if tx.status == crate::types::TransactionStatus::Completed {
        "confirmed"
    } else {
        "rejected"
    };
    Ok(Json(json!({ "message": format!("Deposit {verb} successfully"), "transaction": tx })))
}

/// POST /api/transactions/admin/withdraw/process
pub async fn process_withdrawal(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(req): ApiJson<ProcessRequest>,
) -> ApiResult {
    let tx = state.transactions.process_withdrawal(req, &admin.name).await?;
    let verb = if tx.status == crate::types::TransactionStatus::Completed {
        "confirmed"
    } else {
        "rejected"
    };
    Ok(Json(json!({ "message": format!("Withdrawal {verb} successfully"), "transaction": tx })))
}

/// GET /api/transactions/admin/stats
pub async fn get_transaction_stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult {
    let stats = state.transactions.stats().await?;
    Ok(Json(json!({ "message": "Transaction statistics retrieved successfully", "stats": stats })))
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// GET /api/leaderboard/24h
pub async fn get_24h_leaderboard(State(state): State<AppState>, ApiQuery(q): ApiQuery<LimitQuery>) -> ApiResult {
    let board = state.leaderboard.last_24h(q.limit).await?;
    Ok(leaderboard_response("24-hour leaderboard retrieved successfully", board))
}

/// GET /api/leaderboard/all-time
pub async fn get_all_time_leaderboard(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult {
    let board = state.leaderboard.all_time(q.limit).await?;
    Ok(leaderboard_response("All-time leaderboard retrieved successfully", board))
}

/// GET /api/leaderboard/winning-streak
pub async fn get_winning_streak_leaderboard(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult {
    let board = state.leaderboard.winning_streak(q.limit).await?;
    Ok(leaderboard_response("Winning streak leaderboard retrieved successfully", board))
}

/// GET /api/leaderboard/stats
pub async fn get_leaderboard_stats(State(state): State<AppState>) -> ApiResult {
    let stats = state.leaderboard.stats().await?;
    Ok(Json(json!({
        "message": "Leaderboard statistics retrieved successfully",
        "stats": stats,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// GET /api/leaderboard/user/:user_id/position
pub async fn get_user_position(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult {
    let pos = state.leaderboard.user_position(&user_id).await?;
    Ok(Json(json!({
        "message": "User leaderboard position retrieved successfully",
        "user": pos.user,
        "positions": pos.positions,
    })))
}

fn leaderboard_response(message: &str, board: Vec<crate::leaderboard::LeaderboardEntry>) -> Json<Value> {
    Json(json!({
        "message": message,
        "leaderboard": board,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
