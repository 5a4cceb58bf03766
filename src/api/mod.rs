//! HTTP API: Axum router for the dice game, accounts, transactions
//! and leaderboards.
//!
//! Everything lives under `/api`. CORS is restricted to the configured
//! client origin.

pub mod auth;
pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use routes::{AppContext, AppState};

/// Run the API until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(state.client_origin.clone()))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(auth::ADMIN_TOKEN_HEADER),
        ]);

    Router::new()
        .route("/api/health", get(routes::health))
        // Users
        .route("/api/users/register", post(routes::register))
        .route("/api/users/login", post(routes::login))
        .route(
            "/api/users/profile",
            get(routes::get_profile).put(routes::update_profile),
        )
        // Game
        .route("/api/game/config", get(routes::get_game_config))
        .route("/api/game/roll", post(routes::roll_dice))
        .route("/api/game/history", get(routes::get_game_history))
        .route("/api/game/stats", get(routes::get_game_stats))
        // Transactions
        .route("/api/transactions/deposit", post(routes::submit_deposit))
        .route("/api/transactions/withdraw", post(routes::submit_withdraw))
        .route("/api/transactions/history", get(routes::get_transaction_history))
        .route(
            "/api/transactions/admin/deposits/pending",
            get(routes::get_pending_deposits),
        )
        .route(
            "/api/transactions/admin/deposit/process",
            post(routes::process_deposit),
        )
        .route(
            "/api/transactions/admin/withdraw/process",
            post(routes::process_withdrawal),
        )
        .route("/api/transactions/admin/stats", get(routes::get_transaction_stats))
        // Leaderboard
        .route("/api/leaderboard/24h", get(routes::get_24h_leaderboard))
        .route("/api/leaderboard/all-time", get(routes::get_all_time_leaderboard))
        .route(
            "/api/leaderboard/winning-streak",
            get(routes::get_winning_streak_leaderboard),
        )
        .route("/api/leaderboard/stats", get(routes::get_leaderboard_stats))
        .route(
            "/api/leaderboard/user/:user_id/position",
            get(routes::get_user_position),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
