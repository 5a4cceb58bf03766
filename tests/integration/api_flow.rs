//! End-to-end flows through the HTTP API.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::harness::{num, TestApp, ADMIN_TOKEN};

const ADDRESS: &str = "4Nd1mYzB8qf3WvLrTpK6xJ2cHsE9uGaQ7oVb";

#[tokio::test]
async fn test_game_flow_settles_and_records() {
    let app = TestApp::new(&[5, 2]);
    let (bearer, _) = app.register("Alice").await;
    let auth = [("authorization", bearer.as_str())];

    // large x2 on a 5: 10 * 1.95 * 2 = 39
    let (status, json) = app
        .send(
            Method::POST,
            "/api/game/roll",
            &auth,
            Some(json!({ "betAmount": 10, "betOption": "large", "multiplier": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["result"]["win"], true);
    assert_eq!(num(&json["result"]["profit"]), 39.0);
    assert_eq!(num(&json["result"]["balanceBefore"]), 100.0);
    assert_eq!(num(&json["result"]["balanceAfter"]), 139.0);
    assert_eq!(num(&json["user"]["balance"]), 139.0);

    // exact 4 on a 2: lose the stake
    let (status, json) = app
        .send(
            Method::POST,
            "/api/game/roll",
            &auth,
            Some(json!({ "betAmount": 10, "betOption": 4, "multiplier": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["result"]["win"], false);
    assert_eq!(json["result"]["betOption"], 4);
    assert_eq!(num(&json["result"]["profit"]), -10.0);
    assert_eq!(num(&json["user"]["balance"]), 129.0);

    let (_, json) = app.send(Method::GET, "/api/game/history", &auth, None).await;
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["diceResult"], 2);
    assert_eq!(records[1]["diceResult"], 5);

    let (_, json) = app.send(Method::GET, "/api/game/history?limit=1", &auth, None).await;
    assert_eq!(json["records"].as_array().unwrap().len(), 1);

    let (_, json) = app.send(Method::GET, "/api/game/stats", &auth, None).await;
    assert_eq!(json["stats"]["totalBets"], 2);
    assert_eq!(json["stats"]["totalWins"], 1);
    assert_eq!(json["stats"]["totalLosses"], 1);
    assert_eq!(num(&json["stats"]["winRate"]), 50.0);
    assert_eq!(num(&json["stats"]["totalProfit"]), 29.0);

    assert_eq!(app.dice.rolls(), 2);
}

#[tokio::test]
async fn test_rejected_bets_never_roll() {
    let app = TestApp::new(&[6]);
    let (bearer, _) = app.register("bob").await;
    let auth = [("authorization", bearer.as_str())];

    let cases = [
        (json!({ "betAmount": 10, "betOption": "small" }), "All fields (betAmount, betOption, multiplier) are required"),
        (json!({ "betAmount": 0.5, "betOption": "small", "multiplier": 1 }), "Minimum bet is 1"),
        (json!({ "betAmount": 20000, "betOption": "small", "multiplier": 1 }), "Maximum bet is 10000"),
        (json!({ "betAmount": 10, "betOption": "small", "multiplier": 0 }), "Multiplier must be between 1 and 100"),
        (json!({ "betAmount": 10, "betOption": "small", "multiplier": 101 }), "Multiplier must be between 1 and 100"),
        (json!({ "betAmount": 10, "betOption": 7, "multiplier": 1 }), "Bet option must be small, large, or a number between 1 and 6"),
        (json!({ "betAmount": 10, "betOption": "medium", "multiplier": 1 }), "Bet option must be small, large, or a number between 1 and 6"),
        (json!({ "betAmount": 200, "betOption": "small", "multiplier": 1 }), "Insufficient balance: need 200, have 100"),
    ];
    for (body, message) in cases {
        let (status, json) = app.send(Method::POST, "/api/game/roll", &auth, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["message"], message, "{body}");
    }

    assert_eq!(app.dice.rolls(), 0);
    let (_, json) = app.send(Method::GET, "/api/users/profile", &auth, None).await;
    assert_eq!(num(&json["user"]["balance"]), 100.0);
    assert_eq!(json["user"]["totalBets"], 0);
}

#[tokio::test]
async fn test_login_and_profile_update() {
    let app = TestApp::new(&[1]);
    app.register("carol").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/users/login",
            &[],
            Some(json!({ "username": "carol", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{json}");

    let (status, json) = app
        .send(
            Method::POST,
            "/api/users/login",
            &[],
            Some(json!({ "username": "CAROL", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let bearer = format!("Bearer {}", json["token"].as_str().unwrap());
    let auth = [("authorization", bearer.as_str())];

    let (status, json) = app
        .send(
            Method::PUT,
            "/api/users/profile",
            &auth,
            Some(json!({ "username": "caroline" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["user"]["username"], "caroline");

    app.register("dave").await;
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/users/profile",
            &auth,
            Some(json!({ "username": "dave" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new(&[1]);
    app.register("erin").await;
    let (status, json) = app
        .send(
            Method::POST,
            "/api/users/register",
            &[],
            Some(json!({ "username": "Erin", "password": "hunter22", "confirmPassword": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Username already exists");
}

#[tokio::test]
async fn test_deposit_confirmed_once() {
    let app = TestApp::new(&[1]);
    let (bearer, _) = app.register("frank").await;
    let auth = [("authorization", bearer.as_str())];
    let admin = [("x-admin-token", ADMIN_TOKEN)];

    let (status, json) = app
        .send(
            Method::POST,
            "/api/transactions/deposit",
            &auth,
            Some(json!({ "amount": 50, "blockchainAddress": ADDRESS, "txHash": "0xfeed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["transaction"]["status"], "pending");
    assert_eq!(json["transaction"]["type"], "deposit");
    let tx_id = json["transaction"]["_id"].as_str().unwrap().to_string();

    let (status, json) = app
        .send(Method::GET, "/api/transactions/admin/deposits/pending", &admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deposits"][0]["username"], "frank");
    assert_eq!(json["pagination"]["total"], 1);

    let process = json!({ "transactionId": tx_id, "action": "confirm", "adminAmount": 45 });
    let (status, json) = app
        .send(
            Method::POST,
            "/api/transactions/admin/deposit/process",
            &admin,
            Some(process.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["transaction"]["status"], "completed");
    assert_eq!(num(&json["transaction"]["amount"]), 45.0);

    // A second confirmation must not credit again.
    let (status, _) = app
        .send(Method::POST, "/api/transactions/admin/deposit/process", &admin, Some(process))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = app.send(Method::GET, "/api/users/profile", &auth, None).await;
    assert_eq!(num(&json["user"]["balance"]), 145.0);

    let (_, json) = app
        .send(Method::GET, "/api/transactions/history?status=completed", &auth, None)
        .await;
    assert_eq!(json["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["totalPages"], 1);
}

#[tokio::test]
async fn test_withdrawal_reject_then_confirm() {
    let app = TestApp::new(&[1]);
    let (bearer, _) = app.register("grace").await;
    let auth = [("authorization", bearer.as_str())];
    let admin = [("x-admin-token", ADMIN_TOKEN)];

    let (status, json) = app
        .send(
            Method::POST,
            "/api/transactions/withdraw",
            &auth,
            Some(json!({ "amount": 5, "blockchainAddress": ADDRESS })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Minimum withdrawal amount is 10");

    let withdraw = json!({ "amount": 60, "blockchainAddress": ADDRESS });
    let (status, json) = app
        .send(Method::POST, "/api/transactions/withdraw", &auth, Some(withdraw.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let first = json["transaction"]["_id"].as_str().unwrap().to_string();

    let (status, json) = app
        .send(
            Method::POST,
            "/api/transactions/admin/withdraw/process",
            &admin,
            Some(json!({ "transactionId": first, "action": "reject" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Rejection reason is required");

    let (status, json) = app
        .send(
            Method::POST,
            "/api/transactions/admin/withdraw/process",
            &admin,
            Some(json!({ "transactionId": first, "action": "reject", "rejectionReason": "address mismatch" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["transaction"]["status"], "rejected");
    assert_eq!(json["transaction"]["rejectionReason"], "address mismatch");

    let (_, json) = app.send(Method::GET, "/api/users/profile", &auth, None).await;
    assert_eq!(num(&json["user"]["balance"]), 100.0);

    let (_, json) = app
        .send(Method::POST, "/api/transactions/withdraw", &auth, Some(withdraw))
        .await;
    let second = json["transaction"]["_id"].as_str().unwrap().to_string();
    let (status, _) = app
        .send(
            Method::POST,
            "/api/transactions/admin/withdraw/process",
            &admin,
            Some(json!({ "transactionId": second, "action": "confirm", "txHash": "0xbeef" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app.send(Method::GET, "/api/users/profile", &auth, None).await;
    assert_eq!(num(&json["user"]["balance"]), 40.0);

    let (_, json) = app
        .send(Method::GET, "/api/transactions/admin/stats", &admin, None)
        .await;
    assert_eq!(num(&json["stats"]["totalWithdrawals"]), 60.0);
    assert_eq!(json["stats"]["pendingWithdrawals"], 0);

    // Processing a withdrawal through the deposit endpoint is refused.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/transactions/admin/deposit/process",
            &admin,
            Some(json!({ "transactionId": second, "action": "confirm", "adminAmount": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaderboards_rank_players() {
    // alice wins, bob loses
    let app = TestApp::new(&[6, 6]);
    let (alice, _) = app.register("alice").await;
    let (bob, bob_id) = app.register("bob").await;
    let bet = json!({ "betAmount": 10, "betOption": "large", "multiplier": 1 });
    let lose = json!({ "betAmount": 10, "betOption": "small", "multiplier": 1 });

    app.send(Method::POST, "/api/game/roll", &[("authorization", alice.as_str())], Some(bet))
        .await;
    app.send(Method::POST, "/api/game/roll", &[("authorization", bob.as_str())], Some(lose))
        .await;

    let (_, json) = app.send(Method::GET, "/api/leaderboard/all-time", &[], None).await;
    let board = json["leaderboard"].as_array().unwrap();
    assert_eq!(board[0]["username"], "alice");
    assert_eq!(board[1]["username"], "bob");
    assert_eq!(num(&board[0]["totalProfit"]), 19.5);

    let (_, json) = app.send(Method::GET, "/api/leaderboard/24h?limit=1", &[], None).await;
    assert_eq!(json["leaderboard"].as_array().unwrap().len(), 1);
    assert_eq!(json["leaderboard"][0]["username"], "alice");

    let (_, json) = app.send(Method::GET, "/api/leaderboard/winning-streak", &[], None).await;
    assert_eq!(json["leaderboard"][0]["maxWinningStreak"], 1);

    let (_, json) = app.send(Method::GET, "/api/leaderboard/stats", &[], None).await;
    assert_eq!(json["stats"]["totalUsers"], 2);
    assert_eq!(json["stats"]["totalBets"], 2);
    assert_eq!(num(&json["stats"]["platformProfit"]), -9.5);

    let uri = format!("/api/leaderboard/user/{bob_id}/position");
    let (status, json) = app
        .send(Method::GET, &uri, &[("authorization", bob.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["positions"]["allTime"], 2);
    assert_eq!(json["positions"]["profit24h"], 2);

    let (status, _) = app
        .send(
            Method::GET,
            "/api/leaderboard/user/nobody/position",
            &[("authorization", bob.as_str())],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
