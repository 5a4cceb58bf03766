//! DICEBET: single-die betting service
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod game;
pub mod storage;
pub mod accounts;
pub mod transactions;
pub mod leaderboard;
pub mod api;
