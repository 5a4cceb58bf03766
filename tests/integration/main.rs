//! Integration tests: drive the full router over an in-memory store with
//! a scripted die.

mod api_flow;
mod harness;
mod persistence;
