//! Dice game.
//!
//! - `settlement`: the pure bet settlement engine
//! - `service`: applies settlements to stored accounts under a per-account lock
//!
//! This module also owns the die itself: the `DiceRoller` trait and its
//! OS-seeded and fixed-seed implementations.

pub mod service;
pub mod settlement;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

/// Faces on the die.
pub const DIE_FACES: u8 = 6;

/// Source of die rolls. Each call yields one uniform value in 1..=6.
#[cfg_attr(test, mockall::automock)]
pub trait DiceRoller: Send + Sync {
    fn roll(&self) -> u8;
}

/// Production roller: thread-local OS-seeded RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngRoller;

impl DiceRoller for ThreadRngRoller {
    fn roll(&self) -> u8 {
        rand::thread_rng().gen_range(1..=DIE_FACES)
    }
}

/// Deterministic roller for reproducible sessions.
pub struct SeededRoller {
    rng: Mutex<StdRng>,
}

impl SeededRoller {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DiceRoller for SeededRoller {
    fn roll(&self) -> u8 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(1..=DIE_FACES)
    }
}

/// Pick the roller for a configured seed.
pub fn roller_for(seed: Option<u64>) -> Arc<dyn DiceRoller> {
    match seed {
        Some(seed) => Arc::new(SeededRoller::new(seed)),
        None => Arc::new(ThreadRngRoller),
    }
}
