//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads an optional `config.toml` and deserializes into strongly-typed
//! structs; every section falls back to defaults when absent. The legacy
//! environment variables (`ODDS_1_3`, `ODDS_EXACT`, `MIN_BET`, `MAX_BET`,
//! `PORT`, ...) are applied on top. The game engine only ever sees the
//! derived [`GameConfig`].

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Multiplier ceiling. Not configurable.
pub const MAX_MULTIPLIER: u32 = 100;

/// Largest payout a single bet may produce under the configured limits.
pub const MAX_PAYOUT: Decimal = dec!(1_000_000_000_000);

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub game: GameSection,
    pub accounts: AccountsConfig,
    pub transactions: TransactionsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the SPA).
    pub client_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            client_url: "http://localhost:5174".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GameSection {
    pub odds_small_large: Decimal,
    pub odds_exact: Decimal,
    pub min_bet: Decimal,
    pub max_bet: Decimal,
    /// Seed for a reproducible die. Unset means OS-seeded randomness.
    pub dice_seed: Option<u64>,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            odds_small_large: dec!(1.95),
            odds_exact: dec!(5.8),
            min_bet: dec!(1),
            max_bet: dec!(10000),
            dice_seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AccountsConfig {
    pub initial_balance: Decimal,
    pub session_ttl_secs: i64,
    /// Shared secret for the admin routes. Admin routes are closed when unset.
    pub admin_token: Option<SecretString>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(100),
            session_ttl_secs: 7 * 24 * 60 * 60,
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransactionsConfig {
    pub min_withdraw: Decimal,
    pub daily_withdraw_limit: Decimal,
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            min_withdraw: dec!(10),
            daily_withdraw_limit: dec!(1000),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot restored at startup and written on shutdown.
    pub snapshot_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Game configuration handed to the engine
// ---------------------------------------------------------------------------

/// Odds and limits the settlement engine runs against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub odds: Odds,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Odds {
    pub small_large: Decimal,
    pub exact_number: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub min_bet: Decimal,
    pub max_bet: Decimal,
    pub max_multiplier: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameSection::default().to_game_config()
    }
}

impl GameSection {
    pub fn to_game_config(&self) -> GameConfig {
        GameConfig {
            odds: Odds {
                small_large: self.odds_small_large,
                exact_number: self.odds_exact,
            },
            limits: Limits {
                min_bet: self.min_bet,
                max_bet: self.max_bet,
                max_multiplier: MAX_MULTIPLIER,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load the file, apply process environment overrides, and validate.
    pub fn load_with_env(path: &str) -> Result<Self> {
        let mut cfg = Self::load(path)?;
        cfg.apply_env(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from an environment lookup. Unparseable values are
    /// errors, not silently skipped.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = parsed::<u16, _>(&lookup, "PORT")? {
            self.server.port = v;
        }
        if let Some(v) = lookup("CLIENT_URL") {
            self.server.client_url = v;
        }
        if let Some(v) = parsed::<Decimal, _>(&lookup, "ODDS_1_3")? {
            self.game.odds_small_large = v;
        }
        if let Some(v) = parsed::<Decimal, _>(&lookup, "ODDS_EXACT")? {
            self.game.odds_exact = v;
        }
        if let Some(v) = parsed::<Decimal, _>(&lookup, "MIN_BET")? {
            self.game.min_bet = v;
        }
        if let Some(v) = parsed::<Decimal, _>(&lookup, "MAX_BET")? {
            self.game.max_bet = v;
        }
        if let Some(v) = parsed::<u64, _>(&lookup, "DICE_SEED")? {
            self.game.dice_seed = Some(v);
        }
        if let Some(v) = parsed::<Decimal, _>(&lookup, "INITIAL_BALANCE")? {
            self.accounts.initial_balance = v;
        }
        if let Some(v) = lookup("ADMIN_TOKEN") {
            self.accounts.admin_token = Some(SecretString::new(v));
        }
        if let Some(v) = lookup("SNAPSHOT_PATH") {
            self.storage.snapshot_path = Some(v);
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run against.
    pub fn validate(&self) -> Result<()> {
        let g = &self.game;
        if g.odds_small_large <= Decimal::ZERO || g.odds_exact <= Decimal::ZERO {
            bail!("Odds must be positive (small/large={}, exact={})", g.odds_small_large, g.odds_exact);
        }
        if g.min_bet <= Decimal::ZERO {
            bail!("min_bet must be positive, got {}", g.min_bet);
        }
        if g.max_bet < g.min_bet {
            bail!("max_bet ({}) must not be below min_bet ({})", g.max_bet, g.min_bet);
        }
        let top_odds = g.odds_small_large.max(g.odds_exact);
        let payout = g
            .max_bet
            .checked_mul(top_odds)
            .and_then(|v| v.checked_mul(Decimal::from(MAX_MULTIPLIER)));
        if !payout.is_some_and(|p| p <= MAX_PAYOUT) {
            bail!(
                "max_bet ({}) x odds ({}) x {} exceeds the payout ceiling {}",
                g.max_bet,
                top_odds,
                MAX_MULTIPLIER,
                MAX_PAYOUT
            );
        }
        if self.accounts.initial_balance <= Decimal::ZERO {
            bail!("initial_balance must be positive, got {}", self.accounts.initial_balance);
        }
        if self.accounts.session_ttl_secs <= 0 {
            bail!("session_ttl_secs must be positive");
        }
        let url = &self.server.client_url;
        if !(url.starts_with("http://") || url.starts_with("https://"))
            || url.parse::<HeaderValue>().is_err()
        {
            bail!("client_url must be an http(s) origin, got {url:?}");
        }
        Ok(())
    }

    pub fn game_config(&self) -> GameConfig {
        self.game.to_game_config()
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {name} ({raw:?}): {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.game.odds_small_large, dec!(1.95));
        assert_eq!(cfg.game.odds_exact, dec!(5.8));
        assert_eq!(cfg.game.min_bet, dec!(1));
        assert_eq!(cfg.game.max_bet, dec!(10000));
        assert_eq!(cfg.accounts.initial_balance, dec!(100));
        assert!(cfg.accounts.admin_token.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = AppConfig::load("/tmp/dicebet_no_such_config_98765.toml").unwrap();
        assert_eq!(cfg.server.port, 5000);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [game]
            odds_exact = 5.5
            max_bet = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.game.odds_exact, dec!(5.5));
        assert_eq!(cfg.game.max_bet, dec!(500));
        assert_eq!(cfg.game.odds_small_large, dec!(1.95));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("ODDS_1_3", "1.9"),
            ("ODDS_EXACT", "6"),
            ("MIN_BET", "0.5"),
            ("MAX_BET", "250"),
            ("PORT", "9000"),
            ("ADMIN_TOKEN", "s3cret"),
        ]))
        .unwrap();

        let game = cfg.game_config();
        assert_eq!(game.odds.small_large, dec!(1.9));
        assert_eq!(game.odds.exact_number, dec!(6));
        assert_eq!(game.limits.min_bet, dec!(0.5));
        assert_eq!(game.limits.max_bet, dec!(250));
        assert_eq!(game.limits.max_multiplier, MAX_MULTIPLIER);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.accounts.admin_token.as_ref().unwrap().expose_secret(), "s3cret");
    }

    #[test]
    fn test_env_garbage_is_an_error() {
        let mut cfg = AppConfig::default();
        let err = cfg.apply_env(env(&[("MAX_BET", "lots")])).unwrap_err();
        assert!(err.to_string().contains("MAX_BET"));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut cfg = AppConfig::default();
        cfg.game.max_bet = dec!(0.5);
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.game.min_bet = Decimal::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.game.odds_exact = dec!(-1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_payout() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("ODDS_EXACT", "25000000000000000000000000")]))
            .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("payout ceiling"), "{err}");

        let mut cfg = AppConfig::default();
        cfg.game.max_bet = Decimal::MAX;
        assert!(cfg.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_client_url() {
        for url in ["", "localhost:5174", "http://bad\nhost", "ftp://example.com"] {
            let mut cfg = AppConfig::default();
            cfg.server.client_url = url.into();
            assert!(cfg.validate().is_err(), "{url:?}");
        }

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("CLIENT_URL", "https://dice.example.com")]))
            .unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_game_config_serializes_camel_case() {
        let json = serde_json::to_value(GameConfig::default()).unwrap();
        assert_eq!(json["odds"]["smallLarge"].as_f64(), Some(1.95));
        assert_eq!(json["odds"]["exactNumber"].as_f64(), Some(5.8));
        assert_eq!(json["limits"]["minBet"].as_f64(), Some(1.0));
        assert_eq!(json["limits"]["maxMultiplier"], 100);
    }
}
