//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero configuration
//! against the simulated push source and the platform data directory.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kconnect_shared::constants::{
    DELIVERED_AFTER_MS, PUSH_ARRIVAL_PROBABILITY, PUSH_POLL_SECS, READ_AFTER_MS,
};

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the hosted auth/profile backend.
    /// Env: `KC_AUTH_URL`
    /// Default: none (auth commands report a service error).
    pub auth_url: Option<String>,

    /// Public API key sent with every backend request.
    /// Env: `KC_AUTH_ANON_KEY`
    pub auth_anon_key: Option<String>,

    /// Path of the SQLite database.
    /// Env: `KC_DB_PATH`
    /// Default: platform data directory.
    pub db_path: Option<PathBuf>,

    /// Delay from send to the "delivered" receipt.
    /// Env: `KC_DELIVERED_AFTER_MS`
    pub delivered_after: Duration,

    /// Delay from send to the "read" receipt.
    /// Env: `KC_READ_AFTER_MS`
    pub read_after: Duration,

    /// Poll period of the simulated push source.
    /// Env: `KC_PUSH_POLL_SECS`
    pub push_poll: Duration,

    /// Chance that one simulated poll produces a notification.
    /// Env: `KC_PUSH_PROBABILITY` (0.0 ..= 1.0)
    pub push_probability: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_url: None,
            auth_anon_key: None,
            db_path: None,
            delivered_after: Duration::from_millis(DELIVERED_AFTER_MS),
            read_after: Duration::from_millis(READ_AFTER_MS),
            push_poll: Duration::from_secs(PUSH_POLL_SECS),
            push_probability: PUSH_ARRIVAL_PROBABILITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to
    /// defaults for missing or invalid values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("KC_AUTH_URL").filter(|v| !v.trim().is_empty()) {
            config.auth_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(key) = lookup("KC_AUTH_ANON_KEY").filter(|v| !v.is_empty()) {
            config.auth_anon_key = Some(key);
        }
        if let Some(path) = lookup("KC_DB_PATH").filter(|v| !v.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "KC_DELIVERED_AFTER_MS") {
            config.delivered_after = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "KC_READ_AFTER_MS") {
            config.read_after = Duration::from_millis(ms);
        }
        if config.read_after < config.delivered_after {
            tracing::warn!(
                delivered_ms = config.delivered_after.as_millis() as u64,
                read_ms = config.read_after.as_millis() as u64,
                "read receipt configured before delivery, aligning it"
            );
            config.read_after = config.delivered_after;
        }

        match parse_var::<u64>(&lookup, "KC_PUSH_POLL_SECS") {
            Some(0) => tracing::warn!("KC_PUSH_POLL_SECS must be positive, using default"),
            Some(secs) => config.push_poll = Duration::from_secs(secs),
            None => {}
        }

        match parse_var::<f64>(&lookup, "KC_PUSH_PROBABILITY") {
            Some(p) if (0.0..=1.0).contains(&p) => config.push_probability = p,
            Some(p) => tracing::warn!(value = p, "KC_PUSH_PROBABILITY out of range, using default"),
            None => {}
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            None
        }
    }
}
