//! Application settings and Telegram configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DEFAULT_REF_ID;

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,
}

impl TelegramConfig {
    /// Creates configuration from environment variables.
    ///
    /// Expects `API_ID` and `API_HASH` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash =
            std::env::var("API_HASH").map_err(|_| ConfigError::MissingEnvVar("API_HASH"))?;

        Ok(Self { api_id, api_hash })
    }
}

/// Closed `[min, max]` interval read from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Creates bounds, rejecting `min > max`.
    pub fn new(min: T, max: T) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }
}

impl Bounds<f64> {
    /// First and last multiple of 0.001 inside the interval, in thousandths.
    ///
    /// `None` when no such multiple exists.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn milli_grid(&self) -> Option<(u64, u64)> {
        const EPS: f64 = 1e-9;
        let lo = (self.min * 1000.0 - EPS).ceil().max(0.0);
        let hi = (self.max * 1000.0 + EPS).floor();
        (lo <= hi && hi.is_finite()).then(|| (lo as u64, hi as u64))
    }
}

impl<T> Bounds<T>
where
    T: FromStr + PartialOrd + Copy,
{
    /// Parses `"[50, 65]"` or `"50,65"`.
    fn parse(raw: &str) -> Option<Self> {
        let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
        let mut parts = inner.split(',').map(str::trim);
        let min = parts.next()?.parse().ok()?;
        let max = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Self::new(min, max)
    }
}

/// Farming behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Whether the milk mini-game is enabled for this run.
    pub play_games: bool,

    /// Integer bonus range sent with every save-ton call.
    pub points: Bounds<u32>,

    /// TON amount range sent with every save-ton call.
    pub ton_amount: Bounds<f64>,

    /// Whether the configured referral id takes part in the start param draw.
    pub use_ref: bool,

    /// Referral id sent to the game.
    pub ref_id: String,

    /// Whether proxies are read from the proxies file.
    pub use_proxy_from_file: bool,

    /// Whether social tasks are checked and claimed.
    pub do_tasks: bool,

    /// How long an authenticated session is reused before logging in again.
    pub relogin_interval: Duration,

    /// Pause between two farming cycles, in seconds.
    pub cycle_delay_secs: Bounds<u64>,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            play_games: true,
            points: Bounds { min: 50, max: 65 },
            ton_amount: Bounds {
                min: 0.040,
                max: 0.055,
            },
            use_ref: false,
            ref_id: DEFAULT_REF_ID.to_owned(),
            use_proxy_from_file: true,
            do_tasks: false,
            relogin_interval: Duration::from_secs(3600),
            cycle_delay_secs: Bounds {
                min: 1800,
                max: 3600,
            },
        }
    }
}

impl FarmSettings {
    /// Creates farm settings from environment variables with defaults.
    ///
    /// Unset or empty variables fall back to defaults; present but malformed
    /// values are rejected.
    pub fn from_env_with_defaults() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let ton_amount = match get("TON_AMOUNT") {
            Some(raw) => Bounds::<f64>::parse(&raw)
                .filter(|b| b.min >= 0.0 && b.milli_grid().is_some())
                .ok_or(ConfigError::InvalidRange("TON_AMOUNT", raw))?,
            None => defaults.ton_amount,
        };

        Ok(Self {
            play_games: parse_flag(get("PLAY_GAMES"), "PLAY_GAMES", defaults.play_games)?,
            points: parse_bounds(get("POINTS"), "POINTS", defaults.points)?,
            ton_amount,
            use_ref: parse_flag(get("USE_REF"), "USE_REF", defaults.use_ref)?,
            ref_id: get("REF_ID").unwrap_or(defaults.ref_id),
            use_proxy_from_file: parse_flag(
                get("USE_PROXY_FROM_FILE"),
                "USE_PROXY_FROM_FILE",
                defaults.use_proxy_from_file,
            )?,
            do_tasks: parse_flag(get("DO_TASKS"), "DO_TASKS", defaults.do_tasks)?,
            relogin_interval: match get("RELOGIN_INTERVAL") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidNumber("RELOGIN_INTERVAL", raw))?,
                None => defaults.relogin_interval,
            },
            cycle_delay_secs: parse_bounds(
                get("CYCLE_DELAY"),
                "CYCLE_DELAY",
                defaults.cycle_delay_secs,
            )?,
        })
    }
}

fn parse_flag(raw: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(key, raw)),
    }
}

fn parse_bounds<T>(
    raw: Option<String>,
    key: &'static str,
    default: Bounds<T>,
) -> Result<Bounds<T>, ConfigError>
where
    T: FromStr + PartialOrd + Copy,
{
    match raw {
        Some(raw) => Bounds::parse(&raw).ok_or(ConfigError::InvalidRange(key, raw)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid boolean for {0}: {1:?}")]
    InvalidFlag(&'static str, String),

    #[error("Invalid range for {0}: {1:?} (expected [min, max] with min <= max)")]
    InvalidRange(&'static str, String),

    #[error("Invalid number for {0}: {1:?}")]
    InvalidNumber(&'static str, String),
}
