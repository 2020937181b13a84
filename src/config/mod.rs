//! Configuration module for the farming bot.
//!
//! Handles loading and validation of Telegram API credentials, farming
//! settings, proxies and session files.

mod proxy;
mod sessions;
mod settings;

pub use proxy::{
    Proxy, ProxyCredentials, ProxyParseError, assign_proxies, load_proxies, parse_proxy_list,
};
pub use sessions::{SessionFile, SessionScanError, discover_sessions, session_path};
pub use settings::{Bounds, ConfigError, FarmSettings, TelegramConfig};

/// Username of the game bot that hosts the web app.
pub const GAME_BOT_USERNAME: &str = "RealCowsHouse_bot";

/// Short name of the game web app.
pub const GAME_APP_SHORT_NAME: &str = "cowshouse";

/// Base URL of the game REST API.
pub const GAME_API_BASE: &str = "https://realcowshouse.fun/api/";

/// Referral id used when none is configured.
pub const DEFAULT_REF_ID: &str = "kentId6168926126";

/// Referral id competing with the configured one in the start param draw.
pub const FALLBACK_REF_ID: &str = "kentId7392018078";
