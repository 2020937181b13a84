//! Identity provider: turns a Telegram session into a web-app auth token.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use super::client::{AccountInfo, TelegramBot, TelegramError, WebViewRequest};
use crate::config::{GAME_APP_SHORT_NAME, GAME_BOT_USERNAME, Proxy, TelegramConfig};

const WEB_APP_DATA_MARKER: &str = "tgWebAppData=";
const WEB_APP_VERSION_MARKER: &str = "&tgWebAppVersion";

/// Failure to obtain a token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The session can never be used again; the farmer for it must stop.
    #[error("Invalid session {session}: {reason}")]
    InvalidSession { session: String, reason: String },

    /// Anything else. Worth another try after a pause.
    #[error("{reason}")]
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
}

impl IdentityError {
    fn from_telegram(session: &str, err: TelegramError) -> Self {
        match err {
            TelegramError::NotAuthorized | TelegramError::SessionRevoked(_) => {
                Self::InvalidSession {
                    session: session.to_owned(),
                    reason: err.to_string(),
                }
            }
            TelegramError::FloodWait(seconds) => Self::Transient {
                reason: err.to_string(),
                retry_after: Some(Duration::from_secs(u64::from(seconds))),
            },
            other => Self::Transient {
                reason: other.to_string(),
                retry_after: None,
            },
        }
    }
}

/// Source of web-app auth tokens for one account.
#[async_trait]
pub trait IdentityProvider: Send {
    /// Obtains a fresh auth token, launching the web app with `start_param`.
    async fn acquire_token(&mut self, start_param: &str) -> Result<String, IdentityError>;
}

/// One account session on disk plus the proxy it runs behind.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Session name, unique per run.
    pub name: String,

    /// Path of the session database.
    pub session_path: PathBuf,

    /// Proxy for both the Telegram connection and the game traffic.
    pub proxy: Option<Proxy>,
}

/// [`IdentityProvider`] backed by a real Telegram session.
#[derive(Debug)]
pub struct TelegramIdentity {
    identity: SessionIdentity,
    config: TelegramConfig,
    bot: Option<TelegramBot>,
    account: Option<AccountInfo>,
}

impl TelegramIdentity {
    #[must_use]
    pub const fn new(identity: SessionIdentity, config: TelegramConfig) -> Self {
        Self {
            identity,
            config,
            bot: None,
            account: None,
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), TelegramError> {
        if self.bot.is_none() {
            let bot = TelegramBot::connect(
                &self.config,
                &self.identity.session_path,
                self.identity.proxy.as_ref(),
            )
            .await?;
            if !bot.is_authorized().await? {
                bot.disconnect();
                return Err(TelegramError::NotAuthorized);
            }
            self.bot = Some(bot);
        }
        Ok(())
    }

    async fn fetch_web_app_data(&mut self, start_param: &str) -> Result<String, TelegramError> {
        self.ensure_connected().await?;
        let Some(bot) = self.bot.as_ref() else {
            return Err(TelegramError::Connection("client dropped".to_owned()));
        };

        let url = bot
            .request_web_view(&WebViewRequest {
                bot_username: GAME_BOT_USERNAME,
                app_short_name: GAME_APP_SHORT_NAME,
                start_param,
                platform: "android",
            })
            .await?;

        let data = extract_web_app_data(&url).ok_or_else(|| {
            TelegramError::UnexpectedResponse(format!(
                "web view URL carries no {WEB_APP_DATA_MARKER}"
            ))
        })?;

        if self.account.is_none() {
            match bot.get_me().await {
                Ok(account) => {
                    info!("Signed in to Telegram as {} ({})", account.display_name(), account.id);
                    self.account = Some(account);
                }
                Err(e) => warn!("Could not fetch account info: {}", e),
            }
        }

        Ok(data)
    }

    fn drop_connection(&mut self) {
        if let Some(bot) = self.bot.take() {
            bot.disconnect();
        }
    }
}

#[async_trait]
impl IdentityProvider for TelegramIdentity {
    async fn acquire_token(&mut self, start_param: &str) -> Result<String, IdentityError> {
        match self.fetch_web_app_data(start_param).await {
            Ok(data) => {
                info!("Obtained web app data");
                Ok(data)
            }
            Err(e) => {
                self.drop_connection();
                Err(IdentityError::from_telegram(&self.identity.name, e))
            }
        }
    }
}

impl Drop for TelegramIdentity {
    fn drop(&mut self) {
        self.drop_connection();
    }
}

/// Extracts the URL-decoded `tgWebAppData` value from a web-app launch URL.
#[must_use]
pub fn extract_web_app_data(url: &str) -> Option<String> {
    let (_, tail) = url.split_once(WEB_APP_DATA_MARKER)?;
    let raw = tail
        .split_once(WEB_APP_VERSION_MARKER)
        .map_or(tail, |(data, _)| data);
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw).ok()?;
    Some(decoded.into_owned())
}
