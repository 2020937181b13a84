//! Telegram client wrapper for web-app authorization.

use std::path::Path;
use std::sync::Arc;

use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Proxy, TelegramConfig};

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// RPC error names meaning the stored authorization is gone for good.
const REVOKED_SESSION_ERRORS: [&str; 5] = [
    "AUTH_KEY_UNREGISTERED",
    "AUTH_KEY_INVALID",
    "USER_DEACTIVATED",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
];

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Session is no longer valid: {0}")]
    SessionRevoked(String),

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Could not resolve @{0}")]
    PeerNotFound(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        if REVOKED_SESSION_ERRORS
            .iter()
            .any(|name| err_str.contains(name))
        {
            return Self::SessionRevoked(err_str);
        }

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];
    let lowered = err_msg.to_lowercase();

    for pattern in patterns {
        if let Some(idx) = lowered.find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = lowered[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Account details of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl AccountInfo {
    /// Full name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            format!("@{}", self.username)
        } else {
            full.to_owned()
        }
    }
}

/// Parameters of a web-app launch request.
#[derive(Debug, Clone)]
pub struct WebViewRequest<'a> {
    /// Username of the bot that owns the app, without `@`.
    pub bot_username: &'a str,
    /// Short name of the app.
    pub app_short_name: &'a str,
    /// Start parameter passed to the app.
    pub start_param: &'a str,
    /// Client platform reported to Telegram.
    pub platform: &'a str,
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram using the session stored at `session_path`,
    /// tunnelling through `proxy` when it is a SOCKS5 proxy.
    pub async fn connect(
        config: &TelegramConfig,
        session_path: impl AsRef<Path>,
        proxy: Option<&Proxy>,
    ) -> Result<Self, TelegramError> {
        let session_path = session_path.as_ref();
        debug!("Connecting to Telegram with {}", session_path.display());

        let proxy_url = proxy.and_then(|proxy| {
            let url = proxy.mtproto_url();
            if url.is_none() {
                warn!("{} cannot carry MTProto, connecting to Telegram directly", proxy);
            }
            url
        });
        let params = sender::ConnectionParams {
            proxy_url,
            ..Default::default()
        };

        let session = Arc::new(
            SqliteSession::open(session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::with_configuration(Arc::clone(&session), config.api_id, params);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle: handle.thin,
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => Ok(()),
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => Ok(()),
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Resolves a bot username to its input user.
    async fn resolve_bot(&self, username: &str) -> Result<tl::types::InputUser, TelegramError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: username.to_owned(),
            referer: None,
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) = self.client.invoke(&request).await?;

        resolved
            .users
            .into_iter()
            .find_map(|user| match user {
                tl::enums::User::User(user) if user.username.as_deref() == Some(username) => {
                    Some(tl::types::InputUser {
                        user_id: user.id,
                        access_hash: user.access_hash.unwrap_or_default(),
                    })
                }
                _ => None,
            })
            .ok_or_else(|| TelegramError::PeerNotFound(username.to_owned()))
    }

    /// Requests a web-app launch URL for the given bot app.
    pub async fn request_web_view(
        &self,
        req: &WebViewRequest<'_>,
    ) -> Result<String, TelegramError> {
        let bot = self.resolve_bot(req.bot_username).await?;

        let request = tl::functions::messages::RequestAppWebView {
            write_allowed: true,
            compact: false,
            fullscreen: false,
            peer: tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id: bot.user_id,
                access_hash: bot.access_hash,
            }),
            app: tl::enums::InputBotApp::ShortName(tl::types::InputBotAppShortName {
                bot_id: tl::enums::InputUser::User(bot),
                short_name: req.app_short_name.to_owned(),
            }),
            start_param: Some(req.start_param.to_owned()),
            theme_params: None,
            platform: req.platform.to_owned(),
        };

        match self.client.invoke(&request).await? {
            tl::enums::WebViewResult::Url(result) => Ok(result.url),
            #[allow(unreachable_patterns)]
            other => Err(TelegramError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    /// Fetches the signed-in account.
    pub async fn get_me(&self) -> Result<AccountInfo, TelegramError> {
        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.client.invoke(&request).await?;
        match users.into_iter().next() {
            Some(tl::enums::User::User(user)) => Ok(AccountInfo {
                id: user.id,
                first_name: user.first_name.unwrap_or_default(),
                last_name: user.last_name.unwrap_or_default(),
                username: user.username.unwrap_or_default(),
            }),
            _ => {
                warn!("Could not get user info");
                Err(TelegramError::UnexpectedResponse(
                    "users.getUsers returned no user".to_owned(),
                ))
            }
        }
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        debug!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}
