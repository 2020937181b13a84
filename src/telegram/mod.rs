//! Telegram client wrapper module.
//!
//! Provides session sign-in and the identity provider that exchanges a
//! signed-in session for the game's web-app auth token.

mod client;
mod identity;

pub use client::{
    AccountInfo, PwdToken as PasswordToken, TelegramBot, TelegramError, Token as LoginToken,
    WebViewRequest,
};
pub use identity::{
    IdentityError, IdentityProvider, SessionIdentity, TelegramIdentity, extract_web_app_data,
};
