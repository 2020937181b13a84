//! Cows House Bot Library
//!
//! A Telegram web-app farming bot for the Cows House mini-game.
//!
//! This crate provides the core functionality for:
//! - Loading farming settings, proxies and session files
//! - Exchanging a Telegram session for the game's web-app token
//! - Talking to the game REST API
//! - Running the per-account login and farming loop

pub mod config;
pub mod farmer;
pub mod game;
pub mod pacing;
pub mod telegram;
pub mod user_agent;
