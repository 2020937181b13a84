//! Cows House Bot - Main Entry Point
//!
//! Runs one farming loop per Telegram session found in the sessions
//! directory, or signs in a new session with `--add-session`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::{Input, Password};
use rand::thread_rng;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use cowshouse_bot::config::{
    FarmSettings, TelegramConfig, assign_proxies, discover_sessions, load_proxies, session_path,
};
use cowshouse_bot::farmer::{FarmError, Farmer, FarmerConfig};
use cowshouse_bot::game::HttpGameApi;
use cowshouse_bot::pacing::TokioSleeper;
use cowshouse_bot::telegram::{SessionIdentity, TelegramBot, TelegramError, TelegramIdentity};
use cowshouse_bot::user_agent::UserAgentStore;

/// Telegram web-app farming bot for Cows House.
#[derive(Parser, Debug)]
#[command(name = "cowshouse_bot")]
#[command(about = "Farm the Cows House mini-game with one or more Telegram sessions")]
#[command(version)]
struct Args {
    /// Directory holding the `*.session` files.
    #[arg(short, long, default_value = "sessions")]
    sessions_dir: PathBuf,

    /// Proxy list, one URL per line.
    #[arg(short, long, default_value = "proxies.txt")]
    proxies: PathBuf,

    /// File persisting the user agent of each session.
    #[arg(short, long, default_value = "user_agents.json")]
    user_agents: PathBuf,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Sign in a new session with this name and exit.
    #[arg(long, value_name = "NAME")]
    add_session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    if let Some(name) = &args.add_session {
        return add_session(&tg_config, &args.sessions_dir, name).await;
    }

    let settings =
        FarmSettings::from_env_with_defaults().context("Failed to load farming settings")?;

    info!(
        "Settings loaded (play games: {}, tasks: {}, ref: {}, proxies from file: {})",
        settings.play_games, settings.do_tasks, settings.use_ref, settings.use_proxy_from_file
    );

    let sessions = discover_sessions(&args.sessions_dir)?;
    if sessions.is_empty() {
        bail!(
            "No session files found in {}. Add one with --add-session <NAME>",
            args.sessions_dir.display()
        );
    }
    info!("Found {} sessions", sessions.len());

    let proxies = if settings.use_proxy_from_file {
        assign_proxies(sessions.len(), &load_proxies(&args.proxies))
    } else {
        vec![None; sessions.len()]
    };

    let mut user_agents = UserAgentStore::load(&args.user_agents);
    let mut farmers = JoinSet::new();

    for (session, proxy) in sessions.into_iter().zip(proxies) {
        let user_agent = user_agents
            .get_or_create(&session.name, &mut thread_rng())
            .with_context(|| format!("Failed to store user agent for {}", session.name))?;

        let api = HttpGameApi::new(&user_agent, proxy.as_ref())
            .with_context(|| format!("Failed to build HTTP client for {}", session.name))?;

        let config = FarmerConfig::from_settings(&settings, proxy.is_some())
            .context("Invalid farming settings")?;
        let name = session.name;
        let identity = TelegramIdentity::new(
            SessionIdentity {
                name: name.clone(),
                session_path: session.path,
                proxy,
            },
            tg_config.clone(),
        );

        let span = info_span!("farmer", session = %name);
        let farmer = Farmer::new(name.clone(), config, identity, api, TokioSleeper);
        farmers.spawn(async move { (name, farmer.run().await) }.instrument(span));
    }

    info!("Bot is running. Use Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        () = wait_all(&mut farmers) => {
            warn!("Every session has stopped");
        }
    }

    farmers.shutdown().await;
    Ok(())
}

/// Waits for every farmer to finish, logging each one.
async fn wait_all(farmers: &mut JoinSet<(String, Result<(), FarmError>)>) {
    while let Some(joined) = farmers.join_next().await {
        match joined {
            Ok((name, Err(e))) => warn!("Invalid Session {}: {}", name, e),
            Ok((name, Ok(()))) => info!("Session {} finished", name),
            Err(e) => error!("Farmer task failed: {}", e),
        }
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Signs in a new session file interactively.
async fn add_session(config: &TelegramConfig, dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create sessions directory {}", dir.display()))?;

    let path = session_path(dir, name);
    let bot = TelegramBot::connect(config, &path, None)
        .await
        .context("Failed to connect to Telegram")?;

    let result = if bot.is_authorized().await.context("Failed to check authorization")? {
        info!("Session {} is already signed in", name);
        Ok(())
    } else {
        authenticate(&bot, config).await
    };

    bot.disconnect();
    result?;

    info!("Session saved to {}", path.display());
    Ok(())
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}
