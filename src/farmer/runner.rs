//! Farmer control loop.
//!
//! The loop follows a two-state machine:
//! 1. `NeedLogin`: clear the old token, get a new one from the identity
//!    provider, attach it and log in. Only a login that returns a user moves
//!    the loop on.
//! 2. `Authenticated`: claim tasks (when enabled), take the daily reward and
//!    play the remaining milk games, then pause until the next cycle. Once the
//!    session is older than the relogin interval the loop logs in again.
//!
//! Errors that reach the loop are logged and followed by a short backoff; the
//! state is kept. An invalid session ends the loop.

use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{error, info};

use super::bootstrap::login;
use super::state::{LoopState, Session};
use crate::config::{ConfigError, DEFAULT_REF_ID, FALLBACK_REF_ID, FarmSettings};
use crate::game::{ActionExecutor, GameApi, RewardSampler};
use crate::pacing::{Pacing, Sleeper};
use crate::telegram::{IdentityError, IdentityProvider};

/// Odds, in percent, of sending the referral id rather than the fallback one.
const REF_ID_WEIGHT: u32 = 75;

/// Error that ends a farmer.
#[derive(Debug, Error)]
pub enum FarmError {
    #[error("Invalid session {session}: {reason}")]
    InvalidSession { session: String, reason: String },
}

/// Failure of a single cycle.
#[derive(Debug)]
enum CycleError {
    Fatal(FarmError),
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
}

impl CycleError {
    fn transient(reason: impl ToString) -> Self {
        Self::Transient {
            reason: reason.to_string(),
            retry_after: None,
        }
    }
}

impl From<IdentityError> for CycleError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidSession { session, reason } => {
                Self::Fatal(FarmError::InvalidSession { session, reason })
            }
            IdentityError::Transient {
                reason,
                retry_after,
            } => Self::Transient {
                reason,
                retry_after,
            },
        }
    }
}

/// Immutable settings of one farmer.
#[derive(Debug, Clone)]
pub struct FarmerConfig {
    /// Whether social tasks are checked and claimed.
    pub do_tasks: bool,

    /// Referral id taking part in the start param draw.
    pub ref_id: String,

    /// How long a login is reused.
    pub relogin_interval: Duration,

    /// Whether the outgoing IP is logged on startup.
    pub check_proxy: bool,

    pub pacing: Pacing,

    pub sampler: RewardSampler,
}

impl FarmerConfig {
    /// Derives the farmer config from the loaded settings.
    pub fn from_settings(settings: &FarmSettings, check_proxy: bool) -> Result<Self, ConfigError> {
        let sampler = RewardSampler::new(settings.points, settings.ton_amount).ok_or_else(|| {
            ConfigError::InvalidRange(
                "TON_AMOUNT",
                format!("[{}, {}]", settings.ton_amount.min, settings.ton_amount.max),
            )
        })?;

        Ok(Self {
            do_tasks: settings.do_tasks,
            ref_id: if settings.use_ref {
                settings.ref_id.clone()
            } else {
                DEFAULT_REF_ID.to_owned()
            },
            relogin_interval: settings.relogin_interval,
            check_proxy,
            pacing: Pacing::with_cycle_delay(settings.cycle_delay_secs),
            sampler,
        })
    }
}

/// Runs one account's game loop.
pub struct Farmer<P, A, S> {
    name: String,
    config: FarmerConfig,
    executor: ActionExecutor,
    provider: P,
    api: A,
    sleeper: S,
    rng: StdRng,
    state: LoopState,
}

impl<P, A, S> Farmer<P, A, S>
where
    P: IdentityProvider,
    A: GameApi,
    S: Sleeper,
{
    /// Creates a farmer in the `NeedLogin` state.
    pub fn new(
        name: impl Into<String>,
        config: FarmerConfig,
        provider: P,
        api: A,
        sleeper: S,
    ) -> Self {
        Self {
            name: name.into(),
            executor: ActionExecutor::new(config.pacing, config.sampler),
            config,
            provider,
            api,
            sleeper,
            rng: StdRng::from_entropy(),
            state: LoopState::NeedLogin,
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Runs the farmer until its session turns out to be invalid.
    pub async fn run(mut self) -> Result<(), FarmError> {
        self.start().await;
        loop {
            self.run_cycle().await?;
        }
    }

    /// Waits out the startup delay and logs the outgoing IP. A failed IP
    /// check is only logged.
    async fn start(&mut self) {
        let startup = self.config.pacing.startup.next(&mut self.rng);
        info!("{} will start in {}s", self.name, startup.as_secs());
        self.sleeper.sleep(startup).await;

        if self.config.check_proxy {
            match self.api.check_ip().await {
                Ok(ip) => info!("Proxy IP: {}", ip),
                Err(e) => error!("Proxy check failed: {}", e),
            }
        }
    }

    /// Runs one iteration of the loop, backing off after a recoverable error.
    pub async fn run_cycle(&mut self) -> Result<(), FarmError> {
        match self.cycle().await {
            Ok(()) => Ok(()),
            Err(CycleError::Fatal(e)) => Err(e),
            Err(CycleError::Transient {
                reason,
                retry_after,
            }) => {
                error!("Unknown error: {}", reason);
                let backoff = self.config.pacing.error_backoff.next(&mut self.rng);
                self.sleeper
                    .sleep(retry_after.map_or(backoff, |hint| hint.max(backoff)))
                    .await;
                Ok(())
            }
        }
    }

    async fn cycle(&mut self) -> Result<(), CycleError> {
        if self.state.needs_login() {
            self.state = LoopState::NeedLogin;
            self.authenticate().await?;
        }

        let LoopState::Authenticated(session) = &mut self.state else {
            return Err(CycleError::transient("no session after login"));
        };

        if self.config.do_tasks {
            let user = session.snapshot.clone();
            session.replace(
                self.executor
                    .claim_social(&self.api, &self.sleeper, &mut self.rng, &user)
                    .await,
            );
            session.replace(
                self.executor
                    .run_tasks(&self.api, &self.sleeper, &mut self.rng)
                    .await,
            );
        }

        session.replace(self.executor.daily_reward(&self.api).await);

        let report = self
            .executor
            .daily_milk(
                &self.api,
                &self.sleeper,
                &mut self.rng,
                session.snapshot.daily_milk,
            )
            .await;
        session.replace(report.user);

        let pause = self.config.pacing.cycle.next(&mut self.rng);
        info!("Cycle finished, next one in {}s", pause.as_secs());
        self.sleeper.sleep(pause).await;

        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), CycleError> {
        self.api.clear_authorization();

        let start_param = self.draw_start_param();
        let token = self.provider.acquire_token(&start_param).await?;
        self.api
            .set_authorization(&token)
            .map_err(CycleError::transient)?;

        let user = login(
            &self.api,
            &self.sleeper,
            &mut self.rng,
            self.config.pacing.warmup_backoff,
            &start_param,
        )
        .await
        .ok_or_else(|| CycleError::transient("login returned no user"))?;

        info!(
            "Logged in as {} (points: {}, dailyMilk: {})",
            user.display_name(),
            user.point,
            user.daily_milk
        );
        self.state = LoopState::Authenticated(Session::new(user, self.config.relogin_interval));
        Ok(())
    }

    fn draw_start_param(&mut self) -> String {
        if self.rng.gen_ratio(REF_ID_WEIGHT, 100) {
            self.config.ref_id.clone()
        } else {
            FALLBACK_REF_ID.to_owned()
        }
    }
}

impl<P, A, S> std::fmt::Debug for Farmer<P, A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Farmer")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
