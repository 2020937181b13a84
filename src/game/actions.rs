//! Game routines run against an authenticated [`GameApi`].
//!
//! Each routine logs and swallows its own failures so that one broken call
//! never stops the routines after it. Routines that receive a fresh user
//! object hand it back so the caller can replace its snapshot.

use rand::Rng;
use tracing::{error, info, warn};

use super::api::GameApi;
use super::model::{Outcome, UserSnapshot};
use super::reward::RewardSampler;
use crate::pacing::{Pacing, Sleeper};

/// Result of a milk session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilkReport {
    /// Number of save-ton calls issued.
    pub calls: u32,
    /// Latest user object the server returned.
    pub user: Option<UserSnapshot>,
}

/// Runs the daily reward, task and milk routines.
#[derive(Debug, Clone, Copy)]
pub struct ActionExecutor {
    pacing: Pacing,
    sampler: RewardSampler,
}

impl ActionExecutor {
    #[must_use]
    pub const fn new(pacing: Pacing, sampler: RewardSampler) -> Self {
        Self { pacing, sampler }
    }

    /// Claims the daily reward when it is available.
    pub async fn daily_reward<A>(&self, api: &A) -> Option<UserSnapshot>
    where
        A: GameApi + ?Sized,
    {
        match api.daily_reward_status().await {
            Ok(Outcome::Success(())) => {}
            Ok(Outcome::Unavailable) => {
                info!("Daily reward already claimed");
                return None;
            }
            Ok(other) => {
                warn!("Daily reward status not available: {:?}", other);
                return None;
            }
            Err(e) => {
                error!("Daily reward error: {}", e);
                return None;
            }
        }

        match api.claim_daily().await {
            Ok(Outcome::Success(claim)) => {
                let balance = claim.user.as_ref().map_or(0.0, |user| user.point);
                info!("Daily reward claimed, days: {}, balance: {}", claim.days, balance);
                claim.user
            }
            Ok(other) => {
                warn!("Daily reward claim rejected: {:?}", other);
                None
            }
            Err(e) => {
                error!("Daily reward claim error: {}", e);
                None
            }
        }
    }

    /// Claims every task still marked unclaimed in `user`.
    ///
    /// Returns the user object of the last successful claim.
    pub async fn claim_social<A, S, R>(
        &self,
        api: &A,
        sleeper: &S,
        rng: &mut R,
        user: &UserSnapshot,
    ) -> Option<UserSnapshot>
    where
        A: GameApi + ?Sized,
        S: Sleeper + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let mut latest = None;

        for task in user.unclaimed_tasks() {
            sleeper.sleep(self.pacing.action.next(rng)).await;

            match api.claim_social(&task.name).await {
                Ok(Outcome::Success(user)) => {
                    info!("Claimed task {}", task.name);
                    if user.is_some() {
                        latest = user;
                    }
                }
                Ok(other) => warn!("Task {} not claimed: {:?}", task.name, other),
                Err(e) => {
                    error!("Claim task {} error: {}", task.name, e);
                    break;
                }
            }
        }

        latest
    }

    /// Verifies one task and, on success, claims whatever the returned user
    /// still has unclaimed.
    pub async fn social_check<A, S, R>(
        &self,
        api: &A,
        sleeper: &S,
        rng: &mut R,
        task: &str,
    ) -> Option<UserSnapshot>
    where
        A: GameApi + ?Sized,
        S: Sleeper + ?Sized,
        R: Rng + Send + ?Sized,
    {
        sleeper.sleep(self.pacing.action.next(rng)).await;

        match api.social_check(task).await {
            Ok(Outcome::Success(Some(user))) => {
                info!("Task check passed: {}", task);
                let claimed = self.claim_social(api, sleeper, rng, &user).await;
                Some(claimed.unwrap_or(user))
            }
            Ok(Outcome::Success(None)) => {
                info!("Task check passed: {}", task);
                None
            }
            Ok(other) => {
                warn!("Task check for {} not passed: {:?}", task, other);
                None
            }
            Err(e) => {
                error!("Task check {} error: {}", task, e);
                None
            }
        }
    }

    /// Lists all tasks and runs the check-then-claim sequence for each.
    pub async fn run_tasks<A, S, R>(
        &self,
        api: &A,
        sleeper: &S,
        rng: &mut R,
    ) -> Option<UserSnapshot>
    where
        A: GameApi + ?Sized,
        S: Sleeper + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let tasks = match api.all_tasks().await {
            Ok(Outcome::Success(tasks)) => tasks,
            Ok(other) => {
                warn!("Could not list tasks: {:?}", other);
                return None;
            }
            Err(e) => {
                error!("Get tasks error: {}", e);
                return None;
            }
        };

        let mut latest = None;
        for task in &tasks {
            if let Some(user) = self.social_check(api, sleeper, rng, task).await {
                latest = Some(user);
            }
        }
        latest
    }

    /// Plays up to `remaining` milk games.
    ///
    /// Stops when `remaining` runs out, when the server reports no plays left
    /// or at the first failed call.
    pub async fn daily_milk<A, S, R>(
        &self,
        api: &A,
        sleeper: &S,
        rng: &mut R,
        mut remaining: u32,
    ) -> MilkReport
    where
        A: GameApi + ?Sized,
        S: Sleeper + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let mut report = MilkReport::default();

        while remaining > 0 {
            info!("Starting milk game, {} left", remaining);
            sleeper.sleep(self.pacing.play.next(rng)).await;

            let reward = self.sampler.sample(rng);
            report.calls += 1;

            let user = match api.save_ton(&reward).await {
                Ok(Outcome::Success(user)) => user,
                Ok(other) => {
                    warn!("Milk game result rejected: {:?}", other);
                    break;
                }
                Err(e) => {
                    error!("Error occurred during milk game: {}", e);
                    break;
                }
            };

            let left = user.daily_milk;
            let (point, ton) = (user.point, user.ton);
            report.user = Some(user);

            if left == 0 {
                info!(
                    "Milk game saved (tonAmount: {}, bonus: {}), no plays left",
                    reward.ton_amount, reward.bonus
                );
                break;
            }

            info!(
                "Milk game saved (tonAmount: {}, bonus: {}), dailyMilk: {}",
                reward.ton_amount, reward.bonus, left
            );
            info!("Point: {}, ton: {}", point, ton);

            remaining -= 1;
            sleeper.sleep(self.pacing.action.next(rng)).await;
        }

        report
    }
}
