//! The Cows House game: wire model, HTTP client and the routines that farm it.

mod actions;
mod api;
mod model;
mod reward;

pub use actions::{ActionExecutor, MilkReport};
pub use api::{ApiError, Endpoint, GameApi, HttpGameApi, SERVER_WARMING_STATUS};
pub use model::{DailyClaim, MilkReward, Outcome, UserId, UserSnapshot, UserTask};
pub use reward::RewardSampler;

#[cfg(test)]
pub(crate) use actions::testing;
