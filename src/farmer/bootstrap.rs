//! Game login with an already attached token.

use rand::Rng;
use tracing::{error, info, warn};

use crate::game::{GameApi, Outcome, UserSnapshot};
use crate::pacing::{Delay, Sleeper};

/// Logs in to the game and returns the user snapshot.
///
/// While the server answers with its warm-up status the call is repeated
/// after `warmup`. Accounts the server has not initialized yet get the
/// one-shot initial check. Any failure yields `None`.
pub async fn login<A, S, R>(
    api: &A,
    sleeper: &S,
    rng: &mut R,
    warmup: Delay,
    start_param: &str,
) -> Option<UserSnapshot>
where
    A: GameApi + ?Sized,
    S: Sleeper + ?Sized,
    R: Rng + Send + ?Sized,
{
    let user = loop {
        match api.auth(start_param).await {
            Ok(Outcome::Success(user)) => break user,
            Ok(Outcome::ServerWarming) => {
                warn!("Game server is warming up, logging in again");
                sleeper.sleep(warmup.next(rng)).await;
            }
            Ok(other) => {
                error!("Login rejected: {:?}", other);
                return None;
            }
            Err(e) => {
                error!("Login error: {}", e);
                return None;
            }
        }
    };

    if !user.initialized {
        info!("Account not initialized yet, running initial check");
        if let Err(e) = api.initial_check().await {
            warn!("Initial check failed: {}", e);
        }
    }

    Some(user)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::game::testing::FakeGameApi;
    use crate::pacing::testing::RecordingSleeper;

    const WARMUP: Delay = Delay::Fixed(Duration::from_secs(3));

    fn user(initialized: bool) -> UserSnapshot {
        UserSnapshot {
            initialized,
            daily_milk: 2,
            ..UserSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_login_uninitialized_runs_initial_check_once() {
        let api = FakeGameApi::default();
        api.auth_replies
            .lock()
            .unwrap()
            .push_back(Outcome::Success(user(false)));
        let sleeper = RecordingSleeper::default();

        let snapshot = login(&api, &sleeper, &mut StdRng::seed_from_u64(0), WARMUP, "ref")
            .await
            .unwrap();

        assert_eq!(snapshot.daily_milk, 2);
        assert_eq!(api.calls(), ["auth ref", "initial_check"]);
    }

    #[tokio::test]
    async fn test_login_initialized_skips_initial_check() {
        let api = FakeGameApi::default();
        api.auth_replies
            .lock()
            .unwrap()
            .push_back(Outcome::Success(user(true)));
        let sleeper = RecordingSleeper::default();

        login(&api, &sleeper, &mut StdRng::seed_from_u64(0), WARMUP, "ref")
            .await
            .unwrap();

        assert_eq!(api.count("initial_check"), 0);
    }

    #[tokio::test]
    async fn test_login_retries_while_server_warms_up() {
        let api = FakeGameApi::default();
        api.auth_replies.lock().unwrap().extend([
            Outcome::ServerWarming,
            Outcome::ServerWarming,
            Outcome::Success(user(true)),
        ]);
        let sleeper = RecordingSleeper::default();

        let snapshot = login(&api, &sleeper, &mut StdRng::seed_from_u64(0), WARMUP, "ref").await;

        assert!(snapshot.is_some());
        assert_eq!(api.count("auth"), 3);
        assert_eq!(sleeper.total(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_login_rejected_yields_none() {
        let api = FakeGameApi::default();
        api.auth_replies
            .lock()
            .unwrap()
            .push_back(Outcome::Error("HTTP 401: unauthorized".to_owned()));
        let sleeper = RecordingSleeper::default();

        let snapshot = login(&api, &sleeper, &mut StdRng::seed_from_u64(0), WARMUP, "ref").await;

        assert!(snapshot.is_none());
        assert_eq!(api.calls(), ["auth ref"]);
    }
}
