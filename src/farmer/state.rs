//! Farmer loop state.

use std::time::{Duration, Instant};

use crate::game::UserSnapshot;

/// An authenticated game session and the latest snapshot it produced.
#[derive(Debug, Clone)]
pub struct Session {
    /// Latest user object returned by the server.
    pub snapshot: UserSnapshot,

    /// When the login that opened this session completed.
    logged_in_at: Instant,

    /// How long the session is reused before logging in again.
    relogin_after: Duration,
}

impl Session {
    #[must_use]
    pub fn new(snapshot: UserSnapshot, relogin_after: Duration) -> Self {
        Self {
            snapshot,
            logged_in_at: Instant::now(),
            relogin_after,
        }
    }

    /// Replaces the snapshot when a response carried a fresh user object.
    pub fn replace(&mut self, user: Option<UserSnapshot>) {
        if let Some(user) = user {
            self.snapshot = user;
        }
    }

    /// Checks whether the session should be refreshed by logging in again.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.logged_in_at.elapsed() >= self.relogin_after
    }
}

/// Where the farmer loop currently is.
#[derive(Debug, Clone, Default)]
pub enum LoopState {
    /// No usable token; the next cycle logs in.
    #[default]
    NeedLogin,

    /// Logged in; the next cycle farms.
    Authenticated(Session),
}

impl LoopState {
    /// Checks if the next cycle has to log in first.
    #[must_use]
    pub fn needs_login(&self) -> bool {
        match self {
            Self::NeedLogin => true,
            Self::Authenticated(session) => session.is_expired(),
        }
    }

    /// Returns the current session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::NeedLogin => None,
            Self::Authenticated(session) => Some(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(daily_milk: u32) -> UserSnapshot {
        UserSnapshot {
            daily_milk,
            ..UserSnapshot::default()
        }
    }

    #[test]
    fn test_default_state_needs_login() {
        let state = LoopState::default();
        assert!(state.needs_login());
        assert!(state.session().is_none());
    }

    #[test]
    fn test_fresh_session_is_reused() {
        let state = LoopState::Authenticated(Session::new(snapshot(2), Duration::from_secs(60)));
        assert!(!state.needs_login());
        assert_eq!(state.session().unwrap().snapshot.daily_milk, 2);
    }

    #[test]
    fn test_zero_interval_session_expires_immediately() {
        let state = LoopState::Authenticated(Session::new(snapshot(2), Duration::ZERO));
        assert!(state.needs_login());
        assert!(state.session().unwrap().is_expired());
    }

    #[test]
    fn test_replace_keeps_snapshot_without_user() {
        let mut session = Session::new(snapshot(2), Duration::from_secs(60));
        session.replace(None);
        assert_eq!(session.snapshot.daily_milk, 2);
        session.replace(Some(snapshot(0)));
        assert_eq!(session.snapshot.daily_milk, 0);
    }
}
