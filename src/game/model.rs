//! Wire types of the game API.

use serde::{Deserialize, Deserializer, Serialize};

/// Decoded result of one API call.
///
/// Transport failures are reported separately as [`super::ApiError`]; this
/// enum only carries answers the server actually gave.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The call did what it was asked to.
    Success(T),
    /// The action is not available right now (e.g. daily reward already taken).
    Unavailable,
    /// The server is still warming up and asks to retry shortly.
    ServerWarming,
    /// The server refused the call.
    Error(String),
}

impl<T> Outcome<T> {
    /// Decodes a `"status"` field: `"success"` succeeds with `value`.
    pub fn from_status(status: &str, value: T) -> Self {
        if status == "success" {
            Self::Success(value)
        } else {
            Self::Error(format!("status {status:?}"))
        }
    }
}

/// User identifier, which the server sends either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

/// One task entry inside a user object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTask {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub claimed: bool,
}

/// Latest known server-side state of the player.
///
/// Every response carrying a user object replaces the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,

    #[serde(deserialize_with = "null_as_default")]
    pub first_name: String,

    #[serde(deserialize_with = "null_as_default")]
    pub username: String,

    #[serde(deserialize_with = "lenient_f64")]
    pub point: f64,

    #[serde(deserialize_with = "lenient_f64")]
    pub ton: f64,

    #[serde(deserialize_with = "lenient_u32")]
    pub daily_milk: u32,

    #[serde(deserialize_with = "null_as_default")]
    pub initialized: bool,

    #[serde(deserialize_with = "null_as_default")]
    pub tasks: Vec<UserTask>,
}

impl UserSnapshot {
    /// Name suitable for log lines.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }

    /// Tasks that still wait for their claim.
    pub fn unclaimed_tasks(&self) -> impl Iterator<Item = &UserTask> {
        self.tasks.iter().filter(|task| !task.claimed)
    }
}

/// `POST auth` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    pub start_param: &'a str,
}

/// `POST auth` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserSnapshot,
}

/// `POST task/daily-reward` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyRewardStatus {
    #[serde(default)]
    pub available: bool,
}

/// `POST task/claim-daily` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimDailyResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub days: u32,
    pub user: Option<UserSnapshot>,
}

/// Successful daily reward claim.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyClaim {
    pub days: u32,
    pub user: Option<UserSnapshot>,
}

/// One entry of `POST task/get/all`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub task: String,
}

/// `POST task/get/all` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskListResponse {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// Body of both `task/social-check` and `task/claim-social`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRequest<'a> {
    pub task: &'a str,
}

/// Response of both `task/social-check` and `task/claim-social`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub status: String,
    pub user: Option<UserSnapshot>,
}

/// `POST user/save-ton` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkReward {
    /// Amount formatted with three decimals.
    pub ton_amount: String,
    pub bonus: u32,
}

/// `POST user/save-ton` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveTonResponse {
    pub user: UserSnapshot,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Null(()),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        NumberOrText::Null(()) => Ok(0.0),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = lenient_f64(deserializer)?;
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(serde::de::Error::custom(format!("{value} is not a valid count")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_snapshot_from_login_payload() {
        let json = r#"{
            "_id": "66a1",
            "firstName": "Daisy",
            "username": "daisy_cow",
            "point": 1520,
            "ton": "0.512",
            "dailyMilk": 2,
            "initialized": false,
            "tasks": [{"name": "t1", "claimed": false}, {"name": "t2", "claimed": true}],
            "somethingNew": 1
        }"#;
        let user: UserSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, Some(UserId::Text("66a1".to_owned())));
        assert_eq!(user.display_name(), "Daisy");
        assert!((user.point - 1520.0).abs() < f64::EPSILON);
        assert!((user.ton - 0.512).abs() < 1e-9);
        assert_eq!(user.daily_milk, 2);
        assert!(!user.initialized);
        let unclaimed: Vec<_> = user.unclaimed_tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(unclaimed, ["t1"]);
    }

    #[test]
    fn test_partial_user_defaults() {
        let user: UserSnapshot =
            serde_json::from_str(r#"{"dailyMilk": 0, "point": 10, "ton": null}"#).unwrap();
        assert_eq!(user.daily_milk, 0);
        assert!(user.tasks.is_empty());
        assert_eq!(user.ton, 0.0);
        assert_eq!(user.display_name(), "");
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"{"user": {
            "firstName": null,
            "username": null,
            "dailyMilk": 3,
            "initialized": null,
            "tasks": null
        }}"#;
        let res: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.user.username, "");
        assert_eq!(res.user.daily_milk, 3);
        assert!(!res.user.initialized);
        assert!(res.user.tasks.is_empty());

        let task: UserTask = serde_json::from_str(r#"{"name": "t1", "claimed": null}"#).unwrap();
        assert!(!task.claimed);
    }

    #[test]
    fn test_negative_daily_milk_rejected() {
        assert!(serde_json::from_str::<UserSnapshot>(r#"{"dailyMilk": -1}"#).is_err());
    }

    #[test]
    fn test_milk_reward_wire_format() {
        let reward = MilkReward {
            ton_amount: "0.047".to_owned(),
            bonus: 57,
        };
        assert_eq!(
            serde_json::to_value(&reward).unwrap(),
            serde_json::json!({"tonAmount": "0.047", "bonus": 57})
        );
    }

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(Outcome::from_status("success", 1), Outcome::Success(1));
        assert!(matches!(Outcome::from_status("failed", 1), Outcome::Error(_)));
    }
}
