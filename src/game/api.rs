//! HTTP client for the game REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::model::{
    AuthRequest, AuthResponse, ClaimDailyResponse, DailyClaim, DailyRewardStatus, MilkReward,
    Outcome, SaveTonResponse, TaskListResponse, TaskRequest, TaskResponse, UserSnapshot,
};
use crate::config::{GAME_API_BASE, Proxy};

/// Status the game answers with while its backend is still starting.
pub const SERVER_WARMING_STATUS: u16 = 520;

const IP_CHECK_URL: &str = "https://httpbin.org/ip";
const IP_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport-level failure of an API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Invalid proxy {proxy}: {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Token is not a valid header value: {0}")]
    InvalidToken(#[from] InvalidHeaderValue),

    #[error("Request to {endpoint} failed: {source}")]
    Send {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected JSON from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Endpoints of the game API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Auth,
    InitialCheck,
    DailyReward,
    ClaimDaily,
    AllTasks,
    SocialCheck,
    ClaimSocial,
    SaveTon,
}

impl Endpoint {
    /// Path relative to the API base.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::InitialCheck => "user/initial-check",
            Self::DailyReward => "task/daily-reward",
            Self::ClaimDaily => "task/claim-daily",
            Self::AllTasks => "task/get/all",
            Self::SocialCheck => "task/social-check",
            Self::ClaimSocial => "task/claim-social",
            Self::SaveTon => "user/save-ton",
        }
    }
}

/// Authenticated access to the game.
///
/// Exactly one authorization token is attached to requests at a time.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Replaces the authorization token sent with every request.
    fn set_authorization(&mut self, token: &str) -> Result<(), ApiError>;

    /// Stops sending any authorization token.
    fn clear_authorization(&mut self);

    async fn auth(&self, start_param: &str) -> Result<Outcome<UserSnapshot>, ApiError>;

    async fn initial_check(&self) -> Result<(), ApiError>;

    /// `Unavailable` when today's reward was already taken.
    async fn daily_reward_status(&self) -> Result<Outcome<()>, ApiError>;

    async fn claim_daily(&self) -> Result<Outcome<DailyClaim>, ApiError>;

    /// Names of every task the game offers.
    async fn all_tasks(&self) -> Result<Outcome<Vec<String>>, ApiError>;

    async fn social_check(&self, task: &str) -> Result<Outcome<Option<UserSnapshot>>, ApiError>;

    async fn claim_social(&self, task: &str) -> Result<Outcome<Option<UserSnapshot>>, ApiError>;

    async fn save_ton(&self, reward: &MilkReward) -> Result<Outcome<UserSnapshot>, ApiError>;

    /// Asks an echo service which IP the requests leave from.
    async fn check_ip(&self) -> Result<String, ApiError>;
}

/// [`GameApi`] over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    http: reqwest::Client,
    base: Url,
    authorization: Option<HeaderValue>,
}

impl HttpGameApi {
    /// Builds a client that presents itself with `user_agent` and routes
    /// through `proxy` when given.
    pub fn new(user_agent: &str, proxy: Option<&Proxy>) -> Result<Self, ApiError> {
        let base = Url::parse(GAME_API_BASE)?;
        Self::with_base(base, user_agent, proxy)
    }

    /// Same as [`HttpGameApi::new`] against another base URL.
    pub fn with_base(base: Url, user_agent: &str, proxy: Option<&Proxy>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers(&base, user_agent)?)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let http = builder.build().map_err(ApiError::Build)?;

        Ok(Self {
            http,
            base,
            authorization: None,
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let name = endpoint.path();
        let url = self.base.join(name)?;

        let mut request = self.http.post(url);
        if let Some(token) = &self.authorization {
            request = request.header(header::AUTHORIZATION, token.clone());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Send { endpoint: name, source })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Send { endpoint: name, source })?
            .to_vec();

        debug!(%status, "POST {}", name);

        Ok(Response {
            endpoint: name,
            status,
            body,
        })
    }

    async fn post_empty(&self, endpoint: Endpoint) -> Result<Response, ApiError> {
        self.post::<()>(endpoint, None).await
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    fn set_authorization(&mut self, token: &str) -> Result<(), ApiError> {
        let mut value = HeaderValue::from_str(&format!("tma {token}"))?;
        value.set_sensitive(true);
        self.authorization = Some(value);
        Ok(())
    }

    fn clear_authorization(&mut self) {
        self.authorization = None;
    }

    async fn auth(&self, start_param: &str) -> Result<Outcome<UserSnapshot>, ApiError> {
        self.post(Endpoint::Auth, Some(&AuthRequest { start_param }))
            .await?
            .decode(|res: AuthResponse| Outcome::Success(res.user))
    }

    async fn initial_check(&self) -> Result<(), ApiError> {
        let response = self.post_empty(Endpoint::InitialCheck).await?;
        if !response.status.is_success() {
            warn!(status = %response.status, "Initial check was not accepted");
        }
        Ok(())
    }

    async fn daily_reward_status(&self) -> Result<Outcome<()>, ApiError> {
        self.post_empty(Endpoint::DailyReward)
            .await?
            .decode(|res: DailyRewardStatus| {
                if res.available {
                    Outcome::Success(())
                } else {
                    Outcome::Unavailable
                }
            })
    }

    async fn claim_daily(&self) -> Result<Outcome<DailyClaim>, ApiError> {
        self.post_empty(Endpoint::ClaimDaily)
            .await?
            .decode(|res: ClaimDailyResponse| {
                Outcome::from_status(
                    &res.status,
                    DailyClaim {
                        days: res.days,
                        user: res.user,
                    },
                )
            })
    }

    async fn all_tasks(&self) -> Result<Outcome<Vec<String>>, ApiError> {
        self.post_empty(Endpoint::AllTasks)
            .await?
            .decode(|res: TaskListResponse| {
                Outcome::Success(res.tasks.into_iter().map(|entry| entry.task).collect())
            })
    }

    async fn social_check(&self, task: &str) -> Result<Outcome<Option<UserSnapshot>>, ApiError> {
        self.post(Endpoint::SocialCheck, Some(&TaskRequest { task }))
            .await?
            .decode(|res: TaskResponse| Outcome::from_status(&res.status, res.user))
    }

    async fn claim_social(&self, task: &str) -> Result<Outcome<Option<UserSnapshot>>, ApiError> {
        self.post(Endpoint::ClaimSocial, Some(&TaskRequest { task }))
            .await?
            .decode(|res: TaskResponse| Outcome::from_status(&res.status, res.user))
    }

    async fn save_ton(&self, reward: &MilkReward) -> Result<Outcome<UserSnapshot>, ApiError> {
        self.post(Endpoint::SaveTon, Some(reward))
            .await?
            .decode(|res: SaveTonResponse| Outcome::Success(res.user))
    }

    async fn check_ip(&self) -> Result<String, ApiError> {
        #[derive(serde::Deserialize)]
        struct Origin {
            #[serde(default)]
            origin: String,
        }

        let endpoint = "ip check";
        let body = self
            .http
            .get(IP_CHECK_URL)
            .timeout(IP_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|source| ApiError::Send { endpoint, source })?
            .bytes()
            .await
            .map_err(|source| ApiError::Send { endpoint, source })?;

        let origin: Origin = serde_json::from_slice(&body)
            .map_err(|source| ApiError::Decode { endpoint, source })?;
        Ok(origin.origin)
    }
}

/// Raw answer of one call, decoded exactly once by [`Response::decode`].
#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub(crate) endpoint: &'static str,
    pub(crate) status: StatusCode,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// Maps the status code and JSON body to an [`Outcome`].
    ///
    /// Warm-up and error statuses never reach `on_body`; a 2xx body that does
    /// not match `T` is an [`ApiError::Decode`].
    pub(crate) fn decode<T, U>(
        self,
        on_body: impl FnOnce(T) -> Outcome<U>,
    ) -> Result<Outcome<U>, ApiError>
    where
        T: DeserializeOwned,
    {
        if self.status.as_u16() == SERVER_WARMING_STATUS {
            return Ok(Outcome::ServerWarming);
        }

        if !self.status.is_success() {
            let body = String::from_utf8_lossy(&self.body);
            return Ok(Outcome::Error(format!("HTTP {}: {}", self.status, truncate(&body, 200))));
        }

        match serde_json::from_slice(&self.body) {
            Ok(parsed) => Ok(on_body(parsed)),
            Err(source) => {
                warn!(
                    response_body = %String::from_utf8_lossy(&self.body),
                    "Bad JSON response from {}", self.endpoint
                );
                Err(ApiError::Decode {
                    endpoint: self.endpoint,
                    source,
                })
            }
        }
    }
}

fn default_headers(base: &Url, user_agent: &str) -> Result<HeaderMap, ApiError> {
    let origin = base.origin().ascii_serialization();

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(header::ORIGIN, HeaderValue::from_str(&origin)?);
    headers.insert(header::REFERER, HeaderValue::from_str(&format!("{origin}/"))?);
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("x-requested-with", HeaderValue::from_static("org.telegram.messenger"));
    headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent)?);
    Ok(headers)
}

fn build_proxy(proxy: &Proxy) -> Result<reqwest::Proxy, ApiError> {
    let to_error = |source| ApiError::Proxy {
        proxy: proxy.to_string(),
        source,
    };
    let mut reqwest_proxy = reqwest::Proxy::all(proxy.to_string()).map_err(to_error)?;
    if let Some(credentials) = &proxy.credentials {
        reqwest_proxy = reqwest_proxy.basic_auth(&credentials.login, &credentials.password);
    }
    Ok(reqwest_proxy)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> Response {
        Response {
            endpoint: "test",
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn daily_status(res: DailyRewardStatus) -> Outcome<()> {
        if res.available {
            Outcome::Success(())
        } else {
            Outcome::Unavailable
        }
    }

    #[test]
    fn test_decode_daily_reward_unavailable() {
        let outcome = response(200, r#"{"available":false}"#)
            .decode(daily_status)
            .unwrap();
        assert_eq!(outcome, Outcome::Unavailable);
    }

    #[test]
    fn test_decode_server_warming() {
        let outcome = response(520, "<html>origin error</html>")
            .decode(daily_status)
            .unwrap();
        assert_eq!(outcome, Outcome::ServerWarming);
    }

    #[test]
    fn test_decode_error_status_keeps_body() {
        let outcome = response(403, "forbidden").decode(daily_status).unwrap();
        assert!(matches!(
            outcome,
            Outcome::Error(reason) if reason.contains("403") && reason.contains("forbidden")
        ));
    }

    #[test]
    fn test_decode_bad_json_is_an_error() {
        let err = response(200, "not json").decode(daily_status).unwrap_err();
        assert!(matches!(err, ApiError::Decode { endpoint: "test", .. }));
    }

    #[test]
    fn test_decode_social_check_success() {
        let outcome = response(
            201,
            r#"{"status":"success","user":{"tasks":[{"name":"t1","claimed":false}]}}"#,
        )
        .decode(|res: TaskResponse| Outcome::from_status(&res.status, res.user))
        .unwrap();

        let Outcome::Success(Some(user)) = outcome else {
            panic!("unexpected outcome");
        };
        assert_eq!(user.tasks.len(), 1);
        assert_eq!(user.tasks[0].name, "t1");
    }

    #[test]
    fn test_decode_save_ton_with_null_profile_fields() {
        let outcome = response(
            201,
            r#"{"user":{"firstName":"Ann","username":null,"tasks":null,"dailyMilk":3}}"#,
        )
        .decode(|res: SaveTonResponse| Outcome::Success(res.user))
        .unwrap();

        let Outcome::Success(user) = outcome else {
            panic!("unexpected outcome");
        };
        assert_eq!(user.daily_milk, 3);
        assert!(user.username.is_empty());
        assert!(user.tasks.is_empty());
    }

    #[test]
    fn test_endpoint_paths_join_base() {
        let base = Url::parse(GAME_API_BASE).unwrap();
        assert_eq!(
            base.join(Endpoint::SaveTon.path()).unwrap().as_str(),
            "https://realcowshouse.fun/api/user/save-ton"
        );
        assert_eq!(
            base.join(Endpoint::AllTasks.path()).unwrap().as_str(),
            "https://realcowshouse.fun/api/task/get/all"
        );
    }

    #[test]
    fn test_authorization_is_replaced_not_stacked() {
        let mut api = HttpGameApi::new("test-agent", None).unwrap();
        assert!(api.authorization.is_none());

        api.set_authorization("first").unwrap();
        api.set_authorization("second").unwrap();
        assert_eq!(
            api.authorization.as_ref().unwrap().to_str().unwrap(),
            "tma second"
        );

        api.clear_authorization();
        assert!(api.authorization.is_none());
    }

    #[test]
    fn test_token_with_newline_is_rejected() {
        let mut api = HttpGameApi::new("test-agent", None).unwrap();
        assert!(matches!(
            api.set_authorization("bad\ntoken"),
            Err(ApiError::InvalidToken(_))
        ));
        assert!(api.authorization.is_none());
    }
}
