use crate::auth::OAuth1Signer;
use crate::metrics::{MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimiter, ServerBudget};
use crate::retry::{execute_with_wait, WaitPolicy};
use crate::TimelineSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repcount_core::{AppConfig, CoreError, Credentials, RawPost, TwitterApiError};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use url::Url;

pub const USER_TIMELINE_ENDPOINT: &str = "/statuses/user_timeline.json";
/// `created_at` layout used by the v1.1 API, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
/// Fallback wait when a 429 carries no reset information (one full window).
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetData {
    pub id_str: String,
    pub created_at: String,
    #[serde(alias = "full_text")]
    pub text: String,
    #[serde(default)]
    pub entities: Map<String, Value>,
}

impl TryFrom<TweetData> for RawPost {
    type Error = CoreError;

    fn try_from(tweet: TweetData) -> Result<Self, Self::Error> {
        let created_at = parse_created_at(&tweet.created_at)?;
        Ok(Self {
            id: tweet.id_str,
            created_at,
            text: tweet.text,
            entities: tweet.entities,
        })
    }
}

pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CoreError::TwitterApi(TwitterApiError::InvalidResponse {
                details: format!("Unparseable created_at '{}': {}", value, e),
            })
        })
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    code: Option<i64>,
    message: String,
}

/// Folds an `{"errors":[{"code","message"}]}` body into one line.
pub fn describe_error_body(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let described = parsed
        .errors
        .iter()
        .map(|entry| match entry.code {
            Some(code) => format!("{} (code {})", entry.message, code),
            None => entry.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    (!described.is_empty()).then_some(described)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Seconds to wait after a 429: until `x-rate-limit-reset`, else
/// `retry-after`, else one full window.
pub fn retry_after_from_headers(headers: &HeaderMap, now: SystemTime) -> u64 {
    let now_secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    if let Some(reset) = header_u64(headers, "x-rate-limit-reset") {
        return reset.saturating_sub(now_secs);
    }
    header_u64(headers, "retry-after").unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
}

pub fn server_budget_from_headers(headers: &HeaderMap) -> Option<ServerBudget> {
    let remaining = header_u64(headers, "x-rate-limit-remaining")?;
    let reset = header_u64(headers, "x-rate-limit-reset")?;
    Some(ServerBudget {
        limit: header_u64(headers, "x-rate-limit-limit").map(|limit| limit as u32),
        remaining: remaining as u32,
        reset_at: UNIX_EPOCH + Duration::from_secs(reset),
    })
}

/// Maps a non-success status to the error the caller sees. `subject` names
/// what was requested (the screen name for timeline requests).
pub fn error_for_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    endpoint: &str,
    subject: &str,
) -> TwitterApiError {
    let details = describe_error_body(body).unwrap_or_else(|| status.to_string());
    match status.as_u16() {
        429 => TwitterApiError::RateLimitExceeded {
            retry_after: retry_after_from_headers(headers, SystemTime::now()),
        },
        401 if details.contains("code 89") => TwitterApiError::InvalidCredentials,
        401 => TwitterApiError::AuthenticationFailed { reason: details },
        403 => TwitterApiError::Forbidden {
            resource: format!("{} ({})", endpoint, details),
        },
        404 => TwitterApiError::UserNotFound {
            screen_name: subject.to_string(),
        },
        code if status.is_server_error() => TwitterApiError::ServerError { status_code: code },
        _ => TwitterApiError::InvalidResponse { details },
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub wait_policy: WaitPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ClientConfig {
    fn from(config: &AppConfig) -> Self {
        let wait_policy = if config.wait_on_rate_limit {
            WaitPolicy::default()
        } else {
            WaitPolicy::fail_fast()
        };
        Self {
            api_base: config.api_base.clone(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimitConfig::user_timeline(),
            wait_policy,
        }
    }
}

#[derive(Debug)]
pub struct TwitterApiClient {
    http_client: Client,
    signer: OAuth1Signer,
    api_base: Url,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    wait_policy: WaitPolicy,
}

impl TwitterApiClient {
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, CoreError> {
        let api_base = Url::parse(&config.api_base).map_err(|e| CoreError::InvalidInput {
            message: format!("Invalid API base '{}': {}", config.api_base, e),
        })?;

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            signer: OAuth1Signer::new(credentials),
            api_base,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            metrics: Arc::new(MetricsCollector::new()),
            wait_policy: config.wait_policy,
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.api_base.as_str().trim_end_matches('/'),
            endpoint
        )
    }

    /// Issues one signed GET, sleeping through rate-limit windows as the
    /// wait policy allows.
    pub async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        subject: &str,
    ) -> Result<Response, CoreError> {
        execute_with_wait(&self.wait_policy, &self.metrics, endpoint, move || {
            self.send_once(endpoint, query_params, subject)
        })
        .await
    }

    async fn send_once(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        subject: &str,
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint);
        let authorization = self
            .signer
            .authorization_header("GET", &url, query_params)?;

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for GET {} after {:?}",
            endpoint, permit.queue_wait_time
        );

        let start_time = Instant::now();
        info!("Making Twitter API request: GET {}", endpoint);
        let result = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .query(query_params)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                self.record(endpoint, None, start_time, false, Some("network_error"))
                    .await;
                return Err(if e.is_timeout() {
                    CoreError::TwitterApi(TwitterApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                });
            }
        };

        let status = response.status();
        if let Some(budget) = server_budget_from_headers(response.headers()) {
            debug!(
                "Server budget: {} remaining until {:?}",
                budget.remaining, budget.reset_at
            );
            self.rate_limiter.record_server_budget(budget).await;
        }

        if status.is_success() {
            self.rate_limiter.record_success().await;
            self.record(endpoint, Some(status), start_time, true, None)
                .await;
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let api_error = error_for_status(status, &headers, &body, endpoint, subject);

        if let TwitterApiError::RateLimitExceeded { retry_after } = &api_error {
            warn!("Rate limited, retry after {} seconds", retry_after);
            self.rate_limiter.record_rate_limited().await;
            self.record(endpoint, Some(status), start_time, false, Some("rate_limited"))
                .await;
        } else {
            error!(
                "Request failed with status: {} for {}: {}",
                status, endpoint, api_error
            );
            self.record(endpoint, Some(status), start_time, false, Some("http_error"))
                .await;
        }

        Err(CoreError::TwitterApi(api_error))
    }

    async fn record(
        &self,
        endpoint: &str,
        status: Option<StatusCode>,
        start_time: Instant,
        success: bool,
        error_type: Option<&str>,
    ) {
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                method: "GET".to_string(),
                status_code: status.map(|s| s.as_u16()),
                response_time: start_time.elapsed(),
                success,
                rate_limited: status == Some(StatusCode::TOO_MANY_REQUESTS),
                error_type: error_type.map(str::to_string),
            })
            .await;
    }

    /// One page of `screen_name`'s timeline, newest first, with ids at or
    /// below `max_id` when given.
    pub async fn get_user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<u64>,
    ) -> Result<Vec<RawPost>, CoreError> {
        let count_str = count.to_string();
        let max_id_str = max_id.map(|id| id.to_string());

        let mut params = vec![
            ("screen_name", screen_name),
            ("count", count_str.as_str()),
            ("tweet_mode", "extended"),
            ("include_rts", "true"),
        ];
        if let Some(ref max_id) = max_id_str {
            params.push(("max_id", max_id.as_str()));
        }

        let response = self
            .get(USER_TIMELINE_ENDPOINT, &params, screen_name)
            .await?;

        let tweets: Vec<TweetData> = response.json().await.map_err(|e| {
            error!("Failed to parse timeline for @{}: {}", screen_name, e);
            CoreError::TwitterApi(TwitterApiError::InvalidResponse {
                details: format!("Failed to parse timeline for @{}", screen_name),
            })
        })?;

        debug!(
            "Retrieved {} posts from @{} (max_id {:?})",
            tweets.len(),
            screen_name,
            max_id
        );
        tweets.into_iter().map(RawPost::try_from).collect()
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

#[async_trait]
impl TimelineSource for TwitterApiClient {
    async fn user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<u64>,
    ) -> Result<Vec<RawPost>, CoreError> {
        self.get_user_timeline(screen_name, count, max_id).await
    }
}
