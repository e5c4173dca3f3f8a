use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
    pub max_concurrent: u32,
}

impl RateLimitConfig {
    pub fn user_timeline() -> Self {
        Self {
            max_requests: 900, // statuses/user_timeline allows 900 requests per user per window
            time_window: Duration::from_secs(15 * 60), // 15 minute window
            burst_allowance: 15,
            max_concurrent: 1, // pagination is strictly sequential
        }
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    tokens: Arc<Mutex<f64>>,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Arc<Mutex<Instant>>,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            tokens: Arc::new(Mutex::new(capacity)),
            capacity,
            refill_rate,
            last_refill: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut tokens = self.refill().await;
        if *tokens >= tokens_needed {
            *tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - *tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn get_available_tokens(&self) -> f64 {
        *self.refill().await
    }

    async fn refill(&self) -> tokio::sync::MutexGuard<'_, f64> {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        let mut last_refill = self.last_refill.lock().await;

        let elapsed = now.duration_since(*last_refill);
        *tokens = (*tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        *last_refill = now;

        tokens
    }
}

/// Budget the server reported on its most recent response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBudget {
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_at: SystemTime,
}

impl ServerBudget {
    pub fn wait_time(&self) -> Option<Duration> {
        if self.remaining > 0 {
            return None;
        }
        self.reset_at.duration_since(SystemTime::now()).ok()
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
    window_tracker: Arc<Mutex<WindowTracker>>,
    server_budget: Arc<Mutex<Option<ServerBudget>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1) as usize));
        let token_bucket = TokenBucket::new(&config);
        let window_tracker = Arc::new(Mutex::new(WindowTracker::new(config.time_window)));

        Self {
            token_bucket,
            semaphore,
            config,
            window_tracker,
            server_budget: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits until both the local bucket and the last server-reported budget
    /// allow another request.
    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        let server_wait = self
            .server_budget
            .lock()
            .await
            .and_then(|budget| budget.wait_time());
        if let Some(wait_time) = server_wait {
            tracing::warn!("Server budget exhausted, waiting {:?} for window reset", wait_time);
            sleep(wait_time).await;
        }

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        self.window_tracker.lock().await.record_request();

        RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        }
    }

    pub async fn record_server_budget(&self, budget: ServerBudget) {
        *self.server_budget.lock().await = Some(budget);
    }

    pub async fn record_success(&self) {
        self.window_tracker.lock().await.record_success();
    }

    pub async fn record_rate_limited(&self) {
        self.window_tracker.lock().await.record_rate_limited();
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let available_tokens = self.token_bucket.get_available_tokens().await;
        let available_permits = self.semaphore.available_permits();
        let window_stats = self.window_tracker.lock().await.get_current_window_stats();
        let server_budget = *self.server_budget.lock().await;

        let is_near_limit = available_tokens < (self.config.burst_allowance as f64 * 0.2)
            || server_budget.map_or(false, |budget| budget.remaining == 0);
        let estimated_wait_time = server_budget
            .and_then(|budget| budget.wait_time())
            .or_else(|| {
                (available_tokens < 1.0).then(|| {
                    Duration::from_secs_f64(
                        self.config.time_window.as_secs_f64() / self.config.max_requests as f64,
                    )
                })
            });

        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            available_permits,
            max_permits: self.config.max_concurrent.max(1) as usize,
            requests_per_window: self.config.max_requests,
            current_window_requests: window_stats.request_count,
            window_start_time: window_stats.window_start,
            server_budget,
            is_near_limit,
            estimated_wait_time,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: usize,
    pub max_permits: usize,
    pub requests_per_window: u32,
    pub current_window_requests: u32,
    pub window_start_time: SystemTime,
    pub server_budget: Option<ServerBudget>,
    pub is_near_limit: bool,
    pub estimated_wait_time: Option<Duration>,
}

impl RateLimitStatus {
    pub fn requests_remaining_in_window(&self) -> u32 {
        match self.server_budget {
            Some(budget) => budget.remaining,
            None => self
                .requests_per_window
                .saturating_sub(self.current_window_requests),
        }
    }

    pub fn window_utilization_percentage(&self) -> f64 {
        (self.current_window_requests as f64 / self.requests_per_window as f64) * 100.0
    }
}

#[derive(Debug)]
pub struct WindowTracker {
    window_duration: Duration,
    current_window: WindowStats,
}

#[derive(Debug, Clone)]
pub struct WindowStats {
    pub window_start: SystemTime,
    pub request_count: u32,
    pub successful_requests: u32,
    pub rate_limited_requests: u32,
}

impl WindowStats {
    fn starting_at(window_start: SystemTime) -> Self {
        Self {
            window_start,
            request_count: 0,
            successful_requests: 0,
            rate_limited_requests: 0,
        }
    }
}

impl WindowTracker {
    pub fn new(window_duration: Duration) -> Self {
        Self {
            window_duration,
            current_window: WindowStats::starting_at(SystemTime::now()),
        }
    }

    pub fn record_request(&mut self) {
        self.ensure_current_window();
        self.current_window.request_count += 1;
    }

    pub fn record_success(&mut self) {
        self.ensure_current_window();
        self.current_window.successful_requests += 1;
    }

    pub fn record_rate_limited(&mut self) {
        self.ensure_current_window();
        self.current_window.rate_limited_requests += 1;
    }

    pub fn get_current_window_stats(&self) -> WindowStats {
        self.current_window.clone()
    }

    fn ensure_current_window(&mut self) {
        let now = SystemTime::now();
        let window_age = now
            .duration_since(self.current_window.window_start)
            .unwrap_or_default();

        if window_age >= self.window_duration {
            self.current_window = WindowStats::starting_at(now);
        }
    }
}
