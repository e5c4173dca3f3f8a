use crate::metrics::MetricsCollector;
use repcount_core::{CoreError, ErrorExt, TwitterApiError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How the client reacts to an exhausted rate-limit window.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Sleep until the window resets instead of failing
    pub wait_on_rate_limit: bool,
    /// Cap on consecutive waits for one request; `None` waits as long as
    /// the service keeps answering 429
    pub max_waits: Option<u32>,
    /// Extra time added after the advertised reset
    pub margin: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            wait_on_rate_limit: true,
            max_waits: None,
            margin: Duration::from_secs(1),
        }
    }
}

impl WaitPolicy {
    pub fn fail_fast() -> Self {
        Self {
            wait_on_rate_limit: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// Sleep this long, then re-issue the same request
    WaitFor(Duration),
    /// Surface the error to the caller
    Propagate,
}

/// Only rate-limit responses are waited on. Everything else, including
/// transient server errors, propagates to the caller unchanged.
pub fn get_wait_strategy(error: &CoreError, policy: &WaitPolicy) -> WaitStrategy {
    match error {
        CoreError::TwitterApi(TwitterApiError::RateLimitExceeded { .. })
            if policy.wait_on_rate_limit =>
        {
            let advertised = error.retry_after().unwrap_or_default();
            WaitStrategy::WaitFor(advertised + policy.margin)
        }
        _ => WaitStrategy::Propagate,
    }
}

/// Runs `operation`, sleeping through rate-limit windows per `policy`.
pub async fn execute_with_wait<F, Fut, T>(
    policy: &WaitPolicy,
    metrics: &MetricsCollector,
    operation_name: &str,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut waits = 0u32;

    loop {
        let error = match operation().await {
            Ok(result) => {
                if waits > 0 {
                    info!(
                        "{} succeeded after {} rate-limit wait(s)",
                        operation_name, waits
                    );
                }
                return Ok(result);
            }
            Err(error) => error,
        };

        match get_wait_strategy(&error, policy) {
            WaitStrategy::WaitFor(delay) if policy.max_waits.map_or(true, |max| waits < max) => {
                waits += 1;
                error.log_warn();
                warn!(
                    "Rate limit reached for {}, sleeping {:?} (wait {})",
                    operation_name, delay, waits
                );
                sleep(delay).await;
                metrics.record_wait(delay).await;
            }
            WaitStrategy::WaitFor(_) => {
                warn!(
                    "Giving up on {} after {} rate-limit waits",
                    operation_name, waits
                );
                return Err(error);
            }
            WaitStrategy::Propagate => {
                debug!("{} failed without waiting: {}", operation_name, error);
                return Err(error);
            }
        }
    }
}
