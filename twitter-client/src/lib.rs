pub mod api;
pub mod auth;
pub mod cache;
pub mod fetcher;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;


pub use api::{ClientConfig, TwitterApiClient};
pub use cache::{CacheKey, TimeWindow, TimelineCache};
pub use fetcher::{TimelineFetcher, TimelineSource};
