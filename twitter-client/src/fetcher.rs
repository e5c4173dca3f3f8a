//! Drives a timeline source page by page until it runs dry.
//!
//! Each request after the first asks for posts with `id <= oldest_seen - 1`,
//! so the boundary post of one page can never come back in the next. Pages
//! are requested strictly one after another; the cursor of page N+1 depends
//! on the contents of page N.

use async_trait::async_trait;
use repcount_core::{CoreError, PostBatch, RawPost, TwitterApiError, MAX_PAGE_SIZE};
use tracing::{debug, info, warn};

/// Anything that can serve a user's posts newest first, one page at a time.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Up to `count` posts of `screen_name`, newest first, restricted to
    /// ids `<= max_id` when given.
    async fn user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<u64>,
    ) -> Result<Vec<RawPost>, CoreError>;
}

#[async_trait]
impl<S: TimelineSource + ?Sized> TimelineSource for std::sync::Arc<S> {
    async fn user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<u64>,
    ) -> Result<Vec<RawPost>, CoreError> {
        (**self).user_timeline(screen_name, count, max_id).await
    }
}

pub struct TimelineFetcher<S> {
    source: S,
    page_size: u32,
}

impl<S: TimelineSource> TimelineFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches every post the source will serve for `screen_name`.
    ///
    /// Stops at the first empty page. Source errors propagate unchanged;
    /// this loop never retries.
    pub async fn fetch_all(&self, screen_name: &str) -> Result<PostBatch, CoreError> {
        let mut all_posts: Vec<RawPost> = Vec::new();
        let mut cursor: Option<u64> = None;
        let mut page_number = 0usize;

        loop {
            page_number += 1;
            match cursor {
                Some(max_id) => info!("getting posts before {}", max_id),
                None => debug!("getting most recent posts for @{}", screen_name),
            }

            let page = self
                .source
                .user_timeline(screen_name, self.page_size, cursor)
                .await?;
            if page.is_empty() {
                debug!("page {} empty, pagination finished", page_number);
                break;
            }

            let mut oldest_on_page: Option<u64> = None;
            let mut dropped = 0usize;
            for post in page {
                let id = post_id(&post)?;
                if cursor.map_or(false, |max_id| id > max_id) {
                    dropped += 1;
                    continue;
                }
                oldest_on_page = Some(oldest_on_page.map_or(id, |oldest| oldest.min(id)));
                all_posts.push(post);
            }
            if dropped > 0 {
                warn!(
                    "page {} returned {} posts above the requested max_id, dropped",
                    page_number, dropped
                );
            }

            let Some(oldest) = oldest_on_page else {
                warn!(
                    "page {} made no progress past max_id {:?}, stopping",
                    page_number, cursor
                );
                break;
            };

            info!("...{} posts downloaded so far", all_posts.len());

            match oldest.checked_sub(1) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            "Fetched {} posts for @{} in {} requests",
            all_posts.len(),
            screen_name,
            page_number
        );
        Ok(PostBatch::new(all_posts))
    }
}

fn post_id(post: &RawPost) -> Result<u64, CoreError> {
    post.numeric_id().ok_or_else(|| {
        CoreError::TwitterApi(TwitterApiError::InvalidResponse {
            details: format!("Post id '{}' is not a 64-bit integer", post.id),
        })
    })
}
