//! Cursor pagination primitives shared by all resource fetchers.
//!
//! Providers walk pages with [`fetch_page`], which owns the two cross-cutting
//! concerns of every page request: cooperative cancellation (checked before
//! the request goes out) and bounded retry of throttle-classified errors.
//! Any other error propagates immediately and aborts the surrounding run.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// One page of a finite cursor sequence.
///
/// `next_cursor` is `None` on the terminal page; an empty item list with a
/// cursor is a valid intermediate page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with a continuation cursor.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// The terminal page of a sequence.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Bounds for retrying throttled page requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Exponential backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis =
            self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Fetch one page, honoring cancellation and the retry policy.
///
/// The closure is invoked again only after a throttle-classified error, up
/// to `retry.max_attempts` total attempts with exponential backoff between
/// them. Cancellation observed before the request surfaces as
/// [`SyncError::Cancelled`].
pub async fn fetch_page<T, F, Fut>(
    cancel: &CancellationToken,
    retry: &RetryPolicy,
    mut fetch: F,
) -> SyncResult<Page<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<Page<T>>>,
{
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let mut attempt = 0;
    loop {
        match fetch().await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_throttle() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for(attempt);
                debug!(
                    attempt = attempt + 1,
                    max_attempts = retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying throttled page fetch"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
