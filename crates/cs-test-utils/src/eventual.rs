//! Polling helper for work that finishes after the HTTP response.
//!
//! Webhooks are acknowledged before the coordinator runs, so tests observe
//! the outcome by polling.

use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

/// Default time allowed for background processing to settle.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_POLL_DELAY: Duration = Duration::from_millis(5);
const MAX_POLL_DELAY: Duration = Duration::from_millis(250);

/// Poll `condition` until it holds or `timeout` passes.
///
/// The delay between polls starts at 5ms and doubles up to 250ms.
///
/// # Errors
///
/// Returns how many polls were made if the condition never held.
pub async fn assert_eventually<F, Fut>(timeout: Duration, mut condition: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polls = Cell::new(0u32);
    let poll = async {
        let mut delay = FIRST_POLL_DELAY;
        loop {
            polls.set(polls.get() + 1);
            if condition().await {
                return;
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_POLL_DELAY);
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(()) => Ok(()),
        Err(_) => Err(format!(
            "Condition not met within {timeout:?} after {} polls",
            polls.get()
        )),
    }
}
