//! Deadline-bounded polling.
//!
//! Every "wait for state" operation in droidpilot (element presence, app
//! launch, scroll-until-found) goes through the same primitive: compute an
//! absolute deadline once, check, sleep a fixed interval, repeat. A final
//! check happens only as part of the next loop iteration, so the effective
//! worst case is `timeout + poll_interval`. That slack is an accepted
//! trade-off, not a bug.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Interval between condition checks used across the crate.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Repeatedly evaluate `check` until it returns true or `timeout` elapses.
///
/// Returns true immediately on the first truthy check. The calling task is
/// suspended between attempts; nothing else is blocked.
pub async fn await_condition<F, Fut>(mut check: F, timeout: Duration, poll_interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}
