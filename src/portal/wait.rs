//! Bounded polling against a portal that emits no readiness events.
//!
//! Every wait in the workflow goes through [`poll_until`] so the budgets stay
//! in one place. Exhausting a budget is an ordinary `false`, not an error;
//! callers decide whether a missed condition is fatal.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed settle delay after navigations; the portal has no reliable loaded
/// signal beyond a short grace period.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// How long the address book gets to populate its checkbox list.
pub const ADDRESS_BOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Wait for a subcategory marker to appear after expanding a tree node.
pub const TREE_EXPAND_TIMEOUT: Duration = Duration::from_secs(10);

/// First confirmation dialog, single-recipient flow.
pub const DIALOG_TIMEOUT: Duration = Duration::from_secs(15);

/// First confirmation dialog, per recipient in batch mode.
pub const BATCH_DIALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// A possible second dialog (cost confirmation then send confirmation).
pub const SECOND_DIALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for the first confirmation dialog: batch sends raise theirs
/// faster, so multi-recipient runs get the shorter wait per recipient.
pub fn first_dialog_budget(recipient_count: usize) -> Duration {
    if recipient_count > 1 {
        BATCH_DIALOG_TIMEOUT
    } else {
        DIALOG_TIMEOUT
    }
}

/// Pause between scroll-and-rescan passes over a virtualized list.
pub const SCROLL_PAUSE: Duration = Duration::from_millis(500);

/// Scroll-and-rescan passes before a leaf lookup is abandoned.
pub const SCROLL_RETRIES: usize = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls `probe` every 500ms until it reports `true` or `timeout` elapses.
///
/// Returns whether the condition was met. Probe errors propagate immediately;
/// a timeout does not.
pub async fn poll_until<F, Fut, E>(timeout: Duration, mut probe: F) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
