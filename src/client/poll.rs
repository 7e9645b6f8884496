//! Bounded existence polling

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::utils::Result;

/// Run `check` until it reports true or the tries are used up
///
/// At most `max(max_tries, 1)` checks are made with `interval` between
/// consecutive checks, so a miss costs `checks - 1` sleeps. Errors from
/// `check` end polling immediately.
pub fn poll_until<F>(interval: Duration, max_tries: i32, mut check: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    let checks = max_tries.max(1);
    for attempt in 1..=checks {
        if check()? {
            return Ok(true);
        }
        if attempt < checks {
            trace!("Poll attempt {}/{} missed, sleeping {:?}", attempt, checks, interval);
            thread::sleep(interval);
        }
    }
    Ok(false)
}
