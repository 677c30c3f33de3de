#![forbid(unsafe_code)]

use std::thread;
use std::time::{Duration, Instant};

/// Deadline used by tests that wait on a background updater.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(2);

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Returns the final value of `condition`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return condition();
        }
        thread::sleep(POLL);
    }
}
