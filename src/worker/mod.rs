//! Background workers: streaming (push) and polling (pull).
//!
//! Both run as plain long-lived threads sharing the state block. Neither
//! ever propagates an error to the UI thread; transport failures are
//! retried, decode failures dropped.

pub mod poll;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use crate::state::Shared;

/// Sleep in short slices so shutdown is observed promptly.
pub(crate) fn sleep_while_running(shared: &Arc<Shared>, total: Duration) {
    let slice = Duration::from_millis(100);
    let mut remaining = total;
    while shared.running() && !remaining.is_zero() {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining -= step;
    }
}
