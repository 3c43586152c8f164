use std::time::{Duration, Instant};

/// Logs the time since `prev` for one pipeline step and returns the new running total.
pub(crate) fn trace(profile: bool, l_type: &str, l_step: &str, start: Instant, prev: Duration) -> Duration {
    let now = start.elapsed();
    if profile {
        log::info!("{} | Total={:.2?} | {}={:.2?}", l_type, now, l_step, now - prev);
    } else {
        log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, now, l_step, now - prev);
    }
    now
}
