use std::time::Duration;

/// Seconds to park a publish job after its n-th failed attempt. Attempts past
/// the end of the table reuse the last entry.
const PUBLISH_RETRY_SCHEDULE_SECS: [u64; 6] = [0, 60, 5 * 60, 30 * 60, 2 * 3600, 6 * 3600];

/// Delay before the next attempt of a publish job that has failed `attempt` times.
pub fn retry_delay(attempt: u32) -> Duration {
    let last = PUBLISH_RETRY_SCHEDULE_SECS.len() - 1;
    let index = usize::try_from(attempt).map_or(last, |i| i.min(last));
    Duration::from_secs(PUBLISH_RETRY_SCHEDULE_SECS[index])
}
