use chrono::{DateTime, Utc};

use super::{PlaybackStatus, TimelineAnchor};

/// Estimate the elapsed position in seconds at `now`.
///
/// The OS only pushes position updates occasionally, so while playing the
/// time since the last update is added to the reported position. A timeline
/// without an end always yields zero.
pub fn estimate(
    status: Option<PlaybackStatus>,
    timeline: &TimelineAnchor,
    now: DateTime<Utc>,
) -> f64 {
    if !timeline.has_duration() {
        return 0.0;
    }

    let mut position = timeline.position.as_secs_f64();
    if status == Some(PlaybackStatus::Playing) {
        let since_update = now.signed_duration_since(timeline.last_updated);
        position += since_update.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0;
    }

    (position - timeline.start.as_secs_f64()).max(0.0)
}
