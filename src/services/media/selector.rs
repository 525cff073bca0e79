use super::{AppId, PlaybackStatus};

/// Choose the active session.
///
/// `candidates` must be in key order. The first candidate that is playing
/// wins, then `preferred` if it is still a candidate, then the first
/// candidate. Returns `None` only for an empty candidate list.
pub fn select<'a, I>(candidates: I, preferred: Option<&AppId>) -> Option<AppId>
where
    I: IntoIterator<Item = (&'a AppId, Option<PlaybackStatus>)>,
{
    let mut first = None;
    let mut preferred_present = false;

    for (app_id, status) in candidates {
        if status == Some(PlaybackStatus::Playing) {
            return Some(app_id.clone());
        }

        if first.is_none() {
            first = Some(app_id);
        }

        if preferred == Some(app_id) {
            preferred_present = true;
        }
    }

    if preferred_present {
        return preferred.cloned();
    }

    first.cloned()
}
