use super::{Capabilities, ControlFlags, TimelineAnchor};

/// Derive playback capabilities from a session's control flags.
///
/// Seeking additionally needs a timeline with a known end. Missing flags or
/// a missing timeline yield the corresponding capabilities as `false`.
pub fn resolve(controls: Option<ControlFlags>, timeline: Option<&TimelineAnchor>) -> Capabilities {
    let Some(controls) = controls else {
        return Capabilities::default();
    };

    let can_play_pause = controls.intersects(ControlFlags::PLAY | ControlFlags::PAUSE);
    let can_go_next = controls.contains(ControlFlags::NEXT);
    let can_go_previous = controls.contains(ControlFlags::PREVIOUS);
    let can_seek = controls.contains(ControlFlags::SEEK)
        && timeline.is_some_and(TimelineAnchor::has_duration);

    Capabilities {
        can_control: can_play_pause || can_go_next || can_go_previous || can_seek,
        can_play_pause,
        can_go_next,
        can_go_previous,
        can_seek,
    }
}
