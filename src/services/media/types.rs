use std::{borrow::Borrow, fmt, time::Duration};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of the application owning a session.
///
/// On Windows this is the App User Model ID, on Linux the MPRIS bus name
/// without the `org.mpris.MediaPlayer2.` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Create an app id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the OS reported an empty identifier
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AppId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Playback status exactly as the OS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// The session is shutting down
    Closed,
    /// The media is opened but nothing is loaded yet
    Opened,
    /// The session is switching tracks or buffering
    Changing,
    /// Playback is stopped
    Stopped,
    /// Playback is running
    Playing,
    /// Playback is paused
    Paused,
}

/// Playback state exposed to consumers.
///
/// Every transitional OS status collapses to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is stopped, closed, opening or changing tracks
    Stopped,
}

impl From<PlaybackStatus> for PlaybackState {
    fn from(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Playing => Self::Playing,
            PlaybackStatus::Paused => Self::Paused,
            PlaybackStatus::Closed
            | PlaybackStatus::Opened
            | PlaybackStatus::Changing
            | PlaybackStatus::Stopped => Self::Stopped,
        }
    }
}

impl From<Option<PlaybackStatus>> for PlaybackState {
    fn from(status: Option<PlaybackStatus>) -> Self {
        status.map_or(Self::Stopped, Self::from)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        };
        f.write_str(label)
    }
}

/// Repeat mode exactly as the OS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// No repetition
    None,
    /// Repeat the current track
    Track,
    /// Repeat the whole list
    List,
}

/// Loop mode exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    /// No looping, also used when the session does not report a mode
    #[default]
    None,

    /// Loop current track
    Track,

    /// Loop entire playlist
    Playlist,
}

impl LoopMode {
    /// Next mode in the cycle `None -> Playlist -> Track -> None`.
    pub fn cycled(self) -> Self {
        match self {
            Self::None => Self::Playlist,
            Self::Playlist => Self::Track,
            Self::Track => Self::None,
        }
    }
}

impl From<RepeatMode> for LoopMode {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::None => Self::None,
            RepeatMode::Track => Self::Track,
            RepeatMode::List => Self::Playlist,
        }
    }
}

impl From<Option<RepeatMode>> for LoopMode {
    fn from(mode: Option<RepeatMode>) -> Self {
        mode.map_or(Self::None, Self::from)
    }
}

impl From<LoopMode> for RepeatMode {
    fn from(mode: LoopMode) -> Self {
        match mode {
            LoopMode::None => Self::None,
            LoopMode::Track => Self::Track,
            LoopMode::Playlist => Self::List,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        };
        f.write_str(label)
    }
}

bitflags! {
    /// Control affordances a session currently advertises as enabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlFlags: u16 {
        /// Play is enabled
        const PLAY = 1;
        /// Pause is enabled
        const PAUSE = 1 << 1;
        /// Stop is enabled
        const STOP = 1 << 2;
        /// Skip to next is enabled
        const NEXT = 1 << 3;
        /// Skip to previous is enabled
        const PREVIOUS = 1 << 4;
        /// Changing the playback position is enabled
        const SEEK = 1 << 5;
        /// Changing shuffle is enabled
        const SHUFFLE = 1 << 6;
        /// Changing the repeat mode is enabled
        const REPEAT = 1 << 7;
    }
}

/// Playback information read from a session in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackInfo {
    /// Raw OS playback status
    pub status: PlaybackStatus,
    /// Enabled control affordances
    pub controls: ControlFlags,
    /// Shuffle state, `None` when the session does not report it
    pub shuffle: Option<bool>,
    /// Repeat mode, `None` when the session does not report it
    pub repeat: Option<RepeatMode>,
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            controls: ControlFlags::empty(),
            shuffle: None,
            repeat: None,
        }
    }
}

/// Position reference a session reports for its timeline.
///
/// `position` is the last position the OS pushed, valid at `last_updated`.
/// Between pushes the live position is extrapolated, see
/// [`position::estimate`](super::position::estimate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineAnchor {
    /// Start of the seekable range
    pub start: Duration,
    /// End of the seekable range, zero when unknown
    pub end: Duration,
    /// Last reported position
    pub position: Duration,
    /// Wall-clock time of the last OS update
    pub last_updated: DateTime<Utc>,
}

impl TimelineAnchor {
    /// Track length, zero when the end precedes the start.
    pub fn length(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Whether the session reports a usable timeline.
    pub fn has_duration(&self) -> bool {
        !self.end.is_zero()
    }
}

impl Default for TimelineAnchor {
    fn default() -> Self {
        Self {
            start: Duration::ZERO,
            end: Duration::ZERO,
            position: Duration::ZERO,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Change signals each session exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Status, controls, shuffle or repeat changed
    PlaybackInfo,
    /// Title, artist, album or thumbnail changed
    MediaProperties,
    /// Position or range changed
    TimelineProperties,
}

impl SignalKind {
    /// Every signal kind a registry entry subscribes to
    pub const ALL: [SignalKind; 3] = [
        SignalKind::PlaybackInfo,
        SignalKind::MediaProperties,
        SignalKind::TimelineProperties,
    ];
}

/// Commands dispatched to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between play and pause
    TogglePlayPause,
    /// Stop playback
    Stop,
    /// Skip to the next track
    Next,
    /// Skip to the previous track
    Previous,
    /// Enable or disable shuffle
    SetShuffle(bool),
    /// Change the repeat mode
    SetRepeat(RepeatMode),
    /// Move to an absolute position on the session's own timeline
    ChangePosition(Duration),
}

/// Playback affordances derived from the session's control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Any of the other capabilities is available
    pub can_control: bool,
    /// Play or pause is enabled
    pub can_play_pause: bool,
    /// Skip to next is enabled
    pub can_go_next: bool,
    /// Skip to previous is enabled
    pub can_go_previous: bool,
    /// Seeking is enabled and the timeline has a known end
    pub can_seek: bool,
}
