#![allow(missing_docs)]

use std::collections::HashMap;

use zbus::{
    Result, proxy,
    zvariant::{ObjectPath, OwnedValue},
};

/// Root interface of an MPRIS player
#[proxy(
    interface = "org.mpris.MediaPlayer2",
    default_service = "org.mpris.MediaPlayer2",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub(crate) trait MediaPlayer2 {
    /// Human-readable name of the player
    #[zbus(property)]
    fn identity(&self) -> Result<String>;

    /// Desktop entry name for the player
    #[zbus(property)]
    fn desktop_entry(&self) -> Result<String>;
}

/// Playback interface of an MPRIS player
#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_service = "org.mpris.MediaPlayer2",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub(crate) trait MediaPlayer2Player {
    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn play_pause(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn next(&self) -> Result<()>;

    fn previous(&self) -> Result<()>;

    /// Set absolute playback position in microseconds
    fn set_position(&self, track_id: &ObjectPath<'_>, position: i64) -> Result<()>;

    /// Emitted when the position jumps instead of advancing with playback
    #[zbus(signal)]
    fn seeked(&self, position: i64) -> Result<()>;

    /// Playing, Paused or Stopped
    #[zbus(property)]
    fn playback_status(&self) -> Result<String>;

    /// None, Track or Playlist
    #[zbus(property)]
    fn loop_status(&self) -> Result<String>;

    #[zbus(property)]
    fn set_loop_status(&self, status: &str) -> Result<()>;

    #[zbus(property)]
    fn shuffle(&self) -> Result<bool>;

    #[zbus(property)]
    fn set_shuffle(&self, shuffle: bool) -> Result<()>;

    #[zbus(property)]
    fn metadata(&self) -> Result<HashMap<String, OwnedValue>>;

    /// Current playback position in microseconds, never signalled
    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> Result<i64>;

    #[zbus(property)]
    fn can_go_next(&self) -> Result<bool>;

    #[zbus(property)]
    fn can_go_previous(&self) -> Result<bool>;

    #[zbus(property)]
    fn can_play(&self) -> Result<bool>;

    #[zbus(property)]
    fn can_pause(&self) -> Result<bool>;

    #[zbus(property)]
    fn can_seek(&self) -> Result<bool>;

    #[zbus(property)]
    fn can_control(&self) -> Result<bool>;
}
