use std::{
    sync::{Arc, PoisonError, RwLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, stream};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use zbus::{
    Connection,
    zvariant::{ObjectPath, OwnedObjectPath},
};

use super::{
    proxy::MediaPlayer2PlayerProxy,
    track::{FileThumbnail, TrackInfo},
};
use crate::services::media::{
    AppId, ControlFlags, MediaError, PlaybackInfo, PlaybackStatus, RepeatMode, SessionCommand,
    SignalKind, TimelineAnchor,
    backend::{HandlerSet, MediaSession, SignalHandler, SubscriptionToken, Thumbnail, TrackProperties},
};

const NO_TRACK: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";

fn parse_status(status: &str) -> PlaybackStatus {
    match status {
        "Playing" => PlaybackStatus::Playing,
        "Paused" => PlaybackStatus::Paused,
        _ => PlaybackStatus::Stopped,
    }
}

fn parse_loop(status: &str) -> RepeatMode {
    match status {
        "Track" => RepeatMode::Track,
        "Playlist" => RepeatMode::List,
        _ => RepeatMode::None,
    }
}

fn loop_status(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::None => "None",
        RepeatMode::Track => "Track",
        RepeatMode::List => "Playlist",
    }
}

fn from_micros(micros: i64) -> Duration {
    Duration::from_micros(u64::try_from(micros).unwrap_or(0))
}

fn to_micros(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    info: PlaybackInfo,
    timeline: TimelineAnchor,
    track_id: Option<OwnedObjectPath>,
}

impl Snapshot {
    fn anchor(&mut self, position: Option<i64>) {
        if let Some(position) = position {
            self.timeline.position = from_micros(position);
            self.timeline.last_updated = Utc::now();
        }
    }

    fn apply_track(&mut self, track: TrackInfo) {
        self.timeline.end = track.length.unwrap_or_default();
        self.track_id = track.track_id;
    }
}

struct Shared {
    snapshot: RwLock<Snapshot>,
    handlers: HandlerSet<(SignalKind, SignalHandler)>,
}

impl Shared {
    fn read(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Update the snapshot and fire `kinds`. Returns `false` once the session
/// is gone.
fn apply(shared: &Weak<Shared>, kinds: &[SignalKind], change: impl FnOnce(&mut Snapshot)) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };

    change(
        &mut shared
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner),
    );

    for (registered, handler) in shared.handlers.snapshot() {
        if kinds.contains(&registered) {
            handler();
        }
    }

    true
}

/// One MPRIS player.
///
/// Properties are cached in a snapshot kept current by a monitoring task, so
/// the synchronous reads of [`MediaSession`] never touch the bus.
pub(super) struct MprisSession {
    app_id: AppId,
    proxy: MediaPlayer2PlayerProxy<'static>,
    shared: Arc<Shared>,
    monitor: JoinHandle<()>,
}

impl MprisSession {
    /// Connect to the player owning `bus_name` and start monitoring it.
    ///
    /// # Errors
    /// Returns error if the player proxy cannot be created
    #[instrument(skip(connection))]
    pub(super) async fn connect(
        connection: &Connection,
        bus_name: &str,
        app_id: AppId,
    ) -> Result<Arc<Self>, MediaError> {
        let proxy = MediaPlayer2PlayerProxy::builder(connection)
            .destination(bus_name.to_string())?
            .build()
            .await?;

        let shared = Arc::new(Shared {
            snapshot: RwLock::new(Self::read_snapshot(&proxy).await),
            handlers: HandlerSet::new(),
        });

        let monitor = tokio::spawn(Self::monitor(
            app_id.clone(),
            Arc::downgrade(&shared),
            proxy.clone(),
        ));

        debug!("MPRIS session connected");
        Ok(Arc::new(Self {
            app_id,
            proxy,
            shared,
            monitor,
        }))
    }

    async fn read_snapshot(proxy: &MediaPlayer2PlayerProxy<'_>) -> Snapshot {
        let status = proxy
            .playback_status()
            .await
            .map_or(PlaybackStatus::Stopped, |status| parse_status(&status));
        let repeat = proxy.loop_status().await.ok().map(|status| parse_loop(&status));
        let shuffle = proxy.shuffle().await.ok();

        let can_control = proxy.can_control().await.unwrap_or(false);
        let mut controls = ControlFlags::empty();
        controls.set(ControlFlags::PLAY, proxy.can_play().await.unwrap_or(false));
        controls.set(ControlFlags::PAUSE, proxy.can_pause().await.unwrap_or(false));
        controls.set(ControlFlags::STOP, can_control);
        controls.set(ControlFlags::NEXT, proxy.can_go_next().await.unwrap_or(false));
        controls.set(
            ControlFlags::PREVIOUS,
            proxy.can_go_previous().await.unwrap_or(false),
        );
        controls.set(ControlFlags::SEEK, proxy.can_seek().await.unwrap_or(false));
        controls.set(ControlFlags::SHUFFLE, can_control && shuffle.is_some());
        controls.set(ControlFlags::REPEAT, can_control && repeat.is_some());

        let mut snapshot = Snapshot {
            info: PlaybackInfo {
                status,
                controls,
                shuffle,
                repeat,
            },
            ..Snapshot::default()
        };

        if let Ok(metadata) = proxy.metadata().await {
            snapshot.apply_track(TrackInfo::from(&metadata));
        }
        snapshot.anchor(Some(proxy.position().await.unwrap_or(0)));

        snapshot
    }

    #[instrument(skip(shared, proxy))]
    async fn monitor(app_id: AppId, shared: Weak<Shared>, proxy: MediaPlayer2PlayerProxy<'static>) {
        let mut status_changes = proxy.receive_playback_status_changed().await;
        let mut loop_changes = proxy.receive_loop_status_changed().await;
        let mut shuffle_changes = proxy.receive_shuffle_changed().await;
        let mut metadata_changes = proxy.receive_metadata_changed().await;
        let mut can_play_changes = proxy.receive_can_play_changed().await;
        let mut can_pause_changes = proxy.receive_can_pause_changed().await;
        let mut can_go_next_changes = proxy.receive_can_go_next_changed().await;
        let mut can_go_previous_changes = proxy.receive_can_go_previous_changed().await;
        let mut can_seek_changes = proxy.receive_can_seek_changed().await;

        let mut seeks = match proxy.receive_seeked().await {
            Ok(signals) => signals
                .filter_map(|signal| async move { signal.args().ok().map(|args| *args.position()) })
                .boxed(),
            Err(e) => {
                debug!(error = %e, "Seeked signal unavailable");
                stream::pending().boxed()
            }
        };

        loop {
            let alive = tokio::select! {
                Some(change) = status_changes.next() => {
                    let Ok(status) = change.get().await else { continue };
                    let position = proxy.position().await.ok();
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.status = parse_status(&status);
                        snapshot.anchor(position);
                    })
                }

                Some(change) = loop_changes.next() => {
                    let Ok(status) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.repeat = Some(parse_loop(&status));
                    })
                }

                Some(change) = shuffle_changes.next() => {
                    let Ok(shuffle) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.shuffle = Some(shuffle);
                    })
                }

                Some(change) = metadata_changes.next() => {
                    let Ok(metadata) = change.get().await else { continue };
                    let position = proxy.position().await.ok();
                    apply(
                        &shared,
                        &[SignalKind::MediaProperties, SignalKind::TimelineProperties],
                        |snapshot| {
                            snapshot.apply_track(TrackInfo::from(&metadata));
                            snapshot.anchor(position);
                        },
                    )
                }

                Some(change) = can_play_changes.next() => {
                    let Ok(enabled) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.controls.set(ControlFlags::PLAY, enabled);
                    })
                }

                Some(change) = can_pause_changes.next() => {
                    let Ok(enabled) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.controls.set(ControlFlags::PAUSE, enabled);
                    })
                }

                Some(change) = can_go_next_changes.next() => {
                    let Ok(enabled) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.controls.set(ControlFlags::NEXT, enabled);
                    })
                }

                Some(change) = can_go_previous_changes.next() => {
                    let Ok(enabled) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.controls.set(ControlFlags::PREVIOUS, enabled);
                    })
                }

                Some(change) = can_seek_changes.next() => {
                    let Ok(enabled) = change.get().await else { continue };
                    apply(&shared, &[SignalKind::PlaybackInfo], |snapshot| {
                        snapshot.info.controls.set(ControlFlags::SEEK, enabled);
                    })
                }

                Some(position) = seeks.next() => {
                    apply(&shared, &[SignalKind::TimelineProperties], |snapshot| {
                        snapshot.anchor(Some(position));
                    })
                }

                else => {
                    debug!("All property streams ended");
                    break;
                }
            };

            if !alive {
                break;
            }
        }

        debug!("Property monitoring ended for {app_id}");
    }
}

impl Drop for MprisSession {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

#[async_trait]
impl MediaSession for MprisSession {
    fn app_id(&self) -> AppId {
        self.app_id.clone()
    }

    fn playback_info(&self) -> Option<PlaybackInfo> {
        Some(self.shared.read().info)
    }

    fn timeline(&self) -> Option<TimelineAnchor> {
        Some(self.shared.read().timeline)
    }

    async fn track_properties(&self) -> Result<TrackProperties, MediaError> {
        let metadata = self.proxy.metadata().await?;
        let track = TrackInfo::from(&metadata);

        let thumbnail = track
            .art_url
            .as_deref()
            .and_then(FileThumbnail::from_url)
            .map(|thumbnail| Arc::new(thumbnail) as Arc<dyn Thumbnail>);

        Ok(TrackProperties {
            title: track.title,
            artist: track.artists.first().cloned().unwrap_or_default(),
            artists: track.artists,
            album: track.album,
            album_artist: track.album_artists.first().cloned().unwrap_or_default(),
            album_artists: track.album_artists,
            thumbnail,
        })
    }

    fn subscribe(
        &self,
        kind: SignalKind,
        handler: SignalHandler,
    ) -> Result<SubscriptionToken, MediaError> {
        Ok(self.shared.handlers.insert((kind, handler)))
    }

    #[instrument(skip(self), fields(app_id = %self.app_id))]
    async fn send(&self, command: SessionCommand) -> Result<(), MediaError> {
        match command {
            SessionCommand::Play => self.proxy.play().await?,
            SessionCommand::Pause => self.proxy.pause().await?,
            SessionCommand::TogglePlayPause => self.proxy.play_pause().await?,
            SessionCommand::Stop => self.proxy.stop().await?,
            SessionCommand::Next => self.proxy.next().await?,
            SessionCommand::Previous => self.proxy.previous().await?,
            SessionCommand::SetShuffle(shuffle) => self.proxy.set_shuffle(shuffle).await?,
            SessionCommand::SetRepeat(mode) => self.proxy.set_loop_status(loop_status(mode)).await?,
            SessionCommand::ChangePosition(position) => {
                let track_path = self.shared.read().track_id.map_or_else(
                    || ObjectPath::from_static_str_unchecked(NO_TRACK),
                    OwnedObjectPath::into_inner,
                );
                self.proxy
                    .set_position(&track_path, to_micros(position))
                    .await?;
            }
        }

        Ok(())
    }
}
