//! Unit tests for media module
//!
//! Covers the pure derivations (selection, capabilities, position, ids) and
//! metadata normalization on top of in-memory sessions.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use image::ImageFormat;
use tokio::sync::mpsc;

use super::{
    backend::{
        ManagerHandler, MediaSession, SessionManager, SignalHandler, SubscriptionToken,
        Thumbnail, TrackProperties,
        memory::{MemorySession, MemoryThumbnail},
    },
    capabilities,
    metadata::{ART_MIME_TYPE, track_id},
    notifier::EventNotifier,
    position,
    registry::{RegistryEvent, SessionRegistry},
    selector,
};
use crate::{
    config::MediaConfig,
    services::media::{
        AppId, ControlFlags, LoopMode, MediaError, MetadataFetcher, PlaybackInfo, PlaybackState,
        PlaybackStatus, RepeatMode, SessionCommand, SignalKind, TimelineAnchor,
        fallback_display_name,
    },
};

fn png_bytes() -> Vec<u8> {
    let mut encoded = Cursor::new(Vec::new());
    image::RgbImage::new(2, 2)
        .write_to(&mut encoded, ImageFormat::Png)
        .unwrap();
    encoded.into_inner()
}

fn timeline(start: u64, end: u64, position: u64) -> TimelineAnchor {
    TimelineAnchor {
        start: Duration::from_secs(start),
        end: Duration::from_secs(end),
        position: Duration::from_secs(position),
        last_updated: Utc::now(),
    }
}

fn ids(names: &[&str]) -> Vec<AppId> {
    names.iter().map(|name| AppId::from(*name)).collect()
}

#[test]
fn select_prefers_first_playing_session() {
    let app_ids = ids(&["a", "b", "c"]);
    let candidates = [
        (&app_ids[0], Some(PlaybackStatus::Paused)),
        (&app_ids[1], Some(PlaybackStatus::Playing)),
        (&app_ids[2], Some(PlaybackStatus::Playing)),
    ];

    let selected = selector::select(candidates, Some(&app_ids[0]));
    assert_eq!(selected, Some(AppId::from("b")));
}

#[test]
fn select_falls_back_to_preferred_then_first() {
    let app_ids = ids(&["a", "b"]);
    let candidates = || {
        [
            (&app_ids[0], Some(PlaybackStatus::Paused)),
            (&app_ids[1], None),
        ]
    };

    assert_eq!(
        selector::select(candidates(), Some(&app_ids[1])),
        Some(AppId::from("b"))
    );
    assert_eq!(
        selector::select(candidates(), Some(&AppId::from("gone"))),
        Some(AppId::from("a"))
    );
    assert_eq!(selector::select(candidates(), None), Some(AppId::from("a")));
}

#[test]
fn select_empty_candidates() {
    let preferred = AppId::from("a");
    let candidates: Vec<(&AppId, Option<PlaybackStatus>)> = Vec::new();
    assert_eq!(selector::select(candidates, Some(&preferred)), None);
}

#[test]
fn capabilities_without_controls_are_all_false() {
    let caps = capabilities::resolve(None, Some(&timeline(0, 100, 0)));
    assert!(!caps.can_control);
    assert!(!caps.can_play_pause);
    assert!(!caps.can_seek);
}

#[test]
fn capabilities_seek_requires_known_end() {
    let controls = ControlFlags::SEEK;

    let caps = capabilities::resolve(Some(controls), Some(&timeline(0, 0, 0)));
    assert!(!caps.can_seek);
    assert!(!caps.can_control);

    let caps = capabilities::resolve(Some(controls), None);
    assert!(!caps.can_seek);

    let caps = capabilities::resolve(Some(controls), Some(&timeline(0, 180, 0)));
    assert!(caps.can_seek);
    assert!(caps.can_control);
}

#[test]
fn capabilities_play_pause_accepts_either_flag() {
    let caps = capabilities::resolve(Some(ControlFlags::PAUSE | ControlFlags::NEXT), None);
    assert!(caps.can_play_pause);
    assert!(caps.can_go_next);
    assert!(!caps.can_go_previous);
    assert!(caps.can_control);
}

#[test]
fn position_is_zero_without_duration() {
    let anchor = timeline(0, 0, 42);
    assert_eq!(
        position::estimate(Some(PlaybackStatus::Playing), &anchor, Utc::now()),
        0.0
    );
}

#[test]
fn position_is_frozen_while_paused() {
    let mut anchor = timeline(10, 200, 70);
    anchor.last_updated = Utc::now() - TimeDelta::seconds(30);

    let elapsed = position::estimate(Some(PlaybackStatus::Paused), &anchor, Utc::now());
    assert!((elapsed - 60.0).abs() < f64::EPSILON);
}

#[test]
fn position_advances_while_playing() {
    let now = Utc::now();
    let mut anchor = timeline(0, 200, 20);
    anchor.last_updated = now - TimeDelta::seconds(5);

    let elapsed = position::estimate(Some(PlaybackStatus::Playing), &anchor, now);
    assert!((elapsed - 25.0).abs() < 1e-6);
}

#[test]
fn position_never_negative() {
    let anchor = timeline(30, 200, 10);
    assert_eq!(
        position::estimate(Some(PlaybackStatus::Stopped), &anchor, Utc::now()),
        0.0
    );
}

#[test]
fn track_id_of_empty_fields_is_empty() {
    assert_eq!(track_id("", "", "", "", true), "");
    assert_eq!(track_id("", "", "", "", false), "");
}

#[test]
fn track_id_joins_fields_in_order() {
    assert_eq!(
        track_id("Artist", "Artist", "Album", "Title", false),
        "Artist:Artist:Album:Title"
    );
    assert_eq!(track_id("", "", "", "Title", false), ":::Title");
}

#[test]
fn track_id_hashes_to_lowercase_md5() {
    assert_eq!(
        track_id("Artist", "Artist", "Album", "Title", true),
        "d5568d29b84125eb4356e602bab3c3c8"
    );
}

#[test]
fn track_id_is_stable_and_title_sensitive() {
    let first = track_id("Album Artist", "Artist", "Album", "Title", true);

    assert!(!first.is_empty());
    assert_eq!(first, track_id("Album Artist", "Artist", "Album", "Title", true));
    assert_ne!(first, track_id("Album Artist", "Artist", "Album", "Other", true));
}

#[test]
fn fallback_name_strips_exe_suffix() {
    assert_eq!(fallback_display_name(&AppId::from("Spotify.exe")), "Spotify");
    assert_eq!(fallback_display_name(&AppId::from("foobar2000.EXE")), "foobar2000");
    assert_eq!(fallback_display_name(&AppId::from("org.gnome.Lollypop")), "org.gnome.Lollypop");
    assert_eq!(fallback_display_name(&AppId::from("exe")), "exe");
}

#[test]
fn loop_mode_cycles_through_every_mode() {
    assert_eq!(LoopMode::None.cycled(), LoopMode::Playlist);
    assert_eq!(LoopMode::Playlist.cycled(), LoopMode::Track);
    assert_eq!(LoopMode::Track.cycled(), LoopMode::None);
    assert_eq!(LoopMode::from(Some(RepeatMode::List)), LoopMode::Playlist);
    assert_eq!(LoopMode::from(None::<RepeatMode>), LoopMode::None);
}

#[test]
fn playback_state_collapses_transitional_statuses() {
    assert_eq!(PlaybackState::from(PlaybackStatus::Playing), PlaybackState::Playing);
    assert_eq!(PlaybackState::from(PlaybackStatus::Paused), PlaybackState::Paused);
    for status in [
        PlaybackStatus::Closed,
        PlaybackStatus::Opened,
        PlaybackStatus::Changing,
        PlaybackStatus::Stopped,
    ] {
        assert_eq!(PlaybackState::from(status), PlaybackState::Stopped);
    }
    assert_eq!(PlaybackState::from(None), PlaybackState::Stopped);
}

#[test]
fn notifier_fires_new_callback_immediately() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let notifier = EventNotifier::new();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    notifier.set(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    notifier.fire();
    assert_eq!(count.load(Ordering::SeqCst), 2);

    notifier.clear();
    notifier.fire();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(!notifier.is_set());
}

#[test]
fn notifier_generation_counts_firings() {
    let notifier = EventNotifier::new();
    let generation = notifier.subscribe();

    notifier.fire();
    notifier.fire();
    assert_eq!(*generation.borrow(), 2);
}

fn session_with_track(thumbnail: Option<MemoryThumbnail>) -> Arc<MemorySession> {
    let session = MemorySession::new("player");
    session.set_timeline(Some(timeline(0, 240, 0)));
    session.set_track(TrackProperties {
        title: "Title".to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        album_artist: "Artist".to_string(),
        thumbnail: thumbnail.map(|t| Arc::new(t) as Arc<dyn Thumbnail>),
        ..TrackProperties::default()
    });
    session
}

#[tokio::test]
async fn fetch_normalizes_track_and_art() {
    let session = session_with_track(Some(MemoryThumbnail::new(png_bytes(), "image/png")));
    let fetcher = MetadataFetcher::new(&MediaConfig::default());

    let metadata = fetcher.fetch(session.as_ref()).await.unwrap();

    assert_eq!(metadata.id, "d5568d29b84125eb4356e602bab3c3c8");
    assert_eq!(metadata.title, "Title");
    assert_eq!(metadata.artists, vec!["Artist".to_string()]);
    assert_eq!(metadata.album_artists, vec!["Artist".to_string()]);
    assert!((metadata.length - 240.0).abs() < f64::EPSILON);

    let art = metadata.art_data.unwrap();
    assert_eq!(art.mime_types, vec![ART_MIME_TYPE.to_string()]);
    assert!(image::load_from_memory(&art.data).is_ok());
}

#[tokio::test]
async fn fetch_keeps_metadata_when_art_is_undecodable() {
    let session = session_with_track(Some(MemoryThumbnail::new(
        b"not an image".to_vec(),
        "image/jpeg",
    )));
    let fetcher = MetadataFetcher::new(&MediaConfig::default());

    let metadata = fetcher.fetch(session.as_ref()).await.unwrap();
    assert_eq!(metadata.title, "Title");
    assert!(metadata.art_data.is_none());
}

#[tokio::test]
async fn fetch_drops_art_after_timeout() {
    let session = session_with_track(Some(
        MemoryThumbnail::new(png_bytes(), "image/png").with_delay(Duration::from_secs(5)),
    ));
    let config = MediaConfig {
        thumbnail_timeout_ms: 20,
        ..MediaConfig::default()
    };
    let fetcher = MetadataFetcher::new(&config);

    let metadata = tokio::time::timeout(Duration::from_secs(2), fetcher.fetch(session.as_ref()))
        .await
        .unwrap()
        .unwrap();
    assert!(metadata.art_data.is_none());
}

#[tokio::test]
async fn fetch_drops_art_when_thumbnail_fails() {
    let session = session_with_track(Some(MemoryThumbnail::failing()));
    let fetcher = MetadataFetcher::new(&MediaConfig::default());

    let metadata = fetcher.fetch(session.as_ref()).await.unwrap();
    assert!(metadata.art_data.is_none());
}

#[tokio::test]
async fn fetch_fails_without_track_properties() {
    let session = session_with_track(None);
    session.fail_track_properties(true);
    let fetcher = MetadataFetcher::new(&MediaConfig::default());

    assert!(fetcher.fetch(session.as_ref()).await.is_none());
}

#[tokio::test]
async fn fetch_uses_raw_ids_when_hashing_disabled() {
    let session = session_with_track(None);
    let config = MediaConfig {
        hash_track_ids: false,
        ..MediaConfig::default()
    };

    let metadata = MetadataFetcher::new(&config)
        .fetch(session.as_ref())
        .await
        .unwrap();
    assert_eq!(metadata.id, "Artist:Artist:Album:Title");
}

#[tokio::test]
async fn fetch_ids_follow_the_track_not_the_call() {
    let session = session_with_track(None);
    let fetcher = MetadataFetcher::new(&MediaConfig::default());

    let first = fetcher.fetch(session.as_ref()).await.unwrap().id;
    let again = fetcher.fetch(session.as_ref()).await.unwrap().id;
    assert_eq!(first, again);

    session.set_track(TrackProperties {
        title: "Next Title".to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        album_artist: "Artist".to_string(),
        ..TrackProperties::default()
    });
    let next = fetcher.fetch(session.as_ref()).await.unwrap().id;
    assert_ne!(first, next);
}

#[tokio::test]
async fn memory_session_applies_commands() {
    let session = MemorySession::new("player");
    session.set_playback_info(Some(PlaybackInfo {
        status: PlaybackStatus::Paused,
        ..PlaybackInfo::default()
    }));

    session
        .send(super::SessionCommand::TogglePlayPause)
        .await
        .unwrap();
    assert_eq!(
        session.playback_info().map(|info| info.status),
        Some(PlaybackStatus::Playing)
    );

    session
        .send(super::SessionCommand::SetRepeat(RepeatMode::Track))
        .await
        .unwrap();
    assert_eq!(
        session.playback_info().and_then(|info| info.repeat),
        Some(RepeatMode::Track)
    );
    assert_eq!(session.commands().len(), 2);
}

/// Session that keeps every handler it is given and never unregisters them,
/// so callbacks can still be invoked after the registry released them.
struct CapturingSession {
    app_id: AppId,
    handlers: Mutex<Vec<SignalHandler>>,
}

impl CapturingSession {
    fn new(app_id: &str) -> Arc<Self> {
        Arc::new(Self {
            app_id: AppId::from(app_id),
            handlers: Mutex::new(Vec::new()),
        })
    }

    fn take_handlers(&self) -> Vec<SignalHandler> {
        std::mem::take(&mut *self.handlers.lock().unwrap())
    }
}

#[async_trait]
impl MediaSession for CapturingSession {
    fn app_id(&self) -> AppId {
        self.app_id.clone()
    }

    fn playback_info(&self) -> Option<PlaybackInfo> {
        None
    }

    fn timeline(&self) -> Option<TimelineAnchor> {
        None
    }

    async fn track_properties(&self) -> Result<TrackProperties, MediaError> {
        Ok(TrackProperties::default())
    }

    fn subscribe(
        &self,
        _kind: SignalKind,
        handler: SignalHandler,
    ) -> Result<SubscriptionToken, MediaError> {
        self.handlers.lock().unwrap().push(handler);
        Ok(SubscriptionToken::new(|| {}))
    }

    async fn send(&self, _command: SessionCommand) -> Result<(), MediaError> {
        Ok(())
    }
}

struct SingleSessionManager(Arc<CapturingSession>);

#[async_trait]
impl SessionManager for SingleSessionManager {
    async fn sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, MediaError> {
        Ok(vec![Arc::clone(&self.0) as Arc<dyn MediaSession>])
    }

    fn subscribe(&self, _handler: ManagerHandler) -> Result<SubscriptionToken, MediaError> {
        Ok(SubscriptionToken::new(|| {}))
    }

    async fn current_session(&self) -> Result<Option<AppId>, MediaError> {
        Ok(None)
    }

    async fn display_name(&self, _app_id: &AppId) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn registry_ignores_signals_from_replaced_subscriptions() {
    let session = CapturingSession::new("player");
    let manager = Arc::new(SingleSessionManager(Arc::clone(&session)));
    let notifier = Arc::new(EventNotifier::new());
    let fired = notifier.subscribe();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let registry =
        SessionRegistry::new(manager, MediaConfig::default(), Arc::clone(&notifier), events_tx);

    registry.rebuild().await;
    let old_handlers = session.take_handlers();
    assert_eq!(old_handlers.len(), SignalKind::ALL.len());

    // Queued before the rebuild, handled after it.
    (old_handlers[0])();
    let queued = events_rx.try_recv().unwrap();

    registry.rebuild().await;

    for handler in &old_handlers {
        handler();
    }
    assert!(events_rx.try_recv().is_err());

    let RegistryEvent::Signal {
        app_id,
        generation: old_generation,
        kind,
    } = queued
    else {
        panic!("expected a session signal, got {queued:?}");
    };
    let before = *fired.borrow();
    registry.handle_signal(&app_id, old_generation, kind).await;
    assert_eq!(*fired.borrow(), before);

    let new_handlers = session.take_handlers();
    (new_handlers[0])();
    let event = events_rx.try_recv().unwrap();
    let RegistryEvent::Signal {
        app_id,
        generation,
        kind,
    } = event
    else {
        panic!("expected a session signal, got {event:?}");
    };
    assert_ne!(generation, old_generation);

    registry.handle_signal(&app_id, generation, kind).await;
    assert_eq!(*fired.borrow(), before + 1);
}
