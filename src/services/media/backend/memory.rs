//! In-process session manager.
//!
//! Sessions are created and mutated from code rather than discovered from
//! the OS. Every mutation fires the same signals a native backend would,
//! so the media service behaves identically on top of it.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{
    HandlerSet, ManagerEvent, ManagerHandler, MediaSession, RawThumbnail, SessionManager,
    SignalHandler, SubscriptionToken, Thumbnail, TrackProperties, lock,
};
use crate::services::media::{
    AppId, MediaError, PlaybackInfo, PlaybackStatus, SessionCommand, SignalKind, TimelineAnchor,
};

/// Session manager whose sessions are driven from code.
pub struct MemoryManager {
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    subscribers: HandlerSet<ManagerHandler>,
    current: Mutex<Option<AppId>>,
    display_names: Mutex<HashMap<AppId, String>>,
    fail_enumeration: AtomicBool,
}

impl MemoryManager {
    /// Create a manager without sessions
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
            subscribers: HandlerSet::new(),
            current: Mutex::new(None),
            display_names: Mutex::new(HashMap::new()),
            fail_enumeration: AtomicBool::new(false),
        })
    }

    /// Add a session and announce the topology change
    pub fn add_session(&self, session: Arc<MemorySession>) {
        debug!(app_id = %session.app_id, "Adding memory session");
        lock(&self.sessions).push(session);
        self.emit(ManagerEvent::SessionsChanged);
    }

    /// Remove a session and announce that it closed
    pub fn remove_session(&self, app_id: &AppId) {
        debug!(%app_id, "Removing memory session");
        lock(&self.sessions).retain(|session| &session.app_id != app_id);
        self.emit(ManagerEvent::SessionClosed(app_id.clone()));
    }

    /// Change the OS-designated current session
    pub fn set_current(&self, app_id: Option<AppId>) {
        *lock(&self.current) = app_id;
        self.emit(ManagerEvent::CurrentSessionChanged);
    }

    /// Register a friendly name for an app id
    pub fn set_display_name(&self, app_id: impl Into<AppId>, name: impl Into<String>) {
        lock(&self.display_names).insert(app_id.into(), name.into());
    }

    /// Make the next enumerations fail as a whole
    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// Deliver a manager event to every subscriber
    pub fn emit(&self, event: ManagerEvent) {
        for handler in self.subscribers.snapshot() {
            handler(event.clone());
        }
    }

    /// Number of live manager subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[async_trait]
impl SessionManager for MemoryManager {
    async fn sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, MediaError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(MediaError::operation("GetSessions", "enumeration disabled"));
        }

        Ok(lock(&self.sessions)
            .iter()
            .map(|session| Arc::clone(session) as Arc<dyn MediaSession>)
            .collect())
    }

    fn subscribe(&self, handler: ManagerHandler) -> Result<SubscriptionToken, MediaError> {
        Ok(self.subscribers.insert(handler))
    }

    async fn current_session(&self) -> Result<Option<AppId>, MediaError> {
        Ok(lock(&self.current).clone())
    }

    async fn display_name(&self, app_id: &AppId) -> Option<String> {
        lock(&self.display_names).get(app_id).cloned()
    }
}

#[derive(Default)]
struct SessionState {
    playback: Option<PlaybackInfo>,
    timeline: Option<TimelineAnchor>,
    track: TrackProperties,
}

/// A scriptable media session.
pub struct MemorySession {
    app_id: AppId,
    state: Mutex<SessionState>,
    subscribers: HandlerSet<(SignalKind, SignalHandler)>,
    commands: Mutex<Vec<SessionCommand>>,
    fail_track_properties: AtomicBool,
    fail_subscriptions: AtomicBool,
}

impl MemorySession {
    /// Create a stopped session with empty track properties
    pub fn new(app_id: impl Into<AppId>) -> Arc<Self> {
        Arc::new(Self {
            app_id: app_id.into(),
            state: Mutex::new(SessionState {
                playback: Some(PlaybackInfo::default()),
                timeline: Some(TimelineAnchor::default()),
                track: TrackProperties::default(),
            }),
            subscribers: HandlerSet::new(),
            commands: Mutex::new(Vec::new()),
            fail_track_properties: AtomicBool::new(false),
            fail_subscriptions: AtomicBool::new(false),
        })
    }

    /// Replace the playback information, `None` simulates a failing OS call
    pub fn set_playback_info(&self, info: Option<PlaybackInfo>) {
        lock(&self.state).playback = info;
        self.emit(SignalKind::PlaybackInfo);
    }

    /// Change only the playback status
    pub fn set_status(&self, status: PlaybackStatus) {
        lock(&self.state)
            .playback
            .get_or_insert_with(PlaybackInfo::default)
            .status = status;
        self.emit(SignalKind::PlaybackInfo);
    }

    /// Replace the timeline, `None` simulates a failing OS call
    pub fn set_timeline(&self, timeline: Option<TimelineAnchor>) {
        lock(&self.state).timeline = timeline;
        self.emit(SignalKind::TimelineProperties);
    }

    /// Replace the track properties
    pub fn set_track(&self, track: TrackProperties) {
        lock(&self.state).track = track;
        self.emit(SignalKind::MediaProperties);
    }

    /// Make track property requests fail
    pub fn fail_track_properties(&self, fail: bool) {
        self.fail_track_properties.store(fail, Ordering::SeqCst);
    }

    /// Make signal registration fail
    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<SessionCommand> {
        lock(&self.commands).clone()
    }

    /// Number of live handlers for one signal kind
    pub fn subscriber_count(&self, kind: SignalKind) -> usize {
        self.subscribers
            .snapshot()
            .iter()
            .filter(|(registered, _)| *registered == kind)
            .count()
    }

    /// Fire one signal kind without changing state
    pub fn emit(&self, kind: SignalKind) {
        for (registered, handler) in self.subscribers.snapshot() {
            if registered == kind {
                handler();
            }
        }
    }

    fn apply(&self, command: SessionCommand) -> SignalKind {
        let mut state = lock(&self.state);

        if let SessionCommand::ChangePosition(position) = command {
            let timeline = state.timeline.get_or_insert_with(TimelineAnchor::default);
            timeline.position = position;
            timeline.last_updated = Utc::now();
            return SignalKind::TimelineProperties;
        }

        let playback = state.playback.get_or_insert_with(PlaybackInfo::default);
        match command {
            SessionCommand::Play => playback.status = PlaybackStatus::Playing,
            SessionCommand::Pause => playback.status = PlaybackStatus::Paused,
            SessionCommand::Stop => playback.status = PlaybackStatus::Stopped,
            SessionCommand::TogglePlayPause => {
                playback.status = if playback.status == PlaybackStatus::Playing {
                    PlaybackStatus::Paused
                } else {
                    PlaybackStatus::Playing
                };
            }
            SessionCommand::SetShuffle(shuffle) => playback.shuffle = Some(shuffle),
            SessionCommand::SetRepeat(repeat) => playback.repeat = Some(repeat),
            SessionCommand::Next | SessionCommand::Previous => {
                return SignalKind::MediaProperties;
            }
            SessionCommand::ChangePosition(_) => {}
        }

        SignalKind::PlaybackInfo
    }
}

#[async_trait]
impl MediaSession for MemorySession {
    fn app_id(&self) -> AppId {
        self.app_id.clone()
    }

    fn playback_info(&self) -> Option<PlaybackInfo> {
        lock(&self.state).playback
    }

    fn timeline(&self) -> Option<TimelineAnchor> {
        lock(&self.state).timeline
    }

    async fn track_properties(&self) -> Result<TrackProperties, MediaError> {
        if self.fail_track_properties.load(Ordering::SeqCst) {
            return Err(MediaError::operation(
                "TryGetMediaPropertiesAsync",
                "track properties disabled",
            ));
        }

        Ok(lock(&self.state).track.clone())
    }

    fn subscribe(
        &self,
        kind: SignalKind,
        handler: SignalHandler,
    ) -> Result<SubscriptionToken, MediaError> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(MediaError::operation("Subscribe", "subscriptions disabled"));
        }

        Ok(self.subscribers.insert((kind, handler)))
    }

    async fn send(&self, command: SessionCommand) -> Result<(), MediaError> {
        lock(&self.commands).push(command);
        let signal = self.apply(command);
        self.emit(signal);
        Ok(())
    }
}

/// Thumbnail backed by bytes in memory.
pub struct MemoryThumbnail {
    bytes: Vec<u8>,
    content_type: String,
    delay: Option<Duration>,
    fail: bool,
}

impl MemoryThumbnail {
    /// Thumbnail that opens immediately
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            delay: None,
            fail: false,
        }
    }

    /// Thumbnail whose open fails
    pub fn failing() -> Self {
        Self {
            bytes: Vec::new(),
            content_type: String::new(),
            delay: None,
            fail: true,
        }
    }

    /// Delay every open by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Thumbnail for MemoryThumbnail {
    async fn open(&self) -> Result<RawThumbnail, MediaError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(MediaError::operation("OpenReadAsync", "thumbnail unavailable"));
        }

        Ok(RawThumbnail {
            bytes: self.bytes.clone(),
            content_type: self.content_type.clone(),
        })
    }
}
