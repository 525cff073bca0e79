//! Seams between the media service and the OS session manager.
//!
//! The service only talks to [`SessionManager`] and [`MediaSession`] trait
//! objects. Each platform provides its own implementation and
//! [`memory`] offers a scriptable one for embedding and tests.

/// Scriptable in-process backend
pub mod memory;
#[cfg(target_os = "linux")]
mod mpris;
#[cfg(windows)]
mod windows;

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;

use super::{
    AppId, MediaError, PlaybackInfo, SessionCommand, SignalKind, TimelineAnchor,
};

/// Callback invoked by a session when one of its signals fires.
///
/// Backends may call it from any thread, so it must return quickly.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked by the session manager for topology changes.
pub type ManagerHandler = Arc<dyn Fn(ManagerEvent) + Send + Sync>;

/// Topology changes reported by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The set of sessions changed in an unspecified way
    SessionsChanged,
    /// A single session went away
    SessionClosed(AppId),
    /// The OS changed its own notion of the current session
    CurrentSessionChanged,
}

/// Revocable registration of a handler with a backend.
///
/// Releasing runs the backend's unregister routine exactly once. Dropping an
/// unreleased token releases it as well.
pub struct SubscriptionToken {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionToken {
    /// Create a token that runs `release` when the subscription is revoked
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Revoke the subscription
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registered handlers of one backend object, keyed by registration.
pub(crate) struct HandlerSet<K> {
    next_id: AtomicU64,
    handlers: Arc<Mutex<HashMap<u64, K>>>,
}

impl<K: Clone + Send + 'static> HandlerSet<K> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a handler, the token removes it again
    pub(crate) fn insert(&self, handler: K) -> SubscriptionToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).insert(id, handler);

        let handlers = Arc::clone(&self.handlers);
        SubscriptionToken::new(move || {
            lock(&handlers).remove(&id);
        })
    }

    /// Clone of every handler, taken so callbacks run without the lock held
    pub(crate) fn snapshot(&self) -> Vec<K> {
        lock(&self.handlers).values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.handlers).len()
    }
}

/// Encoded image bytes as read from a thumbnail source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThumbnail {
    /// Encoded image
    pub bytes: Vec<u8>,
    /// Content type reported by the source, empty when unknown
    pub content_type: String,
}

/// Lazily opened thumbnail of the current track
#[async_trait]
pub trait Thumbnail: Send + Sync {
    /// Read the whole thumbnail.
    ///
    /// # Errors
    /// Returns error if the source cannot be opened or read
    async fn open(&self) -> Result<RawThumbnail, MediaError>;
}

/// Raw track properties of a session
#[derive(Clone, Default)]
pub struct TrackProperties {
    /// Track title
    pub title: String,
    /// Primary artist
    pub artist: String,
    /// All artists, empty when the source only knows one
    pub artists: Vec<String>,
    /// Album title
    pub album: String,
    /// Primary album artist
    pub album_artist: String,
    /// All album artists, empty when the source only knows one
    pub album_artists: Vec<String>,
    /// Thumbnail source, if the track has one
    pub thumbnail: Option<Arc<dyn Thumbnail>>,
}

impl fmt::Debug for TrackProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackProperties")
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("artists", &self.artists)
            .field("album", &self.album)
            .field("album_artist", &self.album_artist)
            .field("album_artists", &self.album_artists)
            .field("thumbnail", &self.thumbnail.is_some())
            .finish()
    }
}

/// OS-level service that owns all media sessions
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Enumerate every session currently known to the OS.
    ///
    /// # Errors
    /// Returns error if the enumeration as a whole fails
    async fn sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, MediaError>;

    /// Register a handler for topology changes.
    ///
    /// # Errors
    /// Returns error if the OS refuses the registration
    fn subscribe(&self, handler: ManagerHandler) -> Result<SubscriptionToken, MediaError>;

    /// App id of the session the OS itself considers current.
    ///
    /// # Errors
    /// Returns error if the OS call fails
    async fn current_session(&self) -> Result<Option<AppId>, MediaError>;

    /// Human-readable name of the application behind `app_id`, if known
    async fn display_name(&self, app_id: &AppId) -> Option<String>;
}

/// One media session as exposed by the OS
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Identifier of the owning application
    fn app_id(&self) -> AppId;

    /// Current playback information, `None` if the OS call fails
    fn playback_info(&self) -> Option<PlaybackInfo>;

    /// Current timeline anchor, `None` if the OS call fails
    fn timeline(&self) -> Option<TimelineAnchor>;

    /// Fetch the current track properties.
    ///
    /// # Errors
    /// Returns error if the OS cannot provide them
    async fn track_properties(&self) -> Result<TrackProperties, MediaError>;

    /// Register a handler for one signal kind.
    ///
    /// # Errors
    /// Returns error if the OS refuses the registration
    fn subscribe(
        &self,
        kind: SignalKind,
        handler: SignalHandler,
    ) -> Result<SubscriptionToken, MediaError>;

    /// Dispatch a control command.
    ///
    /// # Errors
    /// Returns error if the OS rejects the command
    async fn send(&self, command: SessionCommand) -> Result<(), MediaError>;
}

/// Connect to the native session manager of this platform.
///
/// # Errors
/// Returns `Unsupported` on platforms without a backend, or an
/// initialization error if the OS service cannot be reached
#[cfg(target_os = "linux")]
pub async fn platform() -> Result<Arc<dyn SessionManager>, MediaError> {
    let manager = mpris::MprisManager::connect().await?;
    Ok(Arc::new(manager))
}

/// Connect to the native session manager of this platform.
///
/// # Errors
/// Returns `Unsupported` on platforms without a backend, or an
/// initialization error if the OS service cannot be reached
#[cfg(windows)]
pub async fn platform() -> Result<Arc<dyn SessionManager>, MediaError> {
    let manager = windows::GsmtcManager::request().await?;
    Ok(Arc::new(manager))
}

/// Connect to the native session manager of this platform.
///
/// # Errors
/// Always returns `Unsupported`
#[cfg(not(any(target_os = "linux", windows)))]
pub async fn platform() -> Result<Arc<dyn SessionManager>, MediaError> {
    Err(MediaError::Unsupported)
}
