use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::Utc;
use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, instrument};

use super::{
    AppId, LoopMode, MediaError, RepeatMode, SessionCommand, VOLUME_UNSUPPORTED,
    backend::{self, ManagerEvent, MediaSession, SessionManager, SubscriptionToken},
    metadata::MetadataFetcher,
    notifier::EventNotifier,
    position,
    registry::{RegistryEvent, SessionRegistry},
    update::{self, Update},
};
use crate::config::MediaConfig;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Tracks OS media sessions and exposes the active one.
///
/// OS callbacks only enqueue events. A single task consumes them and
/// mutates the session registry, so registry changes never interleave.
/// Control commands are fire-and-forget: they run on a spawned task against
/// whatever session is active when the task runs, and failures are only
/// logged.
pub struct MediaService {
    registry: Arc<SessionRegistry>,
    notifier: Arc<EventNotifier>,
    fetcher: MetadataFetcher,
    manager_subscription: Mutex<Option<SubscriptionToken>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MediaService {
    /// Start the service on the native backend of this platform.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Unsupported` on platforms without a backend and
    /// `MediaError::InitializationFailed` if the OS service is unreachable.
    pub async fn start_native(config: MediaConfig) -> Result<Self, MediaError> {
        let manager = backend::platform().await?;
        Self::start(manager, config).await
    }

    /// Start the service on top of `manager`.
    ///
    /// Performs the initial registry build before returning, so the active
    /// session is already known to the caller.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InitializationFailed` if the manager refuses the
    /// topology subscription.
    #[instrument(skip_all)]
    pub async fn start(
        manager: Arc<dyn SessionManager>,
        config: MediaConfig,
    ) -> Result<Self, MediaError> {
        info!("Starting media service");

        let notifier = Arc::new(EventNotifier::new());
        let fetcher = MetadataFetcher::new(&config);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&manager),
            config,
            Arc::clone(&notifier),
            events_tx.clone(),
        ));

        let manager_subscription = manager
            .subscribe(Arc::new(move |event| {
                let _ = events_tx.send(RegistryEvent::Manager(event));
            }))
            .map_err(|e| {
                MediaError::InitializationFailed(format!("manager subscription failed: {e}"))
            })?;

        registry.rebuild().await;
        registry.refresh_system_session().await;

        let event_loop = tokio::spawn(Self::run_event_loop(Arc::clone(&registry), events_rx));

        info!("Media service started");
        Ok(Self {
            registry,
            notifier,
            fetcher,
            manager_subscription: Mutex::new(Some(manager_subscription)),
            event_loop: Mutex::new(Some(event_loop)),
        })
    }

    async fn run_event_loop(
        registry: Arc<SessionRegistry>,
        mut events_rx: mpsc::UnboundedReceiver<RegistryEvent>,
    ) {
        while let Some(event) = events_rx.recv().await {
            match event {
                RegistryEvent::Signal {
                    app_id,
                    generation,
                    kind,
                } => registry.handle_signal(&app_id, generation, kind).await,
                RegistryEvent::Manager(ManagerEvent::SessionsChanged) => registry.rebuild().await,
                RegistryEvent::Manager(ManagerEvent::SessionClosed(app_id)) => {
                    registry.remove(&app_id).await;
                }
                RegistryEvent::Manager(ManagerEvent::CurrentSessionChanged) => {
                    registry.refresh_system_session().await;
                }
            }
        }

        debug!("Media event loop ended");
    }

    /// Stop tracking sessions.
    ///
    /// Releases every subscription and clears the notify callback. Commands
    /// and queries afterwards behave as if no session existed.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let subscription = self
            .manager_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.release();
        }

        let event_loop = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(event_loop) = event_loop {
            event_loop.abort();
        }

        self.registry.clear().await;
        self.notifier.clear();
        info!("Media service stopped");
    }

    /// Install the change callback, replacing any previous one.
    ///
    /// The callback fires once immediately and then after every tracked OS
    /// change. It runs on the service's event task and must not block.
    pub fn set_notify_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.set(Arc::new(callback));
    }

    /// Remove the change callback
    pub fn clear_notify_callback(&self) {
        self.notifier.clear();
    }

    /// Snapshot of the active session, `None` when no session is active.
    pub async fn get_update(&self) -> Option<Update> {
        let (app_id, session) = self.registry.active_session().await?;
        Some(update::compose(self.registry.manager().as_ref(), app_id, session, self.fetcher).await)
    }

    /// Snapshot of any registered session.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::SessionNotFound` if `app_id` is not registered.
    pub async fn update_for(&self, app_id: &AppId) -> Result<Update, MediaError> {
        let session = self
            .registry
            .session(app_id)
            .await
            .ok_or_else(|| MediaError::SessionNotFound(app_id.clone()))?;

        Ok(update::compose(
            self.registry.manager().as_ref(),
            app_id.clone(),
            session,
            self.fetcher,
        )
        .await)
    }

    /// Stream of snapshots of the active session.
    ///
    /// Yields the current snapshot immediately and a fresh one after each
    /// change notification. Bursts of notifications are coalesced.
    pub fn updates(&self) -> impl Stream<Item = Option<Update>> + Send + 'static {
        let mut generation = self.notifier.subscribe();
        let registry = Arc::clone(&self.registry);
        let fetcher = self.fetcher;

        async_stream::stream! {
            loop {
                let snapshot = match registry.active_session().await {
                    Some((app_id, session)) => Some(
                        update::compose(registry.manager().as_ref(), app_id, session, fetcher).await,
                    ),
                    None => None,
                };
                yield snapshot;

                if generation.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Registered app ids in key order
    pub async fn sessions(&self) -> Vec<AppId> {
        self.registry.app_ids().await
    }

    /// App id of the active session
    pub fn active_app(&self) -> Option<AppId> {
        self.registry.active().get()
    }

    /// Stream of the active app id, starting with the current one
    pub fn active_app_monitored(&self) -> impl Stream<Item = Option<AppId>> + Send {
        self.registry.active().watch()
    }

    /// App id of the session the OS itself considers current.
    ///
    /// Tracked for information only; it never influences the active session.
    pub fn system_session(&self) -> Option<AppId> {
        self.registry.system().get()
    }

    /// Stream of the OS-designated session, starting with the current one
    pub fn system_session_monitored(&self) -> impl Stream<Item = Option<AppId>> + Send {
        self.registry.system().watch()
    }

    /// Friendly name of an application, falling back to its app id
    pub async fn display_name_for(&self, app_id: &AppId) -> String {
        update::display_name(self.registry.manager().as_ref(), app_id).await
    }

    /// Start playback
    pub fn play(&self) {
        self.dispatch("play", |_| Some(SessionCommand::Play));
    }

    /// Pause playback
    pub fn pause(&self) {
        self.dispatch("pause", |_| Some(SessionCommand::Pause));
    }

    /// Toggle between playing and paused
    pub fn play_pause(&self) {
        self.dispatch("play_pause", |_| Some(SessionCommand::TogglePlayPause));
    }

    /// Stop playback
    pub fn stop(&self) {
        self.dispatch("stop", |_| Some(SessionCommand::Stop));
    }

    /// Skip to the next track
    pub fn next(&self) {
        self.dispatch("next", |_| Some(SessionCommand::Next));
    }

    /// Skip to the previous track
    pub fn previous(&self) {
        self.dispatch("previous", |_| Some(SessionCommand::Previous));
    }

    /// Invert the shuffle state, treating an unreported state as off
    pub fn toggle_shuffle(&self) {
        self.dispatch("toggle_shuffle", |session| {
            let shuffle = session
                .playback_info()
                .and_then(|info| info.shuffle)
                .unwrap_or(false);
            Some(SessionCommand::SetShuffle(!shuffle))
        });
    }

    /// Enable or disable shuffle
    pub fn set_shuffle(&self, shuffle: bool) {
        self.dispatch("set_shuffle", move |_| {
            Some(SessionCommand::SetShuffle(shuffle))
        });
    }

    /// Advance the loop mode `None -> Playlist -> Track -> None`
    pub fn cycle_repeat_mode(&self) {
        self.dispatch("cycle_repeat_mode", |session| {
            let current = LoopMode::from(session.playback_info().and_then(|info| info.repeat));
            Some(SessionCommand::SetRepeat(RepeatMode::from(current.cycled())))
        });
    }

    /// Set the loop mode
    pub fn set_repeat_mode(&self, mode: LoopMode) {
        self.dispatch("set_repeat_mode", move |_| {
            Some(SessionCommand::SetRepeat(RepeatMode::from(mode)))
        });
    }

    /// Move the position by `offset_micros` relative to the estimated
    /// current position, clamped to the track.
    pub fn seek_relative(&self, offset_micros: i64) {
        self.dispatch("seek_relative", move |session| {
            let timeline = session.timeline()?;
            let status = session.playback_info().map(|info| info.status);

            let current = position::estimate(status, &timeline, Utc::now());
            let mut target = (current + offset_micros as f64 / MICROS_PER_SECOND).max(0.0);
            if timeline.has_duration() {
                target = target.min(timeline.length().as_secs_f64());
            }

            let target = Duration::try_from_secs_f64(target).ok()?;
            Some(SessionCommand::ChangePosition(timeline.start + target))
        });
    }

    /// Move to a fraction of the track length, clamped to `0.0..=1.0`.
    pub fn seek_to_fraction(&self, fraction: f64) {
        if fraction.is_nan() {
            debug!(fraction, "Ignoring seek to invalid fraction");
            return;
        }

        let fraction = fraction.clamp(0.0, 1.0);
        self.dispatch("seek_to_fraction", move |session| {
            let timeline = session.timeline()?;
            let target = timeline.length().mul_f64(fraction);
            Some(SessionCommand::ChangePosition(timeline.start + target))
        });
    }

    /// Move to `seconds` from the start of the track
    pub fn set_position(&self, seconds: f64) {
        let Ok(offset) = Duration::try_from_secs_f64(seconds.max(0.0)) else {
            debug!(seconds, "Ignoring invalid position");
            return;
        };

        self.dispatch("set_position", move |session| {
            let start = session.timeline().map_or(Duration::ZERO, |timeline| timeline.start);
            Some(SessionCommand::ChangePosition(start + offset))
        });
    }

    /// Estimated elapsed seconds of the active session, zero without one
    pub async fn get_position(&self) -> f64 {
        let Some((_, session)) = self.registry.active_session().await else {
            return 0.0;
        };

        let status = session.playback_info().map(|info| info.status);
        session
            .timeline()
            .map_or(0.0, |timeline| position::estimate(status, &timeline, Utc::now()))
    }

    /// Volume is not supported, always returns [`VOLUME_UNSUPPORTED`]
    pub fn get_volume(&self) -> f64 {
        VOLUME_UNSUPPORTED
    }

    /// Volume is not supported, the request is ignored
    pub fn set_volume(&self, volume: f64) {
        debug!(volume, "Ignoring volume change");
    }

    fn dispatch<F>(&self, operation: &'static str, build: F)
    where
        F: FnOnce(&dyn MediaSession) -> Option<SessionCommand> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let Some((app_id, session)) = registry.active_session().await else {
                debug!(operation, "No active session");
                return;
            };

            let Some(command) = build(session.as_ref()) else {
                debug!(operation, %app_id, "Session cannot serve command");
                return;
            };

            if let Err(e) = session.send(command).await {
                debug!(operation, %app_id, error = %e, "Command failed");
            }
        });
    }
}

impl Drop for MediaService {
    fn drop(&mut self) {
        let event_loop = self
            .event_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(event_loop) = event_loop {
            event_loop.abort();
        }
    }
}
