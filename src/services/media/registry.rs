use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use super::{
    AppId, MediaError, SignalKind,
    backend::{ManagerEvent, MediaSession, SessionManager, SignalHandler, SubscriptionToken},
    notifier::EventNotifier,
    selector,
};
use crate::{config::MediaConfig, services::common::Property};

/// Work item for the single consumer task of the media service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryEvent {
    /// A tracked session fired one of its signals
    Signal {
        app_id: AppId,
        generation: u64,
        kind: SignalKind,
    },
    /// The session manager reported a topology change
    Manager(ManagerEvent),
}

struct Subscription {
    live: Arc<AtomicBool>,
    token: SubscriptionToken,
}

impl Subscription {
    fn release(self) {
        self.live.store(false, Ordering::SeqCst);
        self.token.release();
    }
}

struct RegistryEntry {
    session: Arc<dyn MediaSession>,
    generation: u64,
    subscriptions: Vec<Subscription>,
}

impl RegistryEntry {
    fn release(self) {
        for subscription in self.subscriptions {
            subscription.release();
        }
    }
}

/// Tracks every session of the manager together with its subscriptions.
///
/// All mutations hold the entry lock for their whole duration and fire the
/// notifier exactly once when done. Each entry carries a generation so that
/// signals queued by a released subscription are recognised and dropped.
pub(crate) struct SessionRegistry {
    manager: Arc<dyn SessionManager>,
    config: MediaConfig,
    entries: Mutex<BTreeMap<AppId, RegistryEntry>>,
    next_generation: AtomicU64,
    active: Property<Option<AppId>>,
    system: Property<Option<AppId>>,
    events_tx: mpsc::UnboundedSender<RegistryEvent>,
    notifier: Arc<EventNotifier>,
}

impl SessionRegistry {
    pub(crate) fn new(
        manager: Arc<dyn SessionManager>,
        config: MediaConfig,
        notifier: Arc<EventNotifier>,
        events_tx: mpsc::UnboundedSender<RegistryEvent>,
    ) -> Self {
        Self {
            manager,
            config,
            entries: Mutex::new(BTreeMap::new()),
            next_generation: AtomicU64::new(0),
            active: Property::new(None),
            system: Property::new(None),
            events_tx,
            notifier,
        }
    }

    /// Replace every entry with the sessions the manager currently reports.
    ///
    /// The last inserted session is the preferred candidate for selection.
    #[instrument(skip(self))]
    pub(crate) async fn rebuild(&self) {
        let mut entries = self.entries.lock().await;

        for (_, entry) in std::mem::take(&mut *entries) {
            entry.release();
        }

        let mut last_inserted = None;
        match self.manager.sessions().await {
            Ok(sessions) => {
                for session in sessions {
                    let app_id = session.app_id();
                    if app_id.is_empty() {
                        debug!("Skipping session without app id");
                        continue;
                    }

                    if self.config.is_ignored(app_id.as_str()) {
                        debug!(%app_id, "Ignoring session based on configuration");
                        continue;
                    }

                    match self.attach(&app_id, session) {
                        Ok(entry) => {
                            if let Some(previous) = entries.insert(app_id.clone(), entry) {
                                previous.release();
                            }
                            last_inserted = Some(app_id);
                        }
                        Err(e) => {
                            warn!(%app_id, error = %e, "Skipping session");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to enumerate sessions");
            }
        }

        self.reselect(&entries, last_inserted.as_ref());
        info!(
            sessions = entries.len(),
            active = ?self.active.get(),
            "Session registry rebuilt"
        );

        drop(entries);
        self.notifier.fire();
    }

    /// Drop one session and pick a new active session without preference.
    #[instrument(skip(self), fields(app_id = %app_id))]
    pub(crate) async fn remove(&self, app_id: &AppId) {
        let mut entries = self.entries.lock().await;

        match entries.remove(app_id) {
            Some(entry) => {
                entry.release();
                info!("Session removed");
            }
            None => debug!("Session was not tracked"),
        }

        self.reselect(&entries, None);

        drop(entries);
        self.notifier.fire();
    }

    /// Handle a signal forwarded from a session subscription.
    ///
    /// Signals from released subscriptions are dropped. A playback-info
    /// change re-runs the selection with the current selection as preference.
    pub(crate) async fn handle_signal(&self, app_id: &AppId, generation: u64, kind: SignalKind) {
        let entries = self.entries.lock().await;

        let current = entries
            .get(app_id)
            .is_some_and(|entry| entry.generation == generation);
        if !current {
            debug!(%app_id, generation, ?kind, "Dropping stale session signal");
            return;
        }

        if kind == SignalKind::PlaybackInfo {
            let preferred = self.active.get();
            self.reselect(&entries, preferred.as_ref());
        }

        drop(entries);
        self.notifier.fire();
    }

    /// Re-read the session the OS considers current.
    #[instrument(skip(self))]
    pub(crate) async fn refresh_system_session(&self) {
        match self.manager.current_session().await {
            Ok(current) => {
                let current = current.filter(|app_id| {
                    !app_id.is_empty() && !self.config.is_ignored(app_id.as_str())
                });
                if self.system.set(current.clone()) {
                    debug!(system = ?current, "System session changed");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read system session");
                let _ = self.system.set(None);
            }
        }

        self.notifier.fire();
    }

    /// Release every entry without notifying.
    pub(crate) async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        for (_, entry) in std::mem::take(&mut *entries) {
            entry.release();
        }
        let _ = self.active.set(None);
        let _ = self.system.set(None);
    }

    pub(crate) fn active(&self) -> &Property<Option<AppId>> {
        &self.active
    }

    pub(crate) fn system(&self) -> &Property<Option<AppId>> {
        &self.system
    }

    pub(crate) fn manager(&self) -> &Arc<dyn SessionManager> {
        &self.manager
    }

    /// Active app id together with its session.
    pub(crate) async fn active_session(&self) -> Option<(AppId, Arc<dyn MediaSession>)> {
        let entries = self.entries.lock().await;
        let app_id = self.active.get()?;
        let session = entries.get(&app_id).map(|entry| Arc::clone(&entry.session))?;
        Some((app_id, session))
    }

    pub(crate) async fn session(&self, app_id: &AppId) -> Option<Arc<dyn MediaSession>> {
        self.entries
            .lock()
            .await
            .get(app_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Registered app ids in key order.
    pub(crate) async fn app_ids(&self) -> Vec<AppId> {
        self.entries.lock().await.keys().cloned().collect()
    }

    fn attach(
        &self,
        app_id: &AppId,
        session: Arc<dyn MediaSession>,
    ) -> Result<RegistryEntry, MediaError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entry = RegistryEntry {
            session: Arc::clone(&session),
            generation,
            subscriptions: Vec::with_capacity(SignalKind::ALL.len()),
        };

        for kind in SignalKind::ALL {
            let live = Arc::new(AtomicBool::new(true));
            let handler = self.forwarder(app_id.clone(), generation, kind, Arc::clone(&live));

            match session.subscribe(kind, handler) {
                Ok(token) => entry.subscriptions.push(Subscription { live, token }),
                Err(e) => {
                    entry.release();
                    return Err(e);
                }
            }
        }

        Ok(entry)
    }

    fn forwarder(
        &self,
        app_id: AppId,
        generation: u64,
        kind: SignalKind,
        live: Arc<AtomicBool>,
    ) -> SignalHandler {
        let events_tx = self.events_tx.clone();
        Arc::new(move || {
            if !live.load(Ordering::SeqCst) {
                return;
            }

            let _ = events_tx.send(RegistryEvent::Signal {
                app_id: app_id.clone(),
                generation,
                kind,
            });
        })
    }

    fn reselect(&self, entries: &BTreeMap<AppId, RegistryEntry>, preferred: Option<&AppId>) {
        let candidates = entries.iter().map(|(app_id, entry)| {
            let status = entry.session.playback_info().map(|info| info.status);
            (app_id, status)
        });

        let selected = selector::select(candidates, preferred);
        if self.active.set(selected.clone()) {
            debug!(active = ?selected, "Active session changed");
        }
    }
}
