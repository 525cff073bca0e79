//! MPRIS players on the D-Bus session bus.

mod proxy;
mod session;
mod track;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, instrument, warn};
use zbus::{Connection, fdo};

use self::{proxy::MediaPlayer2Proxy, session::MprisSession};
use super::{
    HandlerSet, ManagerEvent, ManagerHandler, MediaSession, SessionManager, SubscriptionToken,
};
use crate::services::media::{AppId, MediaError};

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

fn app_id_from_bus_name(bus_name: &str) -> Option<AppId> {
    bus_name
        .strip_prefix(MPRIS_PREFIX)
        .filter(|name| !name.is_empty())
        .map(AppId::from)
}

fn bus_name(app_id: &AppId) -> String {
    format!("{MPRIS_PREFIX}{app_id}")
}

struct ManagerShared {
    handlers: HandlerSet<ManagerHandler>,
    sessions: Mutex<HashMap<AppId, Arc<MprisSession>>>,
}

impl ManagerShared {
    fn emit(&self, event: ManagerEvent) {
        for handler in self.handlers.snapshot() {
            handler(event.clone());
        }
    }
}

/// Session manager backed by the players on the session bus.
///
/// Sessions are cached between enumerations so that each player keeps a
/// single monitoring task for as long as it owns its bus name.
pub(crate) struct MprisManager {
    connection: Connection,
    shared: Arc<ManagerShared>,
    discovery: JoinHandle<()>,
}

impl MprisManager {
    /// Connect to the session bus and start watching for players.
    ///
    /// # Errors
    /// Returns `MediaError::InitializationFailed` if the bus or the
    /// name-owner signal is unavailable
    #[instrument]
    pub(crate) async fn connect() -> Result<Self, MediaError> {
        info!("Connecting to MPRIS players");

        let connection = Connection::session().await.map_err(|e| {
            MediaError::InitializationFailed(format!("D-Bus connection failed: {e}"))
        })?;

        let dbus_proxy = fdo::DBusProxy::new(&connection)
            .await
            .map_err(|e| MediaError::InitializationFailed(format!("DBus proxy failed: {e}")))?;

        let mut name_owner_changed =
            dbus_proxy.receive_name_owner_changed().await.map_err(|e| {
                MediaError::InitializationFailed(format!("Signal subscription failed: {e}"))
            })?;

        let shared = Arc::new(ManagerShared {
            handlers: HandlerSet::new(),
            sessions: Mutex::new(HashMap::new()),
        });

        let weak: Weak<ManagerShared> = Arc::downgrade(&shared);
        let discovery = tokio::spawn(async move {
            while let Some(signal) = name_owner_changed.next().await {
                let Ok(args) = signal.args() else {
                    continue;
                };

                let Some(app_id) = app_id_from_bus_name(args.name()) else {
                    continue;
                };

                let Some(shared) = weak.upgrade() else {
                    return;
                };

                match (args.old_owner().as_deref(), args.new_owner().as_deref()) {
                    (Some(_), None) => {
                        debug!(%app_id, "MPRIS player left the bus");
                        shared.sessions.lock().await.remove(&app_id);
                        shared.emit(ManagerEvent::SessionClosed(app_id));
                    }
                    _ => {
                        debug!(%app_id, "MPRIS player appeared on the bus");
                        shared.emit(ManagerEvent::SessionsChanged);
                    }
                }
            }
        });

        Ok(Self {
            connection,
            shared,
            discovery,
        })
    }
}

impl Drop for MprisManager {
    fn drop(&mut self) {
        self.discovery.abort();
    }
}

#[async_trait]
impl SessionManager for MprisManager {
    async fn sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, MediaError> {
        let dbus_proxy = fdo::DBusProxy::new(&self.connection).await?;
        let names = dbus_proxy
            .list_names()
            .await
            .map_err(|e| MediaError::Dbus(e.into()))?;

        let mut cache = self.shared.sessions.lock().await;
        let mut seen = HashSet::new();
        let mut sessions: Vec<Arc<dyn MediaSession>> = Vec::new();

        for name in names {
            let Some(app_id) = app_id_from_bus_name(name.as_str()) else {
                continue;
            };

            let session = match cache.get(&app_id) {
                Some(session) => Arc::clone(session),
                None => match MprisSession::connect(&self.connection, name.as_str(), app_id.clone())
                    .await
                {
                    Ok(session) => {
                        cache.insert(app_id.clone(), Arc::clone(&session));
                        session
                    }
                    Err(e) => {
                        warn!(%app_id, error = %e, "Failed to connect to player");
                        continue;
                    }
                },
            };

            seen.insert(app_id);
            sessions.push(session);
        }

        cache.retain(|app_id, _| seen.contains(app_id));
        Ok(sessions)
    }

    fn subscribe(&self, handler: ManagerHandler) -> Result<SubscriptionToken, MediaError> {
        Ok(self.shared.handlers.insert(handler))
    }

    async fn current_session(&self) -> Result<Option<AppId>, MediaError> {
        Ok(None)
    }

    async fn display_name(&self, app_id: &AppId) -> Option<String> {
        let proxy = MediaPlayer2Proxy::builder(&self.connection)
            .destination(bus_name(app_id))
            .ok()?
            .build()
            .await
            .ok()?;

        proxy
            .identity()
            .await
            .ok()
            .filter(|identity| !identity.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_names_map_to_app_ids() {
        assert_eq!(
            app_id_from_bus_name("org.mpris.MediaPlayer2.spotify"),
            Some(AppId::from("spotify"))
        );
        assert_eq!(
            app_id_from_bus_name("org.mpris.MediaPlayer2.firefox.instance_1_42"),
            Some(AppId::from("firefox.instance_1_42"))
        );
        assert_eq!(app_id_from_bus_name("org.mpris.MediaPlayer2."), None);
        assert_eq!(app_id_from_bus_name("org.freedesktop.Notifications"), None);
    }

    #[test]
    fn app_ids_map_back_to_bus_names() {
        assert_eq!(
            bus_name(&AppId::from("vlc")),
            "org.mpris.MediaPlayer2.vlc"
        );
    }
}
