use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::{
    AppId, Capabilities, LoopMode, PlaybackState, VOLUME_UNSUPPORTED,
    backend::{MediaSession, SessionManager},
    capabilities,
    metadata::{Metadata, MetadataFetcher},
    position,
};

/// Snapshot of one session as handed to the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    /// App id of the session
    pub app: AppId,
    /// Human-readable application name
    pub app_name: String,
    /// Collapsed playback state
    pub status: PlaybackState,
    /// Collapsed loop mode
    pub loop_mode: LoopMode,
    /// Shuffle state, `false` when the session does not report it
    pub shuffle: bool,
    /// Always [`VOLUME_UNSUPPORTED`]
    pub volume: f64,
    /// Estimated elapsed time in seconds
    pub elapsed: f64,
    /// Available playback controls
    pub capabilities: Capabilities,
    /// Current track, absent when it could not be read
    pub metadata: Option<Metadata>,
}

/// Name shown for an app id when the OS knows no friendly name.
pub fn fallback_display_name(app_id: &AppId) -> String {
    let raw = app_id.as_str();
    let split = raw.len().saturating_sub(".exe".len());

    match raw.get(split..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".exe") => raw[..split].to_string(),
        _ => raw.to_string(),
    }
}

pub(crate) async fn display_name(manager: &dyn SessionManager, app_id: &AppId) -> String {
    match manager.display_name(app_id).await {
        Some(name) if !name.trim().is_empty() => name,
        _ => fallback_display_name(app_id),
    }
}

/// Compose the snapshot of `session`.
///
/// The metadata fetch starts first and is joined last so that it overlaps
/// with display-name resolution.
#[instrument(skip(manager, session, fetcher), fields(app_id = %app_id))]
pub(crate) async fn compose(
    manager: &dyn SessionManager,
    app_id: AppId,
    session: Arc<dyn MediaSession>,
    fetcher: MetadataFetcher,
) -> Update {
    let metadata_task = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { fetcher.fetch(session.as_ref()).await })
    };

    let app_name = display_name(manager, &app_id).await;

    let info = session.playback_info();
    let timeline = session.timeline();
    let status = info.map(|info| info.status);

    let elapsed = timeline
        .as_ref()
        .map_or(0.0, |timeline| position::estimate(status, timeline, Utc::now()));
    let capabilities = capabilities::resolve(info.map(|info| info.controls), timeline.as_ref());

    let metadata = match metadata_task.await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(error = %e, "Metadata task failed");
            None
        }
    };

    Update {
        app: app_id,
        app_name,
        status: PlaybackState::from(status),
        loop_mode: LoopMode::from(info.and_then(|info| info.repeat)),
        shuffle: info.and_then(|info| info.shuffle).unwrap_or(false),
        volume: VOLUME_UNSUPPORTED,
        elapsed,
        capabilities,
        metadata,
    }
}
