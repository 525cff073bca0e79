//! Global System Media Transport Controls.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use windows::{
    ApplicationModel::AppInfo,
    Foundation::{DateTime as WinDateTime, TimeSpan, TypedEventHandler},
    Media::{
        Control::{
            GlobalSystemMediaTransportControlsSession as GsmtcSession,
            GlobalSystemMediaTransportControlsSessionManager as GsmtcManagerHandle,
            GlobalSystemMediaTransportControlsSessionPlaybackStatus as GsmtcStatus,
        },
        MediaPlaybackAutoRepeatMode,
    },
    Storage::Streams::{Buffer, DataReader, IRandomAccessStreamReference, InputStreamOptions},
    System::User,
    core::HSTRING,
};

use super::{
    ManagerEvent, ManagerHandler, MediaSession, RawThumbnail, SessionManager, SignalHandler,
    SubscriptionToken, Thumbnail, TrackProperties,
};
use crate::services::media::{
    AppId, ControlFlags, MediaError, PlaybackInfo, PlaybackStatus, RepeatMode, SessionCommand,
    SignalKind, TimelineAnchor,
};

/// 100ns ticks between 1601-01-01 and the Unix epoch
const UNIX_EPOCH_TICKS: i64 = 0x019D_B1DE_D53E_8000;
const TICKS_PER_MICROSECOND: i64 = 10;

fn ticks_to_duration(span: TimeSpan) -> Duration {
    Duration::from_micros(u64::try_from(span.Duration / TICKS_PER_MICROSECOND).unwrap_or(0))
}

fn duration_to_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros())
        .unwrap_or(i64::MAX / TICKS_PER_MICROSECOND)
        .saturating_mul(TICKS_PER_MICROSECOND)
}

fn to_utc(time: WinDateTime) -> DateTime<Utc> {
    let micros = (time.UniversalTime - UNIX_EPOCH_TICKS) / TICKS_PER_MICROSECOND;
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn to_status(status: GsmtcStatus) -> PlaybackStatus {
    match status {
        GsmtcStatus::Closed => PlaybackStatus::Closed,
        GsmtcStatus::Opened => PlaybackStatus::Opened,
        GsmtcStatus::Changing => PlaybackStatus::Changing,
        GsmtcStatus::Playing => PlaybackStatus::Playing,
        GsmtcStatus::Paused => PlaybackStatus::Paused,
        _ => PlaybackStatus::Stopped,
    }
}

fn to_repeat(mode: MediaPlaybackAutoRepeatMode) -> RepeatMode {
    match mode {
        MediaPlaybackAutoRepeatMode::Track => RepeatMode::Track,
        MediaPlaybackAutoRepeatMode::List => RepeatMode::List,
        _ => RepeatMode::None,
    }
}

fn from_repeat(mode: RepeatMode) -> MediaPlaybackAutoRepeatMode {
    match mode {
        RepeatMode::None => MediaPlaybackAutoRepeatMode::None,
        RepeatMode::Track => MediaPlaybackAutoRepeatMode::Track,
        RepeatMode::List => MediaPlaybackAutoRepeatMode::List,
    }
}

/// Session manager of the Windows shell.
pub(crate) struct GsmtcManager {
    manager: GsmtcManagerHandle,
}

impl GsmtcManager {
    /// Request the process-wide transport controls manager.
    ///
    /// # Errors
    /// Returns `MediaError::InitializationFailed` if the shell refuses
    #[instrument]
    pub(crate) async fn request() -> Result<Self, MediaError> {
        info!("Requesting media transport controls manager");

        let manager = GsmtcManagerHandle::RequestAsync()
            .map_err(|e| MediaError::InitializationFailed(format!("RequestAsync failed: {e}")))?
            .await
            .map_err(|e| MediaError::InitializationFailed(format!("RequestAsync failed: {e}")))?;

        Ok(Self { manager })
    }

    async fn display_name_for_user(aumid: &HSTRING) -> windows::core::Result<String> {
        let user = User::FindAllAsync()?.await?.GetAt(0)?;
        let name = AppInfo::GetFromAppUserModelIdForUser(&user, aumid)?
            .DisplayInfo()?
            .DisplayName()?;
        Ok(name.to_string())
    }

    fn display_name_global(aumid: &HSTRING) -> windows::core::Result<String> {
        let name = AppInfo::GetFromAppUserModelId(aumid)?
            .DisplayInfo()?
            .DisplayName()?;
        Ok(name.to_string())
    }
}

#[async_trait]
impl SessionManager for GsmtcManager {
    async fn sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, MediaError> {
        let sessions = self.manager.GetSessions()?;
        let mut result: Vec<Arc<dyn MediaSession>> = Vec::new();

        for session in sessions {
            match session.SourceAppUserModelId() {
                Ok(aumid) => result.push(Arc::new(GsmtcMediaSession {
                    app_id: AppId::from(aumid.to_string()),
                    session,
                })),
                Err(e) => debug!(error = %e, "Skipping session without app id"),
            }
        }

        Ok(result)
    }

    fn subscribe(&self, handler: ManagerHandler) -> Result<SubscriptionToken, MediaError> {
        let sessions_handler = Arc::clone(&handler);
        let sessions_token = self.manager.SessionsChanged(&TypedEventHandler::new(
            move |_, _| {
                sessions_handler(ManagerEvent::SessionsChanged);
                Ok(())
            },
        ))?;

        let current_token = match self.manager.CurrentSessionChanged(&TypedEventHandler::new(
            move |_, _| {
                handler(ManagerEvent::CurrentSessionChanged);
                Ok(())
            },
        )) {
            Ok(token) => token,
            Err(e) => {
                let _ = self.manager.RemoveSessionsChanged(sessions_token);
                return Err(e.into());
            }
        };

        let manager = self.manager.clone();
        Ok(SubscriptionToken::new(move || {
            let _ = manager.RemoveSessionsChanged(sessions_token);
            let _ = manager.RemoveCurrentSessionChanged(current_token);
        }))
    }

    async fn current_session(&self) -> Result<Option<AppId>, MediaError> {
        match self.manager.GetCurrentSession() {
            Ok(session) => Ok(Some(AppId::from(session.SourceAppUserModelId()?.to_string()))),
            Err(e) if e.code().is_ok() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn display_name(&self, app_id: &AppId) -> Option<String> {
        let aumid = HSTRING::from(app_id.as_str());

        match Self::display_name_for_user(&aumid).await {
            Ok(name) => return Some(name),
            Err(e) => debug!(%app_id, error = %e, "Per-user app lookup failed"),
        }

        match Self::display_name_global(&aumid) {
            Ok(name) => Some(name),
            Err(e) => {
                debug!(%app_id, error = %e, "Global app lookup failed");
                None
            }
        }
    }
}

struct GsmtcMediaSession {
    app_id: AppId,
    session: GsmtcSession,
}

#[async_trait]
impl MediaSession for GsmtcMediaSession {
    fn app_id(&self) -> AppId {
        self.app_id.clone()
    }

    fn playback_info(&self) -> Option<PlaybackInfo> {
        let info = self.session.GetPlaybackInfo().ok()?;
        let status = info.PlaybackStatus().map_or(PlaybackStatus::Stopped, to_status);

        let mut controls = ControlFlags::empty();
        if let Ok(c) = info.Controls() {
            controls.set(ControlFlags::PLAY, c.IsPlayEnabled().unwrap_or(false));
            controls.set(ControlFlags::PAUSE, c.IsPauseEnabled().unwrap_or(false));
            controls.set(ControlFlags::STOP, c.IsStopEnabled().unwrap_or(false));
            controls.set(ControlFlags::NEXT, c.IsNextEnabled().unwrap_or(false));
            controls.set(ControlFlags::PREVIOUS, c.IsPreviousEnabled().unwrap_or(false));
            controls.set(
                ControlFlags::SEEK,
                c.IsPlaybackPositionEnabled().unwrap_or(false),
            );
            controls.set(ControlFlags::SHUFFLE, c.IsShuffleEnabled().unwrap_or(false));
            controls.set(ControlFlags::REPEAT, c.IsRepeatEnabled().unwrap_or(false));
        }

        let shuffle = info
            .IsShuffleActive()
            .and_then(|value| value.Value())
            .ok();
        let repeat = info
            .AutoRepeatMode()
            .and_then(|value| value.Value())
            .ok()
            .map(to_repeat);

        Some(PlaybackInfo {
            status,
            controls,
            shuffle,
            repeat,
        })
    }

    fn timeline(&self) -> Option<TimelineAnchor> {
        let timeline = self.session.GetTimelineProperties().ok()?;

        Some(TimelineAnchor {
            start: timeline.StartTime().map_or(Duration::ZERO, ticks_to_duration),
            end: timeline.EndTime().map_or(Duration::ZERO, ticks_to_duration),
            position: timeline.Position().map_or(Duration::ZERO, ticks_to_duration),
            last_updated: timeline
                .LastUpdatedTime()
                .map_or(DateTime::<Utc>::UNIX_EPOCH, to_utc),
        })
    }

    async fn track_properties(&self) -> Result<TrackProperties, MediaError> {
        let properties = self.session.TryGetMediaPropertiesAsync()?.await?;

        let text = |value: windows::core::Result<HSTRING>| {
            value.map(|value| value.to_string()).unwrap_or_default()
        };

        let thumbnail = properties
            .Thumbnail()
            .ok()
            .map(|reference| Arc::new(GsmtcThumbnail { reference }) as Arc<dyn Thumbnail>);

        Ok(TrackProperties {
            title: text(properties.Title()),
            artist: text(properties.Artist()),
            artists: Vec::new(),
            album: text(properties.AlbumTitle()),
            album_artist: text(properties.AlbumArtist()),
            album_artists: Vec::new(),
            thumbnail,
        })
    }

    fn subscribe(
        &self,
        kind: SignalKind,
        handler: SignalHandler,
    ) -> Result<SubscriptionToken, MediaError> {
        let session = self.session.clone();

        let token = match kind {
            SignalKind::PlaybackInfo => {
                let token = self.session.PlaybackInfoChanged(&TypedEventHandler::new(
                    move |_, _| {
                        handler();
                        Ok(())
                    },
                ))?;
                SubscriptionToken::new(move || {
                    let _ = session.RemovePlaybackInfoChanged(token);
                })
            }
            SignalKind::MediaProperties => {
                let token = self.session.MediaPropertiesChanged(&TypedEventHandler::new(
                    move |_, _| {
                        handler();
                        Ok(())
                    },
                ))?;
                SubscriptionToken::new(move || {
                    let _ = session.RemoveMediaPropertiesChanged(token);
                })
            }
            SignalKind::TimelineProperties => {
                let token = self
                    .session
                    .TimelinePropertiesChanged(&TypedEventHandler::new(move |_, _| {
                        handler();
                        Ok(())
                    }))?;
                SubscriptionToken::new(move || {
                    let _ = session.RemoveTimelinePropertiesChanged(token);
                })
            }
        };

        Ok(token)
    }

    #[instrument(skip(self), fields(app_id = %self.app_id))]
    async fn send(&self, command: SessionCommand) -> Result<(), MediaError> {
        let accepted = match command {
            SessionCommand::Play => self.session.TryPlayAsync()?.await?,
            SessionCommand::Pause => self.session.TryPauseAsync()?.await?,
            SessionCommand::TogglePlayPause => self.session.TryTogglePlayPauseAsync()?.await?,
            SessionCommand::Stop => self.session.TryStopAsync()?.await?,
            SessionCommand::Next => self.session.TrySkipNextAsync()?.await?,
            SessionCommand::Previous => self.session.TrySkipPreviousAsync()?.await?,
            SessionCommand::SetShuffle(shuffle) => {
                self.session.TryChangeShuffleActiveAsync(shuffle)?.await?
            }
            SessionCommand::SetRepeat(mode) => {
                self.session
                    .TryChangeAutoRepeatModeAsync(from_repeat(mode))?
                    .await?
            }
            SessionCommand::ChangePosition(position) => {
                self.session
                    .TryChangePlaybackPositionAsync(duration_to_ticks(position))?
                    .await?
            }
        };

        if !accepted {
            return Err(MediaError::operation("send", format!("{command:?} rejected")));
        }

        Ok(())
    }
}

struct GsmtcThumbnail {
    reference: IRandomAccessStreamReference,
}

#[async_trait]
impl Thumbnail for GsmtcThumbnail {
    async fn open(&self) -> Result<RawThumbnail, MediaError> {
        let stream = self.reference.OpenReadAsync()?.await?;
        let content_type = stream
            .ContentType()
            .map(|value| value.to_string())
            .unwrap_or_default();

        let size = u32::try_from(stream.Size()?)
            .map_err(|e| MediaError::operation("OpenReadAsync", e))?;
        if size == 0 {
            return Err(MediaError::operation("OpenReadAsync", "empty thumbnail stream"));
        }

        let buffer = Buffer::Create(size)?;
        let filled = stream
            .ReadAsync(&buffer, buffer.Capacity()?, InputStreamOptions::None)?
            .await?;

        let reader = DataReader::FromBuffer(&filled)?;
        let mut bytes = vec![0u8; filled.Length()? as usize];
        reader.ReadBytes(&mut bytes)?;

        Ok(RawThumbnail {
            bytes,
            content_type,
        })
    }
}
