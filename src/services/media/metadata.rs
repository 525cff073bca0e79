use std::{io::Cursor, sync::Arc, time::Duration};

use image::ImageFormat;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{
    MediaError,
    backend::{MediaSession, RawThumbnail, Thumbnail},
};
use crate::config::MediaConfig;

/// MIME tag attached to every normalized thumbnail
pub const ART_MIME_TYPE: &str = "image/png";

const ID_DELIMITER: &str = ":";

/// Decoded thumbnail of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtData {
    /// PNG encoded image
    pub data: Vec<u8>,
    /// MIME tags of `data`
    pub mime_types: Vec<String>,
}

/// Normalized metadata of the current track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Content derived identifier, empty when every text field is empty
    pub id: String,
    /// Track title
    pub title: String,
    /// Primary artist
    pub artist: String,
    /// All artists
    pub artists: Vec<String>,
    /// Album title
    pub album: String,
    /// Primary album artist
    pub album_artist: String,
    /// All album artists
    pub album_artists: Vec<String>,
    /// Track length in seconds
    pub length: f64,
    /// Thumbnail, absent when the track has none or it could not be read
    pub art_data: Option<ArtData>,
}

/// Compute the content derived identifier of a track.
///
/// The text fields are joined with `:` and hashed with MD5 into lowercase
/// hex. With `hash` disabled the joined text is returned as is. Length is
/// not part of the input, so the same recording with a different duration
/// keeps its id.
pub fn track_id(album_artist: &str, artist: &str, album: &str, title: &str, hash: bool) -> String {
    let fields = [album_artist, artist, album, title];
    if fields.iter().all(|field| field.is_empty()) {
        return String::new();
    }

    let joined = fields.join(ID_DELIMITER);
    if !hash {
        return joined;
    }

    hex::encode(Md5::digest(joined.as_bytes()))
}

/// Reads and normalizes track metadata from a session.
#[derive(Debug, Clone, Copy)]
pub struct MetadataFetcher {
    thumbnail_timeout: Duration,
    hash_ids: bool,
}

impl MetadataFetcher {
    /// Create a fetcher from the media configuration
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            thumbnail_timeout: config.thumbnail_timeout(),
            hash_ids: config.hash_track_ids,
        }
    }

    /// Fetch the current track of `session`.
    ///
    /// Returns `None` when the track properties cannot be read. A thumbnail
    /// that times out or fails to decode only drops the art data.
    #[instrument(skip_all, fields(app_id = %session.app_id()))]
    pub async fn fetch(&self, session: &dyn MediaSession) -> Option<Metadata> {
        let length = session
            .timeline()
            .map_or(0.0, |timeline| timeline.length().as_secs_f64());

        let track = match session.track_properties().await {
            Ok(track) => track,
            Err(e) => {
                warn!(error = %e, "Failed to read track properties");
                return None;
            }
        };

        let art_data = match &track.thumbnail {
            Some(thumbnail) => self.load_art(Arc::clone(thumbnail)).await,
            None => None,
        };

        let id = track_id(
            &track.album_artist,
            &track.artist,
            &track.album,
            &track.title,
            self.hash_ids,
        );

        let artists = mirror(&track.artist, track.artists);
        let album_artists = mirror(&track.album_artist, track.album_artists);

        Some(Metadata {
            id,
            title: track.title,
            artist: track.artist,
            artists,
            album: track.album,
            album_artist: track.album_artist,
            album_artists,
            length,
            art_data,
        })
    }

    async fn load_art(&self, thumbnail: Arc<dyn Thumbnail>) -> Option<ArtData> {
        let raw = match tokio::time::timeout(self.thumbnail_timeout, thumbnail.open()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read thumbnail");
                return None;
            }
            Err(_) => {
                warn!(
                    error = %MediaError::ThumbnailTimeout(self.thumbnail_timeout),
                    "Dropping thumbnail"
                );
                return None;
            }
        };

        match normalize(raw).await {
            Ok(data) => Some(ArtData {
                data,
                mime_types: vec![ART_MIME_TYPE.to_string()],
            }),
            Err(e) => {
                warn!(error = %e, "Failed to decode thumbnail");
                None
            }
        }
    }
}

fn mirror(single: &str, list: Vec<String>) -> Vec<String> {
    if list.is_empty() {
        vec![single.to_string()]
    } else {
        list
    }
}

async fn normalize(raw: RawThumbnail) -> Result<Vec<u8>, MediaError> {
    debug!(
        bytes = raw.bytes.len(),
        content_type = %raw.content_type,
        "Normalizing thumbnail"
    );

    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&raw.bytes)
            .map_err(|e| MediaError::ThumbnailDecode(e.to_string()))?;

        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| MediaError::ThumbnailDecode(e.to_string()))?;

        Ok(encoded.into_inner())
    })
    .await
    .map_err(|e| MediaError::ThumbnailDecode(e.to_string()))?
}
