use std::{collections::HashMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use zbus::zvariant::{Array, OwnedObjectPath, OwnedValue};

use crate::services::media::{
    MediaError,
    backend::{RawThumbnail, Thumbnail},
};

/// Track fields read from an MPRIS metadata map
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct TrackInfo {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub album_artists: Vec<String>,
    pub art_url: Option<String>,
    pub length: Option<Duration>,
    pub track_id: Option<OwnedObjectPath>,
}

impl TrackInfo {
    fn extract_string(value: &OwnedValue) -> Option<String> {
        if let Ok(s) = String::try_from(value.clone()) {
            return Some(s);
        }
        if let Ok(s) = value.downcast_ref::<String>() {
            return Some(s.to_string());
        }
        if let Ok(s) = value.downcast_ref::<&str>() {
            return Some(s.to_string());
        }
        None
    }

    fn extract_string_list(value: &OwnedValue) -> Vec<String> {
        if let Ok(array) = <&Array>::try_from(value) {
            return array
                .iter()
                .filter_map(|item| {
                    item.downcast_ref::<String>()
                        .or_else(|_| item.downcast_ref::<&str>().map(|s| s.to_string()))
                        .ok()
                })
                .collect();
        }

        Self::extract_string(value).into_iter().collect()
    }

    fn extract_duration(value: &OwnedValue) -> Option<Duration> {
        if let Ok(length) = i64::try_from(value.clone()) {
            return u64::try_from(length).ok().map(Duration::from_micros);
        }

        u64::try_from(value.clone()).ok().map(Duration::from_micros)
    }

    fn extract_track_id(value: &OwnedValue) -> Option<OwnedObjectPath> {
        if let Ok(path) = OwnedObjectPath::try_from(value.clone()) {
            return Some(path);
        }

        Self::extract_string(value).and_then(|s| OwnedObjectPath::try_from(s).ok())
    }
}

impl From<&HashMap<String, OwnedValue>> for TrackInfo {
    fn from(metadata: &HashMap<String, OwnedValue>) -> Self {
        Self {
            title: metadata
                .get("xesam:title")
                .and_then(Self::extract_string)
                .unwrap_or_default(),
            artists: metadata
                .get("xesam:artist")
                .map(Self::extract_string_list)
                .unwrap_or_default(),
            album: metadata
                .get("xesam:album")
                .and_then(Self::extract_string)
                .unwrap_or_default(),
            album_artists: metadata
                .get("xesam:albumArtist")
                .map(Self::extract_string_list)
                .unwrap_or_default(),
            art_url: metadata.get("mpris:artUrl").and_then(Self::extract_string),
            length: metadata
                .get("mpris:length")
                .and_then(Self::extract_duration),
            track_id: metadata
                .get("mpris:trackid")
                .and_then(Self::extract_track_id),
        }
    }
}

/// Art referenced by a `file://` URL
pub(super) struct FileThumbnail {
    path: PathBuf,
}

impl FileThumbnail {
    /// Only local files are readable, other schemes yield `None`.
    pub(super) fn from_url(url: &str) -> Option<Self> {
        let encoded = url.strip_prefix("file://")?;
        Some(Self {
            path: PathBuf::from(percent_decode(encoded)?),
        })
    }
}

#[async_trait]
impl Thumbnail for FileThumbnail {
    async fn open(&self) -> Result<RawThumbnail, MediaError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| MediaError::operation("read art file", e))?;

        Ok(RawThumbnail {
            bytes,
            content_type: String::new(),
        })
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_is_decoded() {
        let thumbnail = FileThumbnail::from_url("file:///tmp/My%20Album/cover.jpg");
        assert_eq!(
            thumbnail.map(|t| t.path),
            Some(PathBuf::from("/tmp/My Album/cover.jpg"))
        );
    }

    #[test]
    fn remote_art_is_skipped() {
        assert!(FileThumbnail::from_url("https://example.org/cover.jpg").is_none());
    }

    #[test]
    fn broken_escape_is_rejected() {
        assert!(FileThumbnail::from_url("file:///tmp/cover%2").is_none());
    }
}
