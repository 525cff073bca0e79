use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default bound on opening and reading a session thumbnail.
pub const DEFAULT_THUMBNAIL_TIMEOUT_MS: u64 = 5_000;

/// Media service configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MediaConfig {
    /// App id patterns to ignore during session enumeration.
    ///
    /// A session is skipped when its app id contains any of the patterns,
    /// so `"spotify"` also matches `com.spotify.Client`. Use the full app id
    /// to ignore exactly one application.
    pub ignored_apps: Vec<String>,

    /// Upper bound, in milliseconds, for opening and reading a thumbnail.
    pub thumbnail_timeout_ms: u64,

    /// Whether track ids are emitted as an MD5 digest instead of the raw
    /// joined text fields.
    pub hash_track_ids: bool,
}

impl MediaConfig {
    /// Thumbnail timeout as a [`Duration`].
    pub fn thumbnail_timeout(&self) -> Duration {
        Duration::from_millis(self.thumbnail_timeout_ms)
    }

    /// Whether an app id matches one of the ignored patterns.
    pub fn is_ignored(&self, app_id: &str) -> bool {
        self.ignored_apps
            .iter()
            .any(|pattern| !pattern.is_empty() && app_id.contains(pattern.as_str()))
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ignored_apps: Vec::new(),
            thumbnail_timeout_ms: DEFAULT_THUMBNAIL_TIMEOUT_MS,
            hash_track_ids: true,
        }
    }
}
