use std::time::Duration;

use super::AppId;

/// Errors that can occur during media operations
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// Failed to initialize the media service or its backend
    #[error("Failed to initialize media service: {0}")]
    InitializationFailed(String),

    /// A backend call failed
    #[error("{operation} failed: {reason}")]
    OperationFailed {
        /// Name of the failed operation
        operation: &'static str,
        /// What went wrong
        reason: String,
    },

    /// Session with the given app id is not tracked
    #[error("Session {0} not found")]
    SessionNotFound(AppId),

    /// Thumbnail did not open within the configured wait
    #[error("Thumbnail read timed out after {0:?}")]
    ThumbnailTimeout(Duration),

    /// Thumbnail bytes could not be decoded as an image
    #[error("Thumbnail decode failed: {0}")]
    ThumbnailDecode(String),

    /// No native backend exists for this platform
    #[error("Media sessions are not supported on this platform")]
    Unsupported,

    /// D-Bus communication error
    #[cfg(target_os = "linux")]
    #[error("D-Bus operation failed: {0}")]
    Dbus(#[from] zbus::Error),

    /// Windows runtime error
    #[cfg(windows)]
    #[error("Windows runtime call failed: {0}")]
    Windows(#[from] windows::core::Error),
}

impl MediaError {
    pub(crate) fn operation(operation: &'static str, reason: impl ToString) -> Self {
        Self::OperationFailed {
            operation,
            reason: reason.to_string(),
        }
    }
}
