//! OS media session tracking.
//!
//! Follows every media session the host's session manager exposes, elects
//! one of them as active and composes [`Update`] snapshots of it on demand.

/// Session manager backends
pub mod backend;
/// Capability derivation from control flags
pub mod capabilities;
mod error;
/// Track metadata normalization
pub mod metadata;
mod notifier;
/// Playback position extrapolation
pub mod position;
mod registry;
/// Active session election
pub mod selector;
mod service;
mod types;
mod update;

#[cfg(test)]
mod tests;

pub use error::MediaError;
pub use metadata::{ArtData, Metadata, MetadataFetcher};
pub use notifier::{EventNotifier, NotifyCallback};
pub use service::MediaService;
pub use types::*;
pub use update::{Update, fallback_display_name};

/// Volume reported for every session, hardware volume is not exposed
pub const VOLUME_UNSUPPORTED: f64 = -1.0;
