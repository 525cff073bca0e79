//! nowplaying - OS media session tracking.
//!
//! Follows the media sessions the operating system exposes (the Global
//! System Media Transport Controls on Windows, MPRIS players on Linux),
//! elects one of them as the active session and hands out normalized
//! snapshots of it together with playback controls.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nowplaying::{config::Config, services::MediaService};
//!
//! # async fn run() -> nowplaying::Result<()> {
//! let config = Config::load()?;
//! let service = MediaService::start_native(config.media).await?;
//!
//! service.set_notify_callback(|| println!("media changed"));
//! if let Some(update) = service.get_update().await {
//!     println!("{} is {}", update.app_name, update.status);
//! }
//! # Ok(())
//! # }
//! ```

/// Configuration schema definitions and loading.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Media session services.
pub mod services;

/// Tracing subscriber setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use crate::core::{NowPlayingError, Result};
