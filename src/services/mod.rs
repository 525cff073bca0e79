/// Shared building blocks for services
pub mod common;
/// OS media session tracking service
pub mod media;

pub use media::{MediaError, MediaService, Update};
