//! Playable stream resolution
//!
//! Turns an item identifier into a [`StreamManifest`] by walking the
//! provider fallback chain.

pub mod manifest;
pub mod resolver;

pub use manifest::{Quality, StreamManifest};
pub use resolver::StreamResolver;
