//! HAL manifests: the in-memory model and its XML form.
//!
//! This module is split into:
//! - `types`: the typed view of a manifest (schema type, HALs, device section)
//! - `parse`: XML -> [`HalManifest`], rejecting anything outside the manifest schema
//! - `render`: [`HalManifest`] -> canonical XML
//! - `error`: what can go wrong while doing either

mod error;
mod parse;
mod render;
mod types;

pub use error::ManifestError;
pub use types::*;
