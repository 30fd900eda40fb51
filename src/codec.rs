use crate::manifest::{HalManifest, ManifestError};

/// Converts between a manifest document and a [`HalManifest`].
///
/// `decode` is all-or-nothing: a document that fails any check yields an error and no manifest.
pub trait ManifestCodec {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(&self, document: &[u8]) -> Result<HalManifest, Self::Error>;
    fn encode(&self, manifest: &HalManifest) -> Result<String, Self::Error>;
}

/// The XML manifest format.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlManifestCodec;

impl ManifestCodec for XmlManifestCodec {
    type Error = ManifestError;

    fn decode(&self, document: &[u8]) -> Result<HalManifest, ManifestError> {
        HalManifest::from_xml_bytes(document)
    }

    fn encode(&self, manifest: &HalManifest) -> Result<String, ManifestError> {
        manifest.to_xml()
    }
}
