use thiserror::Error;

use crate::version::VersionParseError;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("document is not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("malformed XML at position {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document ended inside <{element}>")]
    UnexpectedEof { element: String },

    #[error("document has no root element")]
    MissingRoot,

    #[error("unexpected content after the root element: <{element}>")]
    TrailingElement { element: String },

    #[error("root element must be <manifest>, found <{found}>")]
    UnexpectedRoot { found: String },

    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> has unknown attribute `{attribute}`")]
    UnknownAttribute {
        element: &'static str,
        attribute: String,
    },

    #[error("<{element}> has invalid `{attribute}` value `{value}`")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("<{parent}> may not contain <{element}>")]
    UnknownElement {
        parent: &'static str,
        element: String,
    },

    #[error("<{parent}> may not contain text `{text}`")]
    UnexpectedText { parent: &'static str, text: String },

    #[error("<{parent}> is missing required <{element}>")]
    MissingElement {
        parent: &'static str,
        element: &'static str,
    },

    #[error("<{parent}> may contain at most one <{element}>")]
    DuplicateElement {
        parent: &'static str,
        element: &'static str,
    },

    #[error("<{element}> has invalid value `{value}`")]
    InvalidValue {
        element: &'static str,
        value: String,
    },

    #[error("invalid version in <{element}>: {source}")]
    InvalidVersion {
        element: &'static str,
        #[source]
        source: VersionParseError,
    },

    #[error("unsupported manifest meta version {version}, expected major version {expected}")]
    UnsupportedMetaVersion { version: String, expected: usize },

    #[error("<sepolicy> is only allowed in device manifests")]
    SepolicyInFramework,

    #[error("HAL `{hal}`: {reason}")]
    InvalidHal { hal: String, reason: String },

    #[error("HAL `{hal}` declares interface `{interface}` more than once")]
    DuplicateInterface { hal: String, interface: String },

    #[error("encoded manifest is not valid UTF-8: {source}")]
    EncodedInvalidUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("failed to write manifest: {source}")]
    Write {
        #[source]
        source: quick_xml::Error,
    },
}

pub(crate) type Result<T> = std::result::Result<T, ManifestError>;
