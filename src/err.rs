use std::io;

use thiserror::Error;

use crate::version::VersionParseError;

pub type Result<T> = std::result::Result<T, AssembleError>;

/// Everything that can stop a manifest from being assembled.
///
/// The `Display` of each variant is the single diagnostic line printed by `assemble_vintf`.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Failed to read input manifest: {source}")]
    Read {
        #[source]
        source: io::Error,
    },

    #[error("Illformed HAL manifest: {source}")]
    IllformedManifest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Required {key} flag.")]
    MissingFlag { key: String },

    #[error("Cannot parse {value}.")]
    UnparsableFlag {
        value: String,
        #[source]
        source: VersionParseError,
    },

    #[error("Failed to encode HAL manifest: {source}")]
    Encode {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write output manifest: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
}
