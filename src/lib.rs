//! Finalizes VINTF HAL manifest templates at build time.
//!
//! A manifest template is decoded, build-time flags that only the build system knows (currently
//! the device sepolicy version) are filled in, and the manifest is encoded again.
//!
//! ```
//! use std::collections::HashMap;
//! use vintf::{Assembler, SEPOLICY_VERSION_FLAG};
//!
//! let template = r#"<manifest version="1.0" type="device"></manifest>"#;
//! let mut flags = HashMap::new();
//! flags.insert(SEPOLICY_VERSION_FLAG.to_owned(), "30.0".to_owned());
//!
//! let mut out = Vec::new();
//! Assembler::new()
//!     .assemble(template.as_bytes(), &mut out, &flags)
//!     .unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("<version>30.0</version>"));
//! ```

pub mod assemble;
pub mod codec;
pub mod err;
pub mod flags;
pub mod manifest;
pub mod version;

pub use assemble::{AssembleSettings, Assembler, SEPOLICY_VERSION_FLAG};
pub use codec::{ManifestCodec, XmlManifestCodec};
pub use err::AssembleError;
pub use flags::{BuildFlags, EnvFlags};
pub use manifest::{HalManifest, ManifestError, SchemaType};
pub use version::Version;
