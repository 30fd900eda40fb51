use std::io::{Read, Write};

use log::{debug, info};

use crate::codec::{ManifestCodec, XmlManifestCodec};
use crate::err::{AssembleError, Result};
use crate::flags::BuildFlags;
use crate::manifest::{HalManifest, SchemaType};
use crate::version::Version;

/// Flag holding the sepolicy version of the board being built.
pub const SEPOLICY_VERSION_FLAG: &str = "BOARD_SEPOLICY_VERS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleSettings {
    /// Name of the flag that supplies the device sepolicy version.
    sepolicy_flag: String,
}

impl Default for AssembleSettings {
    fn default() -> Self {
        AssembleSettings {
            sepolicy_flag: SEPOLICY_VERSION_FLAG.to_owned(),
        }
    }
}

impl AssembleSettings {
    pub fn new() -> Self {
        AssembleSettings::default()
    }

    pub fn sepolicy_flag(mut self, key: impl Into<String>) -> Self {
        self.sepolicy_flag = key.into();
        self
    }

    pub fn get_sepolicy_flag(&self) -> &str {
        &self.sepolicy_flag
    }
}

/// Fills build-time flags into a manifest template.
#[derive(Debug, Clone, Default)]
pub struct Assembler<C = XmlManifestCodec> {
    codec: C,
    settings: AssembleSettings,
}

impl Assembler<XmlManifestCodec> {
    pub fn new() -> Self {
        Assembler::default()
    }
}

impl<C: ManifestCodec> Assembler<C> {
    pub fn with_codec(codec: C) -> Self {
        Assembler {
            codec,
            settings: AssembleSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AssembleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AssembleSettings {
        &self.settings
    }

    /// Reads the whole of `input`, fills in build flags and writes the result to `output`.
    ///
    /// `output` is only written to once everything else has succeeded, so a failed run leaves
    /// it untouched.
    pub fn assemble<R: Read, W: Write>(
        &self,
        mut input: R,
        mut output: W,
        flags: &impl BuildFlags,
    ) -> Result<()> {
        let mut document = Vec::new();
        input
            .read_to_end(&mut document)
            .map_err(|source| AssembleError::Read { source })?;
        debug!("read {} bytes of manifest", document.len());

        let mut manifest = self
            .codec
            .decode(&document)
            .map_err(|e| AssembleError::IllformedManifest {
                source: Box::new(e),
            })?;

        self.fill_flags(&mut manifest, flags)?;

        let encoded = self
            .codec
            .encode(&manifest)
            .map_err(|e| AssembleError::Encode {
                source: Box::new(e),
            })?;

        output
            .write_all(encoded.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|source| AssembleError::Write { source })?;

        Ok(())
    }

    /// Overwrites the build-time fields of `manifest`. Only device manifests have any, so
    /// `flags` is not consulted for anything else.
    pub fn fill_flags(&self, manifest: &mut HalManifest, flags: &impl BuildFlags) -> Result<()> {
        if manifest.schema_type() != SchemaType::Device {
            debug!("{} manifest, no flags to fill", manifest.schema_type());
            return Ok(());
        }

        let version = self.sepolicy_version(flags)?;

        if let Some(device) = manifest.device_mut() {
            if let Some(previous) = device.sepolicy_version.replace(version) {
                if previous != version {
                    info!("replacing sepolicy version {} with {}", previous, version);
                }
            }
        }

        Ok(())
    }

    fn sepolicy_version(&self, flags: &impl BuildFlags) -> Result<Version> {
        let key = self.settings.get_sepolicy_flag();
        let value = flags
            .lookup(key)
            .ok_or_else(|| AssembleError::MissingFlag {
                key: key.to_owned(),
            })?;

        value
            .parse()
            .map_err(|source| AssembleError::UnparsableFlag { value, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{HalFormat, ManifestHal};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("fake codec: {0}")]
    struct FakeError(&'static str);

    /// Hands out a prepared manifest and records what it is asked to encode.
    struct FakeCodec {
        decoded: Option<HalManifest>,
        encoded: RefCell<Option<HalManifest>>,
    }

    impl FakeCodec {
        fn returning(manifest: HalManifest) -> Self {
            FakeCodec {
                decoded: Some(manifest),
                encoded: RefCell::new(None),
            }
        }

        fn failing() -> Self {
            FakeCodec {
                decoded: None,
                encoded: RefCell::new(None),
            }
        }
    }

    impl ManifestCodec for FakeCodec {
        type Error = FakeError;

        fn decode(&self, _document: &[u8]) -> std::result::Result<HalManifest, FakeError> {
            self.decoded.clone().ok_or(FakeError("unterminated tag"))
        }

        fn encode(&self, manifest: &HalManifest) -> std::result::Result<String, FakeError> {
            *self.encoded.borrow_mut() = Some(manifest.clone());
            Ok(format!("{:?}", manifest.sepolicy_version()))
        }
    }

    /// Counts lookups, so tests can assert the flags were never consulted.
    #[derive(Default)]
    struct CountingFlags {
        values: HashMap<String, String>,
        lookups: Cell<usize>,
    }

    impl CountingFlags {
        fn with(key: &str, value: &str) -> Self {
            let mut flags = CountingFlags::default();
            flags.values.insert(key.to_owned(), value.to_owned());
            flags
        }
    }

    impl BuildFlags for CountingFlags {
        fn lookup(&self, key: &str) -> Option<String> {
            self.lookups.set(self.lookups.get() + 1);
            self.values.get(key).cloned()
        }
    }

    fn device_with_version(version: Option<Version>) -> HalManifest {
        let mut manifest = HalManifest::new(SchemaType::Device);
        let mut hal = ManifestHal::new(HalFormat::Native, "vendor.sensors");
        hal.versions.push(Version::new(1, 0));
        manifest.hals.push(hal);
        manifest.device_mut().unwrap().sepolicy_version = version;
        manifest
    }

    /// A writer that fails the test if anything reaches it.
    struct UntouchedOutput;

    impl Write for UntouchedOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            panic!("output written on a failing path");
        }

        fn flush(&mut self) -> io::Result<()> {
            panic!("output flushed on a failing path");
        }
    }

    #[test]
    fn test_framework_manifest_ignores_flags() {
        let manifest = HalManifest::new(SchemaType::Framework);
        let assembler = Assembler::with_codec(FakeCodec::returning(manifest.clone()));
        let flags = CountingFlags::default();

        let mut out = Vec::new();
        assembler.assemble(&b""[..], &mut out, &flags).unwrap();

        assert_eq!(flags.lookups.get(), 0);
        assert_eq!(assembler.codec.encoded.borrow().as_ref(), Some(&manifest));
    }

    #[test]
    fn test_device_manifest_version_is_overwritten() {
        let assembler = Assembler::with_codec(FakeCodec::returning(device_with_version(Some(
            Version::new(25, 0),
        ))));
        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "30.0");

        let mut out = Vec::new();
        assembler.assemble(&b""[..], &mut out, &flags).unwrap();

        assert_eq!(flags.lookups.get(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Some(Version { major: 30, minor: 0 })");

        let encoded = assembler.codec.encoded.borrow();
        let encoded = encoded.as_ref().unwrap();
        assert_eq!(encoded.sepolicy_version(), Some(Version::new(30, 0)));
        assert_eq!(encoded.hals, device_with_version(None).hals);
    }

    #[test]
    fn test_device_manifest_without_version_gets_one() {
        let mut manifest = device_with_version(None);
        let assembler = Assembler::new();
        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "27.0");

        assembler.fill_flags(&mut manifest, &flags).unwrap();
        assert_eq!(manifest.sepolicy_version(), Some(Version::new(27, 0)));
    }

    #[test]
    fn test_missing_flag_fails_without_output() {
        let assembler = Assembler::with_codec(FakeCodec::returning(device_with_version(None)));
        let flags = CountingFlags::default();

        let err = assembler
            .assemble(&b""[..], UntouchedOutput, &flags)
            .unwrap_err();

        assert!(matches!(err, AssembleError::MissingFlag { ref key } if key == SEPOLICY_VERSION_FLAG));
        assert_eq!(err.to_string(), "Required BOARD_SEPOLICY_VERS flag.");
        assert!(assembler.codec.encoded.borrow().is_none());
    }

    #[test]
    fn test_unparsable_flag_fails_without_output() {
        let assembler = Assembler::with_codec(FakeCodec::returning(device_with_version(None)));
        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "not-a-version");

        let err = assembler
            .assemble(&b""[..], UntouchedOutput, &flags)
            .unwrap_err();

        assert_eq!(err.to_string(), "Cannot parse not-a-version.");
    }

    #[test]
    fn test_decode_failure_reports_codec_message() {
        let assembler = Assembler::with_codec(FakeCodec::failing());
        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "30.0");

        let err = assembler
            .assemble(&b"<manifest"[..], UntouchedOutput, &flags)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Illformed HAL manifest: fake codec: unterminated tag"
        );
        assert_eq!(flags.lookups.get(), 0);
    }

    #[test]
    fn test_custom_flag_name() {
        let settings = AssembleSettings::new().sepolicy_flag("VENDOR_SEPOLICY_VERS");
        let assembler = Assembler::with_codec(FakeCodec::returning(device_with_version(None)))
            .with_settings(settings);

        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "30.0");
        let err = assembler
            .assemble(&b""[..], UntouchedOutput, &flags)
            .unwrap_err();
        assert_eq!(err.to_string(), "Required VENDOR_SEPOLICY_VERS flag.");
    }

    #[test]
    fn test_read_failure() {
        struct BrokenInput;

        impl Read for BrokenInput {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let assembler = Assembler::new();
        let err = assembler
            .assemble(BrokenInput, UntouchedOutput, &HashMap::<String, String>::new())
            .unwrap_err();

        assert!(matches!(err, AssembleError::Read { .. }));
    }

    #[test]
    fn test_write_failure() {
        struct FullDisk;

        impl Write for FullDisk {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let template = r#"<manifest version="1.0" type="device"></manifest>"#;
        let flags = CountingFlags::with(SEPOLICY_VERSION_FLAG, "30.0");

        let err = Assembler::new()
            .assemble(template.as_bytes(), FullDisk, &flags)
            .unwrap_err();

        assert!(matches!(err, AssembleError::Write { .. }));
        assert_eq!(err.to_string(), "Failed to write output manifest: disk full");
    }
}
