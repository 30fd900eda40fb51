use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use crate::version::Version;

/// Meta version written by the encoder and the only major version the decoder understands.
pub const META_VERSION: Version = Version::new(1, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Device,
    Framework,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::Device => "device",
            SchemaType::Framework => "framework",
        }
    }

    pub fn from_attr(s: &str) -> Option<Self> {
        match s {
            "device" => Some(SchemaType::Device),
            "framework" => Some(SchemaType::Framework),
            _ => None,
        }
    }
}

impl Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A HAL manifest, as declared by either the device or the framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalManifest {
    pub meta_version: Version,
    pub schema: ManifestSchema,
    /// In document order.
    pub hals: Vec<ManifestHal>,
}

/// Schema specific parts of a manifest.
///
/// Only a device manifest has somewhere to keep a sepolicy version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSchema {
    Device(DeviceManifest),
    Framework,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceManifest {
    pub sepolicy_version: Option<Version>,
}

impl HalManifest {
    pub fn new(schema_type: SchemaType) -> Self {
        let schema = match schema_type {
            SchemaType::Device => ManifestSchema::Device(DeviceManifest::default()),
            SchemaType::Framework => ManifestSchema::Framework,
        };

        HalManifest {
            meta_version: META_VERSION,
            schema,
            hals: Vec::new(),
        }
    }

    pub fn schema_type(&self) -> SchemaType {
        match self.schema {
            ManifestSchema::Device(_) => SchemaType::Device,
            ManifestSchema::Framework => SchemaType::Framework,
        }
    }

    pub fn device(&self) -> Option<&DeviceManifest> {
        match &self.schema {
            ManifestSchema::Device(device) => Some(device),
            ManifestSchema::Framework => None,
        }
    }

    pub fn device_mut(&mut self) -> Option<&mut DeviceManifest> {
        match &mut self.schema {
            ManifestSchema::Device(device) => Some(device),
            ManifestSchema::Framework => None,
        }
    }

    pub fn sepolicy_version(&self) -> Option<Version> {
        self.device().and_then(|d| d.sepolicy_version)
    }

    pub fn hal(&self, name: &str) -> Option<&ManifestHal> {
        self.hals.iter().find(|hal| hal.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HalFormat {
    #[default]
    Hidl,
    Native,
}

impl HalFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HalFormat::Hidl => "hidl",
            HalFormat::Native => "native",
        }
    }

    pub fn from_attr(s: &str) -> Option<Self> {
        match s {
            "hidl" => Some(HalFormat::Hidl),
            "native" => Some(HalFormat::Native),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Hwbinder,
    Passthrough,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Hwbinder => "hwbinder",
            Transport::Passthrough => "passthrough",
        }
    }

    pub fn from_text(s: &str) -> Option<Self> {
        match s {
            "hwbinder" => Some(Transport::Hwbinder),
            "passthrough" => Some(Transport::Passthrough),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Arch32,
    Arch64,
    Arch32_64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Arch32 => "32",
            Arch::Arch64 => "64",
            Arch::Arch32_64 => "32+64",
        }
    }

    pub fn from_attr(s: &str) -> Option<Self> {
        match s {
            "32" => Some(Arch::Arch32),
            "64" => Some(Arch::Arch64),
            "32+64" => Some(Arch::Arch32_64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportArch {
    pub transport: Transport,
    /// Required for passthrough HALs, forbidden for hwbinder ones.
    pub arch: Option<Arch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHal {
    pub format: HalFormat,
    pub name: String,
    pub transport_arch: Option<TransportArch>,
    pub versions: Vec<Version>,
    /// Keyed by interface name.
    pub interfaces: BTreeMap<String, HalInterface>,
}

impl ManifestHal {
    pub fn new(format: HalFormat, name: impl Into<String>) -> Self {
        ManifestHal {
            format,
            name: name.into(),
            transport_arch: None,
            versions: Vec::new(),
            interfaces: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalInterface {
    pub name: String,
    pub instances: BTreeSet<String>,
}

impl HalInterface {
    pub fn new(name: impl Into<String>) -> Self {
        HalInterface {
            name: name.into(),
            instances: BTreeSet::new(),
        }
    }
}
