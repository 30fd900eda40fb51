//! XML decoding for HAL manifests.
//!
//! Decoding happens in two passes: `quick-xml` events are first folded into a small element
//! tree (so well-formedness errors are reported before any schema check), and the tree is then
//! validated and converted into a [`HalManifest`]. Any violation aborts the whole decode.

use std::borrow::Cow;
use std::collections::BTreeMap;

use log::{debug, trace};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::error::{ManifestError, Result};
use super::types::*;
use crate::version::Version;

#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required_attribute(&self, element: &'static str, attribute: &'static str) -> Result<&str> {
        self.attribute(attribute)
            .ok_or(ManifestError::MissingAttribute { element, attribute })
    }

    fn check_attributes(&self, element: &'static str, allowed: &[&str]) -> Result<()> {
        match self
            .attributes
            .iter()
            .find(|(key, _)| !allowed.contains(&key.as_str()))
        {
            Some((key, _)) => Err(ManifestError::UnknownAttribute {
                element,
                attribute: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Containers hold elements only.
    fn check_no_text(&self, element: &'static str) -> Result<()> {
        if self.text.trim().is_empty() {
            Ok(())
        } else {
            Err(ManifestError::UnexpectedText {
                parent: element,
                text: self.text.trim().to_owned(),
            })
        }
    }

    /// Leaves hold text only, returned trimmed.
    fn leaf_text(&self, element: &'static str) -> Result<&str> {
        if let Some(child) = self.children.first() {
            return Err(ManifestError::UnknownElement {
                parent: element,
                element: child.name.clone(),
            });
        }
        self.check_attributes(element, &[])?;
        Ok(self.text.trim())
    }

    fn leaf_version(&self, element: &'static str) -> Result<Version> {
        self.leaf_text(element)?
            .parse()
            .map_err(|source| ManifestError::InvalidVersion { element, source })
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    parent: &'static str,
    element: &'static str,
) -> Result<()> {
    if slot.is_some() {
        return Err(ManifestError::DuplicateElement { parent, element });
    }
    *slot = Some(value);
    Ok(())
}

fn xml_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> ManifestError {
    ManifestError::Xml {
        position: reader.buffer_position(),
        source,
    }
}

fn utf8_name(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|source| ManifestError::InvalidUtf8 { source })
}

fn open_node(reader: &Reader<&[u8]>, start: &BytesStart) -> Result<Node> {
    let mut node = Node {
        name: utf8_name(start.name().as_ref())?,
        ..Node::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| xml_error(reader, e.into()))?;
        let key = utf8_name(attribute.key.as_ref())?;
        let value = attribute
            .unescape_value()
            .map_err(|e| xml_error(reader, e))?;
        node.attributes.push((key, value.into_owned()));
    }

    Ok(node)
}

/// Folds the document into a tree, checking only well-formedness.
fn read_tree(text: &str) -> Result<Node> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;

        let finished = match event {
            Event::Start(start) => {
                stack.push(open_node(&reader, &start)?);
                None
            }
            Event::Empty(start) => Some(open_node(&reader, &start)?),
            // `quick-xml` checks that end names match their start.
            Event::End(_) => stack.pop(),
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| xml_error(&reader, e))?;
                push_text(&mut stack, text)?;
                None
            }
            Event::CData(cdata) => {
                let text = std::str::from_utf8(&cdata)
                    .map_err(|source| ManifestError::InvalidUtf8 { source })?;
                push_text(&mut stack, Cow::Borrowed(text))?;
                None
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(ManifestError::UnexpectedEof {
                        element: open.name.clone(),
                    });
                }
                break;
            }
            // Declarations, comments and processing instructions carry nothing.
            _ => None,
        };

        if let Some(node) = finished {
            trace!("closed <{}>", node.name);
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None if root.is_some() => {
                    return Err(ManifestError::TrailingElement { element: node.name });
                }
                None => root = Some(node),
            }
        }
    }

    root.ok_or(ManifestError::MissingRoot)
}

fn push_text(stack: &mut [Node], text: Cow<str>) -> Result<()> {
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(&text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(ManifestError::UnexpectedText {
            parent: "document",
            text: text.trim().to_owned(),
        }),
    }
}

fn parse_manifest(root: &Node) -> Result<HalManifest> {
    if root.name != "manifest" {
        return Err(ManifestError::UnexpectedRoot {
            found: root.name.clone(),
        });
    }
    root.check_attributes("manifest", &["version", "type"])?;
    root.check_no_text("manifest")?;

    let version_attr = root.required_attribute("manifest", "version")?;
    let meta_version: Version =
        version_attr
            .parse()
            .map_err(|_| ManifestError::InvalidAttribute {
                element: "manifest",
                attribute: "version",
                value: version_attr.to_owned(),
            })?;
    if meta_version.major != META_VERSION.major {
        return Err(ManifestError::UnsupportedMetaVersion {
            version: meta_version.to_string(),
            expected: META_VERSION.major,
        });
    }

    let type_attr = root.required_attribute("manifest", "type")?;
    let schema_type =
        SchemaType::from_attr(type_attr).ok_or_else(|| ManifestError::InvalidAttribute {
            element: "manifest",
            attribute: "type",
            value: type_attr.to_owned(),
        })?;

    let mut manifest = HalManifest::new(schema_type);
    manifest.meta_version = meta_version;

    let mut sepolicy = None;
    for child in &root.children {
        match child.name.as_str() {
            "hal" => manifest.hals.push(parse_hal(child)?),
            "sepolicy" => {
                if schema_type != SchemaType::Device {
                    return Err(ManifestError::SepolicyInFramework);
                }
                set_once(&mut sepolicy, parse_sepolicy(child)?, "manifest", "sepolicy")?;
            }
            other => {
                return Err(ManifestError::UnknownElement {
                    parent: "manifest",
                    element: other.to_owned(),
                });
            }
        }
    }

    if let Some(device) = manifest.device_mut() {
        device.sepolicy_version = sepolicy;
    }

    debug!(
        "decoded {} manifest with {} HAL(s)",
        manifest.schema_type(),
        manifest.hals.len()
    );
    Ok(manifest)
}

fn parse_sepolicy(node: &Node) -> Result<Version> {
    node.check_attributes("sepolicy", &[])?;
    node.check_no_text("sepolicy")?;

    let mut version = None;
    for child in &node.children {
        match child.name.as_str() {
            "version" => set_once(
                &mut version,
                child.leaf_version("version")?,
                "sepolicy",
                "version",
            )?,
            other => {
                return Err(ManifestError::UnknownElement {
                    parent: "sepolicy",
                    element: other.to_owned(),
                });
            }
        }
    }

    version.ok_or(ManifestError::MissingElement {
        parent: "sepolicy",
        element: "version",
    })
}

fn parse_transport(node: &Node) -> Result<TransportArch> {
    if let Some(child) = node.children.first() {
        return Err(ManifestError::UnknownElement {
            parent: "transport",
            element: child.name.clone(),
        });
    }
    node.check_attributes("transport", &["arch"])?;

    let text = node.text.trim();
    let transport = Transport::from_text(text).ok_or_else(|| ManifestError::InvalidValue {
        element: "transport",
        value: text.to_owned(),
    })?;

    let arch = match node.attribute("arch") {
        Some(value) => Some(Arch::from_attr(value).ok_or_else(|| {
            ManifestError::InvalidAttribute {
                element: "transport",
                attribute: "arch",
                value: value.to_owned(),
            }
        })?),
        None => None,
    };

    Ok(TransportArch { transport, arch })
}

fn parse_interface(node: &Node) -> Result<HalInterface> {
    node.check_attributes("interface", &[])?;
    node.check_no_text("interface")?;

    let mut name = None;
    let mut instances = Vec::new();
    for child in &node.children {
        match child.name.as_str() {
            "name" => set_once(&mut name, child.leaf_text("name")?, "interface", "name")?,
            "instance" => {
                let instance = child.leaf_text("instance")?;
                if instance.is_empty() {
                    return Err(ManifestError::InvalidValue {
                        element: "instance",
                        value: instance.to_owned(),
                    });
                }
                instances.push(instance);
            }
            other => {
                return Err(ManifestError::UnknownElement {
                    parent: "interface",
                    element: other.to_owned(),
                });
            }
        }
    }

    let name = name.ok_or(ManifestError::MissingElement {
        parent: "interface",
        element: "name",
    })?;
    if name.is_empty() {
        return Err(ManifestError::InvalidValue {
            element: "name",
            value: String::new(),
        });
    }

    let mut interface = HalInterface::new(name);
    interface
        .instances
        .extend(instances.into_iter().map(str::to_owned));
    Ok(interface)
}

fn parse_hal(node: &Node) -> Result<ManifestHal> {
    node.check_attributes("hal", &["format"])?;
    node.check_no_text("hal")?;

    let format = match node.attribute("format") {
        Some(value) => {
            HalFormat::from_attr(value).ok_or_else(|| ManifestError::InvalidAttribute {
                element: "hal",
                attribute: "format",
                value: value.to_owned(),
            })?
        }
        None => HalFormat::default(),
    };

    let mut name = None;
    let mut transport_arch = None;
    let mut versions = Vec::new();
    let mut interfaces = Vec::new();

    for child in &node.children {
        match child.name.as_str() {
            "name" => set_once(&mut name, child.leaf_text("name")?, "hal", "name")?,
            "transport" => set_once(
                &mut transport_arch,
                parse_transport(child)?,
                "hal",
                "transport",
            )?,
            "version" => versions.push(child.leaf_version("version")?),
            "interface" => interfaces.push(parse_interface(child)?),
            other => {
                return Err(ManifestError::UnknownElement {
                    parent: "hal",
                    element: other.to_owned(),
                });
            }
        }
    }

    let name = name.ok_or(ManifestError::MissingElement {
        parent: "hal",
        element: "name",
    })?;
    if name.is_empty() {
        return Err(ManifestError::InvalidValue {
            element: "name",
            value: String::new(),
        });
    }

    let mut hal = ManifestHal::new(format, name);
    hal.transport_arch = transport_arch;
    hal.versions = versions;

    let mut by_name = BTreeMap::new();
    for interface in interfaces {
        if by_name.contains_key(&interface.name) {
            return Err(ManifestError::DuplicateInterface {
                hal: hal.name,
                interface: interface.name,
            });
        }
        by_name.insert(interface.name.clone(), interface);
    }
    hal.interfaces = by_name;

    validate_hal(&hal)?;
    Ok(hal)
}

fn validate_hal(hal: &ManifestHal) -> Result<()> {
    let invalid = |reason: String| {
        Err(ManifestError::InvalidHal {
            hal: hal.name.clone(),
            reason,
        })
    };

    if hal.versions.is_empty() {
        return invalid("no <version> declared".to_owned());
    }

    for (i, version) in hal.versions.iter().enumerate() {
        if let Some(other) = hal.versions[..i].iter().find(|v| v.major == version.major) {
            return invalid(format!(
                "versions {} and {} share major version {}",
                other, version, version.major
            ));
        }
    }

    match (hal.format, hal.transport_arch) {
        (HalFormat::Hidl, None) => invalid("hidl HALs must declare a <transport>".to_owned()),
        (HalFormat::Native, Some(_)) => {
            invalid("native HALs may not declare a <transport>".to_owned())
        }
        (
            HalFormat::Hidl,
            Some(TransportArch {
                transport: Transport::Hwbinder,
                arch: Some(arch),
            }),
        ) => invalid(format!(
            "hwbinder transport may not specify arch `{}`",
            arch.as_str()
        )),
        (
            HalFormat::Hidl,
            Some(TransportArch {
                transport: Transport::Passthrough,
                arch: None,
            }),
        ) => invalid("passthrough transport requires an arch".to_owned()),
        _ => Ok(()),
    }
}

impl HalManifest {
    /// Decodes a manifest from raw document bytes, which must be UTF-8.
    pub fn from_xml_bytes(bytes: &[u8]) -> Result<Self> {
        let text =
            std::str::from_utf8(bytes).map_err(|source| ManifestError::InvalidUtf8 { source })?;
        Self::from_xml_str(text)
    }

    pub fn from_xml_str(text: &str) -> Result<Self> {
        let root = read_tree(text)?;
        parse_manifest(&root)
    }
}
