use log::trace;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use super::error::{ManifestError, Result};
use super::types::*;
use crate::version::Version;

const INDENT: usize = 4;

type XmlWriter = Writer<Vec<u8>>;
type WriteResult = std::result::Result<(), quick_xml::Error>;

fn start(writer: &mut XmlWriter, element: BytesStart) -> WriteResult {
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn end(writer: &mut XmlWriter, name: &str) -> WriteResult {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn leaf(writer: &mut XmlWriter, element: BytesStart, text: &str) -> WriteResult {
    let end_tag = element.to_end().into_owned();
    writer.write_event(Event::Start(element))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(end_tag))?;
    Ok(())
}

fn version(writer: &mut XmlWriter, version: Version) -> WriteResult {
    leaf(writer, BytesStart::new("version"), &version.to_string())
}

fn write_interface(writer: &mut XmlWriter, interface: &HalInterface) -> WriteResult {
    start(writer, BytesStart::new("interface"))?;
    leaf(writer, BytesStart::new("name"), &interface.name)?;
    for instance in &interface.instances {
        leaf(writer, BytesStart::new("instance"), instance)?;
    }
    end(writer, "interface")
}

fn write_hal(writer: &mut XmlWriter, hal: &ManifestHal) -> WriteResult {
    trace!("writing HAL `{}`", hal.name);

    let mut element = BytesStart::new("hal");
    element.push_attribute(("format", hal.format.as_str()));
    start(writer, element)?;

    leaf(writer, BytesStart::new("name"), &hal.name)?;

    if let Some(transport_arch) = hal.transport_arch {
        let mut element = BytesStart::new("transport");
        if let Some(arch) = transport_arch.arch {
            element.push_attribute(("arch", arch.as_str()));
        }
        leaf(writer, element, transport_arch.transport.as_str())?;
    }

    for v in &hal.versions {
        version(writer, *v)?;
    }

    for interface in hal.interfaces.values() {
        write_interface(writer, interface)?;
    }

    end(writer, "hal")
}

fn write_manifest(writer: &mut XmlWriter, manifest: &HalManifest) -> WriteResult {
    let meta_version = manifest.meta_version.to_string();

    let mut root = BytesStart::new("manifest");
    root.push_attribute(("version", meta_version.as_str()));
    root.push_attribute(("type", manifest.schema_type().as_str()));
    start(writer, root)?;

    for hal in &manifest.hals {
        write_hal(writer, hal)?;
    }

    if let Some(sepolicy_version) = manifest.sepolicy_version() {
        start(writer, BytesStart::new("sepolicy"))?;
        version(writer, sepolicy_version)?;
        end(writer, "sepolicy")?;
    }

    end(writer, "manifest")
}

impl HalManifest {
    /// Encodes the manifest in its canonical form: four space indentation, no XML declaration,
    /// interfaces and instances sorted by name, and a trailing newline.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);

        write_manifest(&mut writer, self).map_err(|source| ManifestError::Write { source })?;

        let mut buffer = writer.into_inner();
        buffer.push(b'\n');

        into_document(buffer)
    }
}

/// Every string written came from a `&str`, so this only fails on a writer bug.
fn into_document(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer).map_err(|e| ManifestError::EncodedInvalidUtf8 {
        source: e.utf8_error(),
    })
}
