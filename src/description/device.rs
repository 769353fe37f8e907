/*!
Device description model: `DeviceDesc` / `IconDesc` / `ServiceDesc` and
the root document `DeviceDescRoot` (§3 Data Model), both serialized and
parsed against the UPnP device description template.

Grounded on the teacher's `description/device.rs` `Writable` impls,
with a matching reader added (`parse`) built on `quick_xml::Reader`'s
pull-based event model, since the teacher's description module was
write-only.
*/
use crate::description::{SpecVersion, TypeID};
use crate::error::{missing_xml_value, Error, MessageFormatError};
use crate::syntax::*;
use crate::uri::resolve_rel_url;
use crate::xml::{start_element, start_ns_element, text_element, RootWritable, Writable};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Write;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconDesc {
    pub mime_type: String,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDesc {
    pub service_type: TypeID,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDesc {
    pub device_type: TypeID,
    pub friendly_name: String,
    pub manufacturer: String,
    pub manufacturer_url: Option<String>,
    pub model_description: Option<String>,
    pub model_name: String,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    pub udn: String,
    pub upc: Option<String>,
    pub icon_list: Vec<IconDesc>,
    pub service_list: Vec<ServiceDesc>,
    pub device_list: Vec<DeviceDesc>,
    pub presentation_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescRoot {
    pub spec_version: SpecVersion,
    pub url_base: String,
    pub device: DeviceDesc,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn to_writer<T: Write>(root: &DeviceDescRoot, writer: T) -> Result<(), Error> {
    let mut writer = Writer::new(writer);
    root.write_document(&mut writer)
        .map_err(MessageFormatError::from)
        .map_err(Error::from)
}

pub fn to_string(root: &DeviceDescRoot) -> Result<String, Error> {
    let mut buf = Vec::new();
    to_writer(root, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse a device description document (the `<root>` element and
/// everything beneath it).
pub fn parse(xml: &str) -> Result<DeviceDescRoot, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut spec_version = None;
    let mut url_base = None;
    let mut device = None;

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_SPEC_VERSION.as_bytes() => {
                    spec_version = Some(parse_spec_version(&mut reader)?);
                }
                n if n == XML_ELEM_URL_BASE.as_bytes() => {
                    url_base = Some(read_text(&mut reader, XML_ELEM_URL_BASE)?);
                }
                n if n == XML_ELEM_DEVICE.as_bytes() => {
                    device = Some(parse_device(&mut reader)?);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(DeviceDescRoot {
        spec_version: spec_version.unwrap_or_default(),
        url_base: url_base.unwrap_or_default(),
        device: device.ok_or_else(|| missing_xml_value(XML_ELEM_DEVICE))?,
    })
}

/// Resolve every relative URL in `device` (icon, SCPD, control, event-sub,
/// presentation) against `base`, recursing into embedded devices. Called
/// once at registration time so the stored `DeviceDesc` tree holds only
/// absolute URLs thereafter (§3: "Built once at registration, immutable
/// thereafter").
pub fn resolve_urls(device: &mut DeviceDesc, base: &str) -> Result<(), Error> {
    for icon in &mut device.icon_list {
        icon.url = resolve_rel_url(base, &icon.url).map_err(Error::from)?;
    }
    for service in &mut device.service_list {
        service.scpd_url = resolve_rel_url(base, &service.scpd_url).map_err(Error::from)?;
        service.control_url = resolve_rel_url(base, &service.control_url).map_err(Error::from)?;
        service.event_sub_url =
            resolve_rel_url(base, &service.event_sub_url).map_err(Error::from)?;
    }
    if let Some(p) = &device.presentation_url {
        device.presentation_url = Some(resolve_rel_url(base, p).map_err(Error::from)?);
    }
    for child in &mut device.device_list {
        resolve_urls(child, base)?;
    }
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl<T: Write> RootWritable<T> for DeviceDescRoot {}

impl<T: Write> Writable<T> for DeviceDescRoot {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let root = start_ns_element(writer, XML_ELEM_ROOT, XML_NS_DEVICE, None)?;

        write_spec_version(writer, &self.spec_version)?;
        text_element(writer, XML_ELEM_URL_BASE, &self.url_base)?;
        self.device.write(writer)?;

        root.end(writer)
    }
}

impl<T: Write> Writable<T> for DeviceDesc {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let top = start_element(writer, XML_ELEM_DEVICE)?;

        text_element(writer, XML_ELEM_DEVICE_TYPE, &self.device_type.to_string())?;
        text_element(writer, XML_ELEM_FRIENDLY_NAME, &self.friendly_name)?;
        text_element(writer, XML_ELEM_MANUFACTURER, &self.manufacturer)?;

        if let Some(s) = &self.manufacturer_url {
            text_element(writer, XML_ELEM_MANUFACTURER_URL, s)?;
        }
        if let Some(s) = &self.model_description {
            text_element(writer, XML_ELEM_MODEL_DESCR, s)?;
        }
        text_element(writer, XML_ELEM_MODEL_NAME, &self.model_name)?;
        if let Some(s) = &self.model_number {
            text_element(writer, XML_ELEM_MODEL_NUMBER, s)?;
        }
        if let Some(s) = &self.model_url {
            text_element(writer, XML_ELEM_MODEL_URL, s)?;
        }
        if let Some(s) = &self.serial_number {
            text_element(writer, XML_ELEM_SERIAL_NUMBER, s)?;
        }
        text_element(writer, XML_ELEM_UDN, &self.udn)?;
        if let Some(s) = &self.upc {
            text_element(writer, XML_ELEM_UPC, s)?;
        }

        if !self.icon_list.is_empty() {
            let list = start_element(writer, XML_ELEM_ICON_LIST)?;
            for icon in &self.icon_list {
                icon.write(writer)?;
            }
            list.end(writer)?;
        }

        if !self.service_list.is_empty() {
            let list = start_element(writer, XML_ELEM_SERVICE_LIST)?;
            for service in &self.service_list {
                service.write(writer)?;
            }
            list.end(writer)?;
        }

        if !self.device_list.is_empty() {
            let list = start_element(writer, XML_ELEM_DEVICE_LIST)?;
            for child in &self.device_list {
                child.write(writer)?;
            }
            list.end(writer)?;
        }

        if let Some(s) = &self.presentation_url {
            text_element(writer, XML_ELEM_PRESENTATION_URL, s)?;
        }

        top.end(writer)
    }
}

impl<T: Write> Writable<T> for IconDesc {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let element = start_element(writer, XML_ELEM_ICON)?;
        text_element(writer, XML_ELEM_ICON_MIME_TYPE, &self.mime_type)?;
        text_element(writer, XML_ELEM_ICON_WIDTH, &self.width.to_string())?;
        text_element(writer, XML_ELEM_ICON_HEIGHT, &self.height.to_string())?;
        text_element(writer, XML_ELEM_ICON_DEPTH, &self.depth.to_string())?;
        text_element(writer, XML_ELEM_ICON_URL, &self.url)?;
        element.end(writer)
    }
}

impl<T: Write> Writable<T> for ServiceDesc {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let element = start_element(writer, XML_ELEM_SERVICE)?;
        text_element(writer, XML_ELEM_SERVICE_TYPE, &self.service_type.to_string())?;
        text_element(writer, XML_ELEM_SERVICE_ID, &self.service_id)?;
        text_element(writer, XML_ELEM_SERVICE_SCPD_URL, &self.scpd_url)?;
        text_element(writer, XML_ELEM_SERVICE_CONTROL_URL, &self.control_url)?;
        text_element(writer, XML_ELEM_SERVICE_EVENT_URL, &self.event_sub_url)?;
        element.end(writer)
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn write_spec_version<T: Write>(
    writer: &mut Writer<T>,
    v: &SpecVersion,
) -> Result<(), quick_xml::Error> {
    let e = start_element(writer, XML_ELEM_SPEC_VERSION)?;
    text_element(writer, XML_ELEM_MAJOR, &v.major.to_string())?;
    text_element(writer, XML_ELEM_MINOR, &v.minor.to_string())?;
    e.end(writer)
}

fn parse_spec_version(reader: &mut Reader<&[u8]>) -> Result<SpecVersion, Error> {
    let mut buf = Vec::new();
    let mut major = String::new();
    let mut minor = String::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_MAJOR.as_bytes() => {
                major = read_text(reader, XML_ELEM_MAJOR)?;
            }
            Event::Start(e) if e.local_name() == XML_ELEM_MINOR.as_bytes() => {
                minor = read_text(reader, XML_ELEM_MINOR)?;
            }
            Event::End(e) if e.local_name() == XML_ELEM_SPEC_VERSION.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    SpecVersion::parse(&major, &minor)
}

fn parse_device(reader: &mut Reader<&[u8]>) -> Result<DeviceDesc, Error> {
    let mut buf = Vec::new();
    let mut device_type = None;
    let mut friendly_name = String::new();
    let mut manufacturer = String::new();
    let mut manufacturer_url = None;
    let mut model_description = None;
    let mut model_name = String::new();
    let mut model_number = None;
    let mut model_url = None;
    let mut serial_number = None;
    let mut udn = String::new();
    let mut upc = None;
    let mut icon_list = Vec::new();
    let mut service_list = Vec::new();
    let mut device_list = Vec::new();
    let mut presentation_url = None;

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => {
                let name = e.local_name().to_vec();
                match name.as_slice() {
                    n if n == XML_ELEM_DEVICE_TYPE.as_bytes() => {
                        device_type = Some(crate::description::parse_type_id(&read_text(
                            reader,
                            XML_ELEM_DEVICE_TYPE,
                        )?)?);
                    }
                    n if n == XML_ELEM_FRIENDLY_NAME.as_bytes() => {
                        friendly_name = read_text(reader, XML_ELEM_FRIENDLY_NAME)?;
                    }
                    n if n == XML_ELEM_MANUFACTURER.as_bytes() => {
                        manufacturer = read_text(reader, XML_ELEM_MANUFACTURER)?;
                    }
                    n if n == XML_ELEM_MANUFACTURER_URL.as_bytes() => {
                        manufacturer_url = Some(read_text(reader, XML_ELEM_MANUFACTURER_URL)?);
                    }
                    n if n == XML_ELEM_MODEL_DESCR.as_bytes() => {
                        model_description = Some(read_text(reader, XML_ELEM_MODEL_DESCR)?);
                    }
                    n if n == XML_ELEM_MODEL_NAME.as_bytes() => {
                        model_name = read_text(reader, XML_ELEM_MODEL_NAME)?;
                    }
                    n if n == XML_ELEM_MODEL_NUMBER.as_bytes() => {
                        model_number = Some(read_text(reader, XML_ELEM_MODEL_NUMBER)?);
                    }
                    n if n == XML_ELEM_MODEL_URL.as_bytes() => {
                        model_url = Some(read_text(reader, XML_ELEM_MODEL_URL)?);
                    }
                    n if n == XML_ELEM_SERIAL_NUMBER.as_bytes() => {
                        serial_number = Some(read_text(reader, XML_ELEM_SERIAL_NUMBER)?);
                    }
                    n if n == XML_ELEM_UDN.as_bytes() => {
                        udn = read_text(reader, XML_ELEM_UDN)?;
                    }
                    n if n == XML_ELEM_UPC.as_bytes() => {
                        upc = Some(read_text(reader, XML_ELEM_UPC)?);
                    }
                    n if n == XML_ELEM_PRESENTATION_URL.as_bytes() => {
                        presentation_url = Some(read_text(reader, XML_ELEM_PRESENTATION_URL)?);
                    }
                    n if n == XML_ELEM_ICON_LIST.as_bytes() => {
                        icon_list = parse_icon_list(reader)?;
                    }
                    n if n == XML_ELEM_SERVICE_LIST.as_bytes() => {
                        service_list = parse_service_list(reader)?;
                    }
                    n if n == XML_ELEM_DEVICE_LIST.as_bytes() => {
                        device_list = parse_device_list(reader)?;
                    }
                    _ => {}
                }
            }
            Event::End(e) if e.local_name() == XML_ELEM_DEVICE.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(DeviceDesc {
        device_type: device_type.ok_or_else(|| missing_xml_value(XML_ELEM_DEVICE_TYPE))?,
        friendly_name,
        manufacturer,
        manufacturer_url,
        model_description,
        model_name,
        model_number,
        model_url,
        serial_number,
        udn,
        upc,
        icon_list,
        service_list,
        device_list,
        presentation_url,
    })
}

fn parse_device_list(reader: &mut Reader<&[u8]>) -> Result<Vec<DeviceDesc>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_DEVICE.as_bytes() => {
                out.push(parse_device(reader)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_DEVICE_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_service_list(reader: &mut Reader<&[u8]>) -> Result<Vec<ServiceDesc>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_SERVICE.as_bytes() => {
                out.push(parse_service(reader)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_SERVICE_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_service(reader: &mut Reader<&[u8]>) -> Result<ServiceDesc, Error> {
    let mut buf = Vec::new();
    let mut service_type = None;
    let mut service_id = String::new();
    let mut scpd_url = String::new();
    let mut control_url = String::new();
    let mut event_sub_url = String::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_SERVICE_TYPE.as_bytes() => {
                    service_type = Some(crate::description::parse_type_id(&read_text(
                        reader,
                        XML_ELEM_SERVICE_TYPE,
                    )?)?);
                }
                n if n == XML_ELEM_SERVICE_ID.as_bytes() => {
                    service_id = read_text(reader, XML_ELEM_SERVICE_ID)?;
                }
                n if n == XML_ELEM_SERVICE_SCPD_URL.as_bytes() => {
                    scpd_url = read_text(reader, XML_ELEM_SERVICE_SCPD_URL)?;
                }
                n if n == XML_ELEM_SERVICE_CONTROL_URL.as_bytes() => {
                    control_url = read_text(reader, XML_ELEM_SERVICE_CONTROL_URL)?;
                }
                n if n == XML_ELEM_SERVICE_EVENT_URL.as_bytes() => {
                    event_sub_url = read_text(reader, XML_ELEM_SERVICE_EVENT_URL)?;
                }
                _ => {}
            },
            Event::End(e) if e.local_name() == XML_ELEM_SERVICE.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ServiceDesc {
        service_type: service_type.ok_or_else(|| missing_xml_value(XML_ELEM_SERVICE_TYPE))?,
        service_id,
        scpd_url,
        control_url,
        event_sub_url,
    })
}

fn parse_icon_list(reader: &mut Reader<&[u8]>) -> Result<Vec<IconDesc>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_ICON.as_bytes() => {
                out.push(parse_icon(reader)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_ICON_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_icon(reader: &mut Reader<&[u8]>) -> Result<IconDesc, Error> {
    let mut buf = Vec::new();
    let mut mime_type = String::new();
    let mut width = 0u16;
    let mut height = 0u16;
    let mut depth = 0u16;
    let mut url = String::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_ICON_MIME_TYPE.as_bytes() => {
                    mime_type = read_text(reader, XML_ELEM_ICON_MIME_TYPE)?;
                }
                n if n == XML_ELEM_ICON_WIDTH.as_bytes() => {
                    width = read_text(reader, XML_ELEM_ICON_WIDTH)?
                        .parse()
                        .unwrap_or_default();
                }
                n if n == XML_ELEM_ICON_HEIGHT.as_bytes() => {
                    height = read_text(reader, XML_ELEM_ICON_HEIGHT)?
                        .parse()
                        .unwrap_or_default();
                }
                n if n == XML_ELEM_ICON_DEPTH.as_bytes() => {
                    depth = read_text(reader, XML_ELEM_ICON_DEPTH)?
                        .parse()
                        .unwrap_or_default();
                }
                n if n == XML_ELEM_ICON_URL.as_bytes() => {
                    url = read_text(reader, XML_ELEM_ICON_URL)?;
                }
                _ => {}
            },
            Event::End(e) if e.local_name() == XML_ELEM_ICON.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(IconDesc {
        mime_type,
        width,
        height,
        depth,
        url,
    })
}

/// Read the text content of the element just opened (`name`) up to its
/// matching end tag.
fn read_text(reader: &mut Reader<&[u8]>, name: &str) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Text(e) => {
                text.push_str(
                    &e.unescape_and_decode(reader)
                        .map_err(MessageFormatError::from)?,
                );
            }
            Event::End(e) if e.local_name() == name.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
