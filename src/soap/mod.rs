/*!
SOAP envelope codec (component D): building and parsing the envelope
shared by outbound `sendAction` and inbound action dispatch, plus the
UPnPError fault shape.

Grounded on the teacher's `soap/mod.rs` `Action`/`Envelope` types, with
`HashMap` argument bags replaced by ordered `Vec<(String, String)>`
pairs — the spec requires argument order to survive the round trip
(§8: "parses X into the same action name and ordered argument list"),
which a map cannot guarantee.
*/
use crate::description::TypeID;
use crate::error::{invalid_xml_value, missing_xml_value, Error, MessageFormatError};
use crate::syntax::*;
use crate::xml::{start_element, start_element_with, start_ns_element, text_element};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

pub mod codec;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// An ordered argument list, as required for both directions of an
/// action call.
pub type Arguments = Vec<(String, String)>;

/// A fault carried in a SOAP 500 response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpnpFault {
    pub error_code: u32,
    pub error_description: String,
}

/// The parsed contents of an inbound or outbound action envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEnvelope {
    pub action_name: String,
    pub service_type: TypeID,
    pub args: Arguments,
}

/// The result of parsing a control-point response envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseEnvelope {
    Result(Arguments),
    Fault(UpnpFault),
}

const SOAP_BODY: &str = "Body";
const SOAP_ENVELOPE: &str = "Envelope";
const SOAP_FAULT: &str = "Fault";
const SOAP_FAULT_CODE: &str = "faultcode";
const SOAP_FAULT_STRING: &str = "faultstring";
const SOAP_FAULT_DETAIL: &str = "detail";
const SOAP_FAULT_ACTOR: &str = "Envelope";
const UPNP_ERROR: &str = "UPnPError";
const UPNP_ERROR_CODE: &str = "errorCode";
const UPNP_ERROR_DESCRIPTION: &str = "errorDescription";

// ------------------------------------------------------------------------------------------------
// Public Functions — Building
// ------------------------------------------------------------------------------------------------

/// Build the request envelope for `sendAction`, per §4.4.
pub fn build_action_envelope(
    service_type: &TypeID,
    action_name: &str,
    args: &[(String, String)],
) -> Result<String, Error> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        let envelope = open_envelope(&mut writer)?;

        let body = start_element(&mut writer, SOAP_BODY).map_err(MessageFormatError::from)?;
        let qualified = format!("u:{}", action_name);
        let service = service_type.to_string();
        let action = start_element_with(&mut writer, &qualified, vec![("xmlns:u", service.as_str())])
            .map_err(MessageFormatError::from)?;
        for (name, value) in args {
            text_element(&mut writer, name, value).map_err(MessageFormatError::from)?;
        }
        action.end(&mut writer).map_err(MessageFormatError::from)?;
        body.end(&mut writer).map_err(MessageFormatError::from)?;
        envelope.end(&mut writer).map_err(MessageFormatError::from)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Build the success response envelope for an inbound action, per
/// §4.4: `<u:${actionName}Response xmlns:u="$serviceType">…`.
pub fn build_response_envelope(
    service_type: &TypeID,
    action_name: &str,
    result: &[(String, String)],
) -> Result<String, Error> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        let envelope = open_envelope(&mut writer)?;

        let body = start_element(&mut writer, SOAP_BODY).map_err(MessageFormatError::from)?;
        let qualified = format!("u:{}Response", action_name);
        let service = service_type.to_string();
        let action = start_element_with(&mut writer, &qualified, vec![("xmlns:u", service.as_str())])
            .map_err(MessageFormatError::from)?;
        for (name, value) in result {
            text_element(&mut writer, name, value).map_err(MessageFormatError::from)?;
        }
        action.end(&mut writer).map_err(MessageFormatError::from)?;
        body.end(&mut writer).map_err(MessageFormatError::from)?;
        envelope.end(&mut writer).map_err(MessageFormatError::from)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Build a SOAP fault envelope carrying a UPnPError detail.
pub fn build_fault_envelope(error_code: u32, error_description: &str) -> Result<String, Error> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        let envelope = open_envelope(&mut writer)?;

        let body = start_element(&mut writer, SOAP_BODY).map_err(MessageFormatError::from)?;
        let fault = start_element(&mut writer, SOAP_FAULT).map_err(MessageFormatError::from)?;
        text_element(&mut writer, SOAP_FAULT_CODE, "s:Client").map_err(MessageFormatError::from)?;
        text_element(&mut writer, SOAP_FAULT_STRING, "UPnPError")
            .map_err(MessageFormatError::from)?;

        let detail = start_element(&mut writer, SOAP_FAULT_DETAIL).map_err(MessageFormatError::from)?;
        let upnp_error =
            start_ns_element(&mut writer, UPNP_ERROR, QUERY_STATE_VARIABLE_NS, None)
                .map_err(MessageFormatError::from)?;
        text_element(&mut writer, UPNP_ERROR_CODE, &error_code.to_string())
            .map_err(MessageFormatError::from)?;
        text_element(&mut writer, UPNP_ERROR_DESCRIPTION, error_description)
            .map_err(MessageFormatError::from)?;
        upnp_error.end(&mut writer).map_err(MessageFormatError::from)?;
        detail.end(&mut writer).map_err(MessageFormatError::from)?;

        fault.end(&mut writer).map_err(MessageFormatError::from)?;
        body.end(&mut writer).map_err(MessageFormatError::from)?;
        envelope.end(&mut writer).map_err(MessageFormatError::from)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// The value of the `SOAPACTION` header for an outbound action call.
pub fn soap_action_header(service_type: &TypeID, action_name: &str) -> String {
    format!("\"{}#{}\"", service_type, action_name)
}

/// Parse a `SOAPACTION` header value of the form `"serviceType#actionName"`
/// into its two parts.
pub fn parse_soap_action_header(value: &str) -> Result<(String, String), MessageFormatError> {
    let trimmed = value.trim().trim_matches('"');
    match trimmed.rfind('#') {
        Some(pos) => Ok((trimmed[..pos].to_string(), trimmed[pos + 1..].to_string())),
        None => Err(invalid_xml_value(HEAD_SOAPACTION, value)),
    }
}

// ------------------------------------------------------------------------------------------------
// Public Functions — Parsing
// ------------------------------------------------------------------------------------------------

/// Parse an inbound action request envelope: the single child of
/// `Envelope/Body` is the action element; its own children are the
/// ordered argument list.
pub fn parse_action_envelope(xml: &str) -> Result<ActionEnvelope, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == SOAP_BODY.as_bytes() => {
                return parse_action_element(&mut reader);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(Error::from(missing_xml_value(SOAP_BODY)))
}

/// Parse a control-point response envelope: either
/// `<actionName>Response` (success) or `Fault/detail/UPnPError`
/// (failure), per §4.4.
pub fn parse_response_envelope(xml: &str, action_name: &str) -> Result<ResponseEnvelope, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == SOAP_FAULT.as_bytes() => {
                return Ok(ResponseEnvelope::Fault(parse_fault(&mut reader)?));
            }
            Event::Start(e) => {
                let expected = format!("{}Response", action_name);
                if e.local_name() == expected.as_bytes() {
                    let args = parse_flat_args(&mut reader, &expected)?;
                    return Ok(ResponseEnvelope::Result(args));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(Error::from(missing_xml_value("Response")))
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

/// Open `<s:Envelope xmlns:s="..." s:encodingStyle="...">`.
fn open_envelope<T: std::io::Write>(
    writer: &mut Writer<T>,
) -> Result<crate::xml::Element, Error> {
    let qualified = format!("s:{}", SOAP_ENVELOPE);
    start_element_with(
        writer,
        &qualified,
        vec![
            ("xmlns:s", SOAP_NS_ENVELOPE),
            ("s:encodingStyle", SOAP_NS_ENCODING),
        ],
    )
    .map_err(|e| Error::from(MessageFormatError::from(e)))
}

fn parse_action_element(reader: &mut Reader<&[u8]>) -> Result<ActionEnvelope, Error> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name()).into_owned();
                let xmlns = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.ends_with(b"xmlns:u") || a.key == b"xmlns")
                    .map(|a| String::from_utf8_lossy(a.value.as_ref()).into_owned())
                    .unwrap_or_default();
                let service_type = crate::description::parse_type_id(&xmlns)
                    .map_err(Error::from)
                    .unwrap_or_else(|_| crate::description::TypeID::new_service(xmlns, String::new()));
                let args = parse_flat_args(reader, &name)?;
                return Ok(ActionEnvelope {
                    action_name: name,
                    service_type,
                    args,
                });
            }
            Event::End(e) if e.local_name() == SOAP_BODY.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(Error::from(missing_xml_value("action")))
}

/// Parse a sequence of `<name>value</name>` siblings up to the closing
/// tag `closing_name`, preserving document order.
fn parse_flat_args(reader: &mut Reader<&[u8]>, closing_name: &str) -> Result<Arguments, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name()).into_owned();
                let value = read_text(reader, &name)?;
                out.push((name, value));
            }
            Event::End(e) if e.local_name() == closing_name.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_fault(reader: &mut Reader<&[u8]>) -> Result<UpnpFault, Error> {
    let mut buf = Vec::new();
    let mut error_code = None;
    let mut error_description = String::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == UPNP_ERROR_CODE.as_bytes() => {
                let text = read_text(reader, UPNP_ERROR_CODE)?;
                error_code = Some(
                    text.parse()
                        .map_err(|_| invalid_xml_value(UPNP_ERROR_CODE, text))?,
                );
            }
            Event::Start(e) if e.local_name() == UPNP_ERROR_DESCRIPTION.as_bytes() => {
                error_description = read_text(reader, UPNP_ERROR_DESCRIPTION)?;
            }
            Event::End(e) if e.local_name() == SOAP_FAULT.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(UpnpFault {
        error_code: error_code.ok_or_else(|| missing_xml_value(UPNP_ERROR_CODE))?,
        error_description,
    })
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_action_and_argument_order() {
        let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
        let args = vec![
            ("InstanceID".to_string(), "0".to_string()),
            ("Channel".to_string(), "Master".to_string()),
        ];
        let xml = build_action_envelope(&service, "GetVolume", &args).unwrap();
        let parsed = parse_action_envelope(&xml).unwrap();
        assert_eq!(parsed.action_name, "GetVolume");
        assert_eq!(parsed.args, args);
    }

    #[test]
    fn round_trips_response_envelope() {
        let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
        let result = vec![("CurrentVolume".to_string(), "42".to_string())];
        let xml = build_response_envelope(&service, "GetVolume", &result).unwrap();
        match parse_response_envelope(&xml, "GetVolume").unwrap() {
            ResponseEnvelope::Result(args) => assert_eq!(args, result),
            ResponseEnvelope::Fault(_) => panic!("expected result"),
        }
    }

    #[test]
    fn parses_fault_envelope() {
        let xml = build_fault_envelope(718, "ConflictInMpdState").unwrap();
        match parse_response_envelope(&xml, "GetVolume").unwrap() {
            ResponseEnvelope::Fault(fault) => {
                assert_eq!(fault.error_code, 718);
                assert_eq!(fault.error_description, "ConflictInMpdState");
            }
            ResponseEnvelope::Result(_) => panic!("expected fault"),
        }
    }

    #[test]
    fn soap_action_header_round_trips() {
        let service = TypeID::new_service("RenderingControl".to_string(), "1".to_string());
        let header = soap_action_header(&service, "GetVolume");
        let (service_type, action) = parse_soap_action_header(&header).unwrap();
        assert_eq!(action, "GetVolume");
        assert!(service_type.contains("RenderingControl"));
    }
}
