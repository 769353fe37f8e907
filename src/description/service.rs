/*!
Service Control Protocol Description (SCPD) model: the action list and
state table served from a service's `SCPDURL`.

Grounded on the teacher's `description/service.rs` `Writable` impls; a
reader is added for the same reason as `device.rs` — the teacher never
parsed one back.
*/
use crate::description::SpecVersion;
use crate::error::{missing_xml_value, Error, MessageFormatError};
use crate::syntax::*;
use crate::xml::{start_element, start_element_with, start_ns_element, text_element, RootWritable, Writable};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Write;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub direction: Direction,
    pub return_value: bool,
    pub related_state_variable: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub argument_list: Vec<Argument>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedValue {
    List {
        values: Vec<String>,
    },
    Range {
        minimum: String,
        maximum: String,
        step: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateVariable {
    pub send_events: bool,
    pub name: String,
    pub data_type: String,
    pub default_value: Option<String>,
    pub allowed_values: Option<AllowedValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scpd {
    pub spec_version: SpecVersion,
    pub action_list: Vec<Action>,
    pub service_state_table: Vec<StateVariable>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn to_writer<T: Write>(root: &Scpd, writer: T) -> Result<(), Error> {
    let mut writer = Writer::new(writer);
    root.write_document(&mut writer)
        .map_err(MessageFormatError::from)
        .map_err(Error::from)
}

pub fn to_string(root: &Scpd) -> Result<String, Error> {
    let mut buf = Vec::new();
    to_writer(root, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn parse(xml: &str) -> Result<Scpd, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut spec_version = None;
    let mut action_list = Vec::new();
    let mut service_state_table = Vec::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_SPEC_VERSION.as_bytes() => {
                    spec_version = Some(parse_spec_version(&mut reader)?);
                }
                n if n == XML_ELEM_ACTION_LIST.as_bytes() => {
                    action_list = parse_action_list(&mut reader)?;
                }
                n if n == XML_ELEM_STATE_TABLE.as_bytes() => {
                    service_state_table = parse_state_table(&mut reader)?;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Scpd {
        spec_version: spec_version.unwrap_or_default(),
        action_list,
        service_state_table,
    })
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl<T: Write> Writable<T> for Argument {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let argument = start_element(writer, XML_ELEM_ARGUMENT)?;
        text_element(writer, XML_ELEM_NAME, &self.name)?;
        text_element(
            writer,
            XML_ELEM_DIRECTION,
            match &self.direction {
                Direction::In => "in",
                Direction::Out => "out",
            },
        )?;
        if self.return_value {
            crate::xml::element(writer, XML_ELEM_RETVAL)?;
        }
        text_element(writer, XML_ELEM_REL_STATE_VARIABLE, &self.related_state_variable)?;
        argument.end(writer)
    }
}

impl<T: Write> Writable<T> for Action {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let action = start_element(writer, XML_ELEM_ACTION)?;
        text_element(writer, XML_ELEM_NAME, &self.name)?;
        if !self.argument_list.is_empty() {
            let list = start_element(writer, XML_ELEM_ARGUMENT_LIST)?;
            for argument in &self.argument_list {
                argument.write(writer)?;
            }
            list.end(writer)?;
        }
        action.end(writer)
    }
}

impl<T: Write> Writable<T> for AllowedValue {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        match self {
            AllowedValue::List { values } => {
                let list = start_element(writer, XML_ELEM_ALLOWED_LIST)?;
                for value in values {
                    text_element(writer, XML_ELEM_ALLOWED_VALUE, value)?;
                }
                list.end(writer)
            }
            AllowedValue::Range { minimum, maximum, step } => {
                let range = start_element(writer, XML_ELEM_ALLOWED_RANGE)?;
                text_element(writer, XML_ELEM_MINIMUM, minimum)?;
                text_element(writer, XML_ELEM_MAXIMUM, maximum)?;
                if let Some(step) = step {
                    text_element(writer, XML_ELEM_STEP, step)?;
                }
                range.end(writer)
            }
        }
    }
}

impl<T: Write> Writable<T> for StateVariable {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let variable = start_element_with(
            writer,
            XML_ELEM_STATE_VARIABLE,
            vec![(XML_ATTR_SEND_EVENTS, if self.send_events { "yes" } else { "no" })],
        )?;
        text_element(writer, XML_ELEM_NAME, &self.name)?;
        text_element(writer, XML_ELEM_DATA_TYPE, &self.data_type)?;
        if let Some(default_value) = &self.default_value {
            text_element(writer, XML_ELEM_DEFAULT_VALUE, default_value)?;
        }
        if let Some(allowed) = &self.allowed_values {
            allowed.write(writer)?;
        }
        variable.end(writer)
    }
}

impl<T: Write> RootWritable<T> for Scpd {}

impl<T: Write> Writable<T> for Scpd {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        let root = start_ns_element(writer, XML_ELEM_SCPD, XML_NS_SERVICE, None)?;

        let spec = start_element(writer, XML_ELEM_SPEC_VERSION)?;
        text_element(writer, XML_ELEM_MAJOR, &self.spec_version.major.to_string())?;
        text_element(writer, XML_ELEM_MINOR, &self.spec_version.minor.to_string())?;
        spec.end(writer)?;

        if !self.action_list.is_empty() {
            let list = start_element(writer, XML_ELEM_ACTION_LIST)?;
            for action in &self.action_list {
                action.write(writer)?;
            }
            list.end(writer)?;
        }

        let list = start_element(writer, XML_ELEM_STATE_TABLE)?;
        for variable in &self.service_state_table {
            variable.write(writer)?;
        }
        list.end(writer)?;

        root.end(writer)
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

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

fn parse_action_list(reader: &mut Reader<&[u8]>) -> Result<Vec<Action>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_ACTION.as_bytes() => {
                out.push(parse_action(reader)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_ACTION_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_action(reader: &mut Reader<&[u8]>) -> Result<Action, Error> {
    let mut buf = Vec::new();
    let mut name = String::new();
    let mut argument_list = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_NAME.as_bytes() => {
                name = read_text(reader, XML_ELEM_NAME)?;
            }
            Event::Start(e) if e.local_name() == XML_ELEM_ARGUMENT_LIST.as_bytes() => {
                argument_list = parse_argument_list(reader)?;
            }
            Event::End(e) if e.local_name() == XML_ELEM_ACTION.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(Action { name, argument_list })
}

fn parse_argument_list(reader: &mut Reader<&[u8]>) -> Result<Vec<Argument>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_ARGUMENT.as_bytes() => {
                out.push(parse_argument(reader)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_ARGUMENT_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_argument(reader: &mut Reader<&[u8]>) -> Result<Argument, Error> {
    let mut buf = Vec::new();
    let mut name = String::new();
    let mut direction = Direction::In;
    let mut return_value = false;
    let mut related_state_variable = String::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_NAME.as_bytes() => {
                    name = read_text(reader, XML_ELEM_NAME)?;
                }
                n if n == XML_ELEM_DIRECTION.as_bytes() => {
                    direction = match read_text(reader, XML_ELEM_DIRECTION)?.as_str() {
                        "out" => Direction::Out,
                        _ => Direction::In,
                    };
                }
                n if n == XML_ELEM_RETVAL.as_bytes() => {
                    return_value = true;
                }
                n if n == XML_ELEM_REL_STATE_VARIABLE.as_bytes() => {
                    related_state_variable = read_text(reader, XML_ELEM_REL_STATE_VARIABLE)?;
                }
                _ => {}
            },
            Event::End(e) if e.local_name() == XML_ELEM_ARGUMENT.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(Argument {
        name,
        direction,
        return_value,
        related_state_variable,
    })
}

fn parse_state_table(reader: &mut Reader<&[u8]>) -> Result<Vec<StateVariable>, Error> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_STATE_VARIABLE.as_bytes() => {
                let send_events = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key == XML_ATTR_SEND_EVENTS.as_bytes())
                    .map(|a| a.value.as_ref() == b"yes")
                    .unwrap_or(false);
                out.push(parse_state_variable(reader, send_events)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_STATE_TABLE.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_state_variable(
    reader: &mut Reader<&[u8]>,
    send_events: bool,
) -> Result<StateVariable, Error> {
    let mut buf = Vec::new();
    let mut name = String::new();
    let mut data_type = String::new();
    let mut default_value = None;
    let mut allowed_values = None;
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_NAME.as_bytes() => {
                    name = read_text(reader, XML_ELEM_NAME)?;
                }
                n if n == XML_ELEM_DATA_TYPE.as_bytes() => {
                    data_type = read_text(reader, XML_ELEM_DATA_TYPE)?;
                }
                n if n == XML_ELEM_DEFAULT_VALUE.as_bytes() => {
                    default_value = Some(read_text(reader, XML_ELEM_DEFAULT_VALUE)?);
                }
                n if n == XML_ELEM_ALLOWED_LIST.as_bytes() => {
                    allowed_values = Some(parse_allowed_list(reader)?);
                }
                n if n == XML_ELEM_ALLOWED_RANGE.as_bytes() => {
                    allowed_values = Some(parse_allowed_range(reader)?);
                }
                _ => {}
            },
            Event::End(e) if e.local_name() == XML_ELEM_STATE_VARIABLE.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(StateVariable {
        send_events,
        name,
        data_type,
        default_value,
        allowed_values,
    })
}

fn parse_allowed_list(reader: &mut Reader<&[u8]>) -> Result<AllowedValue, Error> {
    let mut buf = Vec::new();
    let mut values = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_ALLOWED_VALUE.as_bytes() => {
                values.push(read_text(reader, XML_ELEM_ALLOWED_VALUE)?);
            }
            Event::End(e) if e.local_name() == XML_ELEM_ALLOWED_LIST.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(AllowedValue::List { values })
}

fn parse_allowed_range(reader: &mut Reader<&[u8]>) -> Result<AllowedValue, Error> {
    let mut buf = Vec::new();
    let mut minimum = String::new();
    let mut maximum = String::new();
    let mut step = None;
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => match e.local_name() {
                n if n == XML_ELEM_MINIMUM.as_bytes() => {
                    minimum = read_text(reader, XML_ELEM_MINIMUM)?;
                }
                n if n == XML_ELEM_MAXIMUM.as_bytes() => {
                    maximum = read_text(reader, XML_ELEM_MAXIMUM)?;
                }
                n if n == XML_ELEM_STEP.as_bytes() => {
                    step = Some(read_text(reader, XML_ELEM_STEP)?);
                }
                _ => {}
            },
            Event::End(e) if e.local_name() == XML_ELEM_ALLOWED_RANGE.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(AllowedValue::Range { minimum, maximum, step })
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

    fn sample() -> Scpd {
        Scpd {
            spec_version: SpecVersion { major: 1, minor: 0 },
            action_list: vec![Action {
                name: "GetVolume".to_string(),
                argument_list: vec![
                    Argument {
                        name: "InstanceID".to_string(),
                        direction: Direction::In,
                        return_value: false,
                        related_state_variable: "A_ARG_TYPE_InstanceID".to_string(),
                    },
                    Argument {
                        name: "CurrentVolume".to_string(),
                        direction: Direction::Out,
                        return_value: false,
                        related_state_variable: "Volume".to_string(),
                    },
                ],
            }],
            service_state_table: vec![StateVariable {
                send_events: true,
                name: "Volume".to_string(),
                data_type: "ui2".to_string(),
                default_value: Some("0".to_string()),
                allowed_values: Some(AllowedValue::Range {
                    minimum: "0".to_string(),
                    maximum: "100".to_string(),
                    step: Some("1".to_string()),
                }),
            }],
        }
    }

    #[test]
    fn round_trips_actions_and_state_table() {
        let scpd = sample();
        let xml = to_string(&scpd).unwrap();
        let parsed = parse(&xml).unwrap();
        assert_eq!(parsed.action_list.len(), 1);
        assert_eq!(parsed.action_list[0].argument_list.len(), 2);
        assert_eq!(parsed.service_state_table[0].name, "Volume");
        assert!(parsed.service_state_table[0].send_events);
    }
}
