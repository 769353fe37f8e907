/*!
GENA property-set XML: `<e:propertyset>` with `<e:property><$var>$value
</$var></e:property>` children (§4.5, §6 Wire Formats). Used for both
the initial state dump and every subsequent NOTIFY body.
*/
use crate::error::{Error, MessageFormatError};
use crate::syntax::{XML_ELEM_PROPERTY, XML_ELEM_PROPERTYSET, XML_NS_EVENT};
use crate::xml::{start_element, start_ns_element, text_element};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build a property-set document from an ordered list of
/// (variable, value) pairs.
pub fn build_propertyset(vars: &[(String, String)]) -> Result<String, Error> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        let root = start_ns_element(&mut writer, XML_ELEM_PROPERTYSET, XML_NS_EVENT, Some("e"))
            .map_err(MessageFormatError::from)?;
        for (name, value) in vars {
            let property =
                start_element(&mut writer, XML_ELEM_PROPERTY).map_err(MessageFormatError::from)?;
            text_element(&mut writer, name, value).map_err(MessageFormatError::from)?;
            property.end(&mut writer).map_err(MessageFormatError::from)?;
        }
        root.end(&mut writer).map_err(MessageFormatError::from)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse a property-set document into its ordered (variable, value)
/// list.
pub fn parse_propertyset(xml: &str) -> Result<Vec<(String, String)>, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) if e.local_name() == XML_ELEM_PROPERTY.as_bytes() => {
                if let Some(pair) = parse_property(&mut reader)? {
                    out.push(pair);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn parse_property(reader: &mut Reader<&[u8]>) -> Result<Option<(String, String)>, Error> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name()).into_owned();
                let value = read_text(reader, &name)?;
                // consume the </property> end tag
                skip_to_end(reader, XML_ELEM_PROPERTY)?;
                return Ok(Some((name, value)));
            }
            Event::End(e) if e.local_name() == XML_ELEM_PROPERTY.as_bytes() => return Ok(None),
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
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

fn skip_to_end(reader: &mut Reader<&[u8]>, name: &str) -> Result<(), Error> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf).map_err(MessageFormatError::from)? {
            Event::End(e) if e.local_name() == name.as_bytes() => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
