/*!
Shared XML writer helpers (used by description (C), SOAP (D), and GENA
propertyset (E/F) serialization) and a single `xml_quote` escaping
routine (§9 Design Notes: one escaping function used everywhere text is
written, rather than ad-hoc escaping at each call site).

Grounded on the teacher's `utils/xml.rs` writer-helper shape, ported to
the `quick-xml` 0.23 API (owned `BytesStart`/`BytesText` rather than the
`borrowed_name`/`from_plain` constructors the teacher used).
*/
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A trait for types that know how to serialize themselves as one or more
/// XML elements.
pub trait Writable<T: Write> {
    fn write(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error>;
}

/// A `Writable` that additionally owns the XML declaration, i.e. it is
/// the document root.
pub trait RootWritable<T: Write>: Writable<T> {
    fn write_document(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error>
    where
        Self: Sized,
    {
        start(writer)?;
        self.write(writer)
    }
}

/// A handle to an open element, returned by `start_element`, used to emit
/// its matching close tag.
#[derive(Debug)]
pub struct Element {
    name: String,
}

pub const X_DECL_VERSION: &str = "1.0";
pub const X_ATTR_NAMESPACE: &str = "xmlns";

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Write the `<?xml version="1.0"?>` declaration.
pub fn start<T: Write>(writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
    writer
        .write_event(Event::Decl(BytesDecl::new(X_DECL_VERSION, None, None)))
        .map(|_| ())
}

/// Write an empty element, `<name></name>`.
pub fn element<T: Write>(writer: &mut Writer<T>, name: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::End(BytesEnd::new(name))).map(|_| ())
}

/// Write an opening tag and return a handle used to close it later.
pub fn start_element<T: Write>(
    writer: &mut Writer<T>,
    name: &str,
) -> Result<Element, quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(Element {
        name: name.to_string(),
    })
}

/// Write an opening tag carrying a single `xmlns[:prefix]="namespace"`
/// attribute.
pub fn start_ns_element<T: Write>(
    writer: &mut Writer<T>,
    name: &str,
    namespace: &str,
    prefix: Option<&str>,
) -> Result<Element, quick_xml::Error> {
    let attr_name = match prefix {
        None => X_ATTR_NAMESPACE.to_string(),
        Some(p) => format!("{}:{}", X_ATTR_NAMESPACE, p),
    };
    start_element_with(writer, name, vec![(attr_name.as_str(), namespace)])
}

/// Write an opening tag with the given attributes.
pub fn start_element_with<T: Write>(
    writer: &mut Writer<T>,
    name: &str,
    attrs: Vec<(&str, &str)>,
) -> Result<Element, quick_xml::Error> {
    let mut element = BytesStart::new(name);
    element.extend_attributes(attrs.into_iter().map(|(k, v)| (k, v)));
    writer.write_event(Event::Start(element))?;
    Ok(Element {
        name: name.to_string(),
    })
}

/// Write a closing tag for `name` directly, without a prior `Element`
/// handle.
pub fn end_element<T: Write>(writer: &mut Writer<T>, name: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::End(BytesEnd::new(name))).map(|_| ())
}

/// Write `<name>content</name>`, escaping `content` via `xml_quote`.
pub fn text_element<T: Write>(
    writer: &mut Writer<T>,
    name: &str,
    content: &str,
) -> Result<(), quick_xml::Error> {
    let element = start_element(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(&xml_quote(content))))?;
    element.end(writer)
}

/// Escape `&`, `<`, `>`, `"` and `'` for inclusion in XML character data or
/// attribute values. The one escaping routine every writer in this crate
/// calls, per the no-ad-hoc-escaping design note.
pub fn xml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Element {
    pub fn end<T: Write>(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        end_element(writer, &self.name)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_all_specials() {
        assert_eq!(
            xml_quote("<a> & \"b\" 'c'"),
            "&lt;a&gt; &amp; &quot;b&quot; &apos;c&apos;"
        );
    }

    #[test]
    fn quote_passthrough_for_plain_text() {
        assert_eq!(xml_quote("plain text"), "plain text");
    }

    #[test]
    fn round_trip_text_element() {
        let mut buf = Vec::new();
        {
            let mut writer = Writer::new(&mut buf);
            text_element(&mut writer, "friendlyName", "A & B").unwrap();
        }
        let s = String::from_utf8(buf).unwrap();
        assert_eq!(s, "<friendlyName>A &amp; B</friendlyName>");
    }
}
