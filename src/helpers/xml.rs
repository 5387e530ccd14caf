//! Pull-parser wrapper shared by the XLSX and ODS readers.

use crate::error::InsightSheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    UnknownEntity(String),

    #[error("Cannot parse attribute {name}=\"{value}\"")]
    AttributeValue { name: String, value: String },
}

/// Event reader over a package part, reusing one buffer for every event.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // <c r="A1"/> must produce a Start/End pair so empty cells close like full ones
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// Returns the next event, or `None` at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, InsightSheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookup on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped value of the attribute with the given qualified name.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, InsightSheetError>;

    /// Attribute value parsed with `FromStr`.
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, InsightSheetError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, InsightSheetError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute_value(&attribute))
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, InsightSheetError> {
        match self.get_attribute_value(name)? {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                XmlError::AttributeValue { name: name.to_owned(), value: value.to_string() }.into()
            }),
            None => Ok(None),
        }
    }
}

/// Unescaped attribute value.
pub(crate) fn attribute_value<'a>(attribute: &Attribute<'a>) -> Result<Cow<'a, str>, InsightSheetError> {
    Ok(attribute.unescape_value()?)
}

/// Accumulates character data from text and entity-reference events.
pub(crate) trait XmlTextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), InsightSheetError>;

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), InsightSheetError>;
}

impl XmlTextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), InsightSheetError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), InsightSheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::UnknownEntity(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Drives an [`XmlReader`] to end of document, dispatching each event to the
/// given match arms. Unmatched events are ignored; `break` leaves the loop.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
