use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::{Document, ErrorKind, Result};

/// An element of a parsed XML document.
///
/// Text and CDATA content directly inside the element is concatenated
/// into `text`, with surrounding whitespace trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name, including any namespace prefix
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Character data of this element
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Value of the attribute called `name`
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child element called `name`
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| error(e.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| error(e.to_string()))?;
            attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }
}

fn error(reason: String) -> ErrorKind {
    ErrorKind::Parse {
        tag: "xml".to_string(),
        reason,
    }
}

pub(super) fn parse_xml(body: &[u8]) -> Result<Document> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut open: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        let element = match reader
            .read_event_into(&mut buf)
            .map_err(|e| error(e.to_string()))?
        {
            Event::Start(start) => {
                open.push(XmlElement::from_start(&start)?);
                None
            }
            Event::Empty(start) => Some(XmlElement::from_start(&start)?),
            Event::End(_) => Some(
                open.pop()
                    .ok_or_else(|| error("unexpected closing tag".to_string()))?,
            ),
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| error(e.to_string()))?;
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&text);
                }
                None
            }
            Event::CData(data) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&data));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some(element) = element {
            match open.last_mut() {
                Some(parent) => parent.children.push(element),
                None if root.is_none() => root = Some(element),
                None => return Err(error("more than one root element".to_string())),
            }
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(error("unexpected end of document".to_string()));
    }
    root.map(Document::Xml)
        .ok_or_else(|| error("document has no root element".to_string()))
}
