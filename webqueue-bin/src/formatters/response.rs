use serde_json::{Map, Value, json};
use webqueue_lib::parser::XmlElement;
use webqueue_lib::{Document, Response};

/// One JSON object per response, suitable for line-based tooling
pub(crate) fn to_json(response: &Response) -> Value {
    json!({
        "url": response.url.as_str(),
        "status": response.status.map(|status| status.as_u16()),
        "error": response.error_code(),
        "message": response.error.as_ref().map(|error| error.message.as_str()),
        "cached": response.from_cache,
        "document": document(&response.document),
    })
}

fn document(document: &Document) -> Value {
    match document {
        Document::Raw(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Document::Json(value) => value.clone(),
        Document::Xml(element) => xml(element),
    }
}

fn xml(element: &XmlElement) -> Value {
    let attributes: Map<String, Value> = element
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    json!({
        "name": element.name,
        "attributes": attributes,
        "text": element.text,
        "children": element.children.iter().map(xml).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use webqueue_lib::parser::ParserRegistry;

    #[test]
    fn test_xml_document() {
        let registry = ParserRegistry::default();
        let document = registry
            .parser_for("xml")
            .unwrap()
            .decode(r#"<artist id="1"><name>Björk</name></artist>"#.as_bytes())
            .unwrap();

        assert_eq!(
            super::document(&document),
            json!({
                "name": "artist",
                "attributes": {"id": "1"},
                "text": "",
                "children": [
                    {"name": "name", "attributes": {}, "text": "Björk", "children": []}
                ],
            })
        );
    }

    #[test]
    fn test_raw_document() {
        let document = Document::Raw(b"plain".to_vec());
        assert_eq!(super::document(&document), json!("plain"));
    }
}
