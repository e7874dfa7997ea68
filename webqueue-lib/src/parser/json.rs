use crate::{Document, ErrorKind, Result};

pub(super) fn parse_json(body: &[u8]) -> Result<Document> {
    serde_json::from_slice(body)
        .map(Document::Json)
        .map_err(|e| ErrorKind::Parse {
            tag: "json".to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json(br#"{"a":1}"#).unwrap(), Document::Json(json!({"a": 1})));
    }

    #[test]
    fn test_parse_malformed_json() {
        let error = parse_json(br#"{"a":"#).unwrap_err();
        assert!(matches!(error, ErrorKind::Parse { tag, .. } if tag == "json"));
    }
}
