//! JSON extractor — flattens a document to `dotted.path: value` lines.
//!
//! Arrays of primitives are comma-joined on one line; arrays of objects
//! iterate each element as a sibling under the same path.

use serde_json::Value;

use super::{Extracted, Extractor};

pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn name(&self) -> &str {
        "json"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        let value: Value = serde_json::from_slice(data)?;
        let mut lines = Vec::new();
        flatten(&value, "", &mut lines);
        Ok(Extracted::text_only(lines.join("\n")))
    }
}

fn flatten(value: &Value, path: &str, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                flatten(child, &child_path, lines);
            }
        }
        Value::Array(items) => {
            if items.iter().all(|v| !v.is_object() && !v.is_array()) {
                let joined = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(render_line(path, &joined));
            } else {
                for item in items {
                    flatten(item, path, lines);
                }
            }
        }
        scalar => lines.push(render_line(path, &scalar_to_string(scalar))),
    }
}

fn render_line(path: &str, value: &str) -> String {
    if path.is_empty() {
        value.to_string()
    } else {
        format!("{path}: {value}")
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(input: &str) -> String {
        JsonExtractor.extract(input.as_bytes()).unwrap().text
    }

    #[test]
    fn test_nested_objects_dotted() {
        // Object keys iterate in sorted order.
        let out = extract(r#"{"user": {"name": "John", "age": 30}}"#);
        assert_eq!(out, "user.age: 30\nuser.name: John");
    }

    #[test]
    fn test_primitive_array_comma_joined() {
        let out = extract(r#"{"tags": ["a", "b", "c"]}"#);
        assert_eq!(out, "tags: a, b, c");
    }

    #[test]
    fn test_object_array_iterates_siblings() {
        let out = extract(r#"{"people": [{"name": "John"}, {"name": "Jane"}]}"#);
        assert_eq!(out, "people.name: John\npeople.name: Jane");
    }

    #[test]
    fn test_scalar_root() {
        assert_eq!(extract(r#""just a string""#), "just a string");
    }

    #[test]
    fn test_numbers_and_bools() {
        let out = extract(r#"{"count": 3, "active": true, "missing": null}"#);
        assert_eq!(out, "active: true\ncount: 3\nmissing: null");
    }

    #[test]
    fn test_invalid_json_errors() {
        assert!(JsonExtractor.extract(b"not json").is_err());
    }
}
