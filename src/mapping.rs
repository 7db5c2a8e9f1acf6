// Nested-mapping view of a response document
//
// Converts a parsed response into a `serde_json::Value` for callers that
// prefer plain data over typed entities:
// - an element with only text becomes a string, an empty one `null`
// - attributes become `"@name"` keys
// - repeated child names collect into an array
// - text mixed with child elements is kept under `"#text"`

use crate::document::{Document, NodeId};
use serde_json::map::Entry;
use serde_json::{Map, Value};

pub const TEXT_KEY: &str = "#text";

/// The whole document as `{ root_name: content }`, or `null` when it is empty.
pub fn to_value(document: &Document) -> Value {
    match document.root_element() {
        Some(root) => {
            let mut map = Map::new();
            map.insert(root_name(document, root), element_value(document, root));
            Value::Object(map)
        }
        None => Value::Null,
    }
}

/// Pretty JSON rendering of [`to_value`].
pub fn to_json_string(document: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&to_value(document))
}

fn root_name(document: &Document, id: NodeId) -> String {
    document.name(id).unwrap_or_default().to_string()
}

fn element_value(document: &Document, id: NodeId) -> Value {
    let attributes = document.attributes(id);
    let elements: Vec<NodeId> = document
        .children(id)
        .iter()
        .copied()
        .filter(|&child| document.is_element(child))
        .collect();
    let text: String = document
        .children(id)
        .iter()
        .filter_map(|&child| document.text(child))
        .collect();

    if attributes.is_empty() && elements.is_empty() {
        return if text.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        };
    }

    let mut map = Map::new();
    for (key, value) in attributes {
        map.insert(format!("@{}", key), Value::String(value.clone()));
    }
    for child in elements {
        let name = root_name(document, child);
        let value = element_value(document, child);
        match map.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    if !text.trim().is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(text));
    }
    Value::Object(map)
}
