//! Flattening of parameter structs into URL query pairs.
//!
//! # Design
//! Parameters are serialized to a `serde_json::Value` first and then walked,
//! so the same serde attributes that drive body encoding drive the query
//! string too. Pairs are sorted by key (stable, so repeated keys keep their
//! order) which makes the output reproducible for fixtures and test vectors.

use serde_json::{Map, Value};

use crate::codec::{to_object, Params};
use crate::error::Result;

/// How arrays are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayFormat {
    /// `status=a,b`; an explicitly empty array is sent as `status=`.
    #[default]
    Comma,
    /// `status=a&status=b`; empty arrays produce no pairs.
    Repeat,
    /// `status[]=a&status[]=b`; empty arrays produce no pairs.
    Brackets,
}

/// How nested objects are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestedFormat {
    /// `created_at.after=...`
    #[default]
    Dots,
    /// `created_at[after]=...`
    Brackets,
}

/// Turns parameter structs into ordered `(key, value)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryEncoder {
    pub arrays: ArrayFormat,
    pub nested: NestedFormat,
}

impl QueryEncoder {
    pub fn new(arrays: ArrayFormat, nested: NestedFormat) -> Self {
        Self { arrays, nested }
    }

    /// Encode `params` plus its extra fields.
    pub fn encode<P: Params + ?Sized>(&self, params: &P) -> Result<Vec<(String, String)>> {
        let mut object = to_object(params)?;
        for (key, value) in params.extra_fields() {
            object.insert(key.clone(), value.clone());
        }
        Ok(self.encode_object(&object))
    }

    pub fn encode_object(&self, object: &Map<String, Value>) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in object {
            self.push_value(key, value, &mut pairs);
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    fn push_value(&self, key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
        match value {
            Value::Null => {}
            Value::Object(object) => {
                for (child, value) in object {
                    let nested = match self.nested {
                        NestedFormat::Dots => format!("{key}.{child}"),
                        NestedFormat::Brackets => format!("{key}[{child}]"),
                    };
                    self.push_value(&nested, value, pairs);
                }
            }
            Value::Array(items) => self.push_array(key, items, pairs),
            scalar => {
                if let Some(text) = scalar_text(scalar) {
                    pairs.push((key.to_string(), text));
                }
            }
        }
    }

    fn push_array(&self, key: &str, items: &[Value], pairs: &mut Vec<(String, String)>) {
        let scalars: Option<Vec<String>> = items.iter().map(scalar_text).collect();
        match (self.arrays, scalars) {
            (ArrayFormat::Comma, Some(values)) => {
                pairs.push((key.to_string(), values.join(",")));
            }
            (ArrayFormat::Repeat, Some(values)) => {
                pairs.extend(values.into_iter().map(|v| (key.to_string(), v)));
            }
            (ArrayFormat::Brackets, Some(values)) => {
                let key = format!("{key}[]");
                pairs.extend(values.into_iter().map(|v| (key.clone(), v)));
            }
            // Arrays of objects cannot be comma-joined; index them instead.
            (_, None) => {
                for (index, item) in items.iter().enumerate() {
                    self.push_value(&format!("{key}[{index}]"), item, pairs);
                }
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
