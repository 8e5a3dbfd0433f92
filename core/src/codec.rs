//! JSON encoding of request parameters and decoding of response bodies.
//!
//! # Design
//! Parameter structs serialize through serde in declaration order (the
//! `preserve_order` feature keeps `serde_json::Map` insertion-ordered), then
//! the caller's `extra_fields` are merged on top so they win over known
//! fields with the same name. Response structs capture unknown keys with
//! `#[serde(flatten)] extra: Extras`, which re-encodes them untouched.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Unrecognized JSON members, preserved across decode and encode.
pub type Extras = Map<String, Value>;

/// A request parameter struct.
pub trait Params: Serialize {
    /// Caller-supplied members sent alongside (and over) the known fields.
    fn extra_fields(&self) -> &Extras;
}

/// Serialize `params` into a JSON object with extras merged in.
pub fn encode_body<P: Params + ?Sized>(params: &P) -> Result<Map<String, Value>> {
    let mut object = to_object(params)?;
    for (key, value) in params.extra_fields() {
        object.insert(key.clone(), value.clone());
    }
    Ok(object)
}

pub(crate) fn to_object<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value).map_err(|e| Error::InvalidRequest(e.to_string()))? {
        Value::Object(object) => Ok(object),
        Value::Null => Ok(Map::new()),
        other => Err(Error::InvalidRequest(format!(
            "parameters must serialize to a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a response body, naming the failing field path on error.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let deserializer = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        Error::Decode {
            path,
            message: err.into_inner().to_string(),
            body: body.to_string(),
        }
    })
}
