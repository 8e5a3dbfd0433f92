//! Presence-aware wrapper for optional request fields.
//!
//! # Design
//! A plain `Option<T>` cannot tell "leave this field alone" apart from "set
//! this field to null". `Field<T>` carries three states so partial updates
//! omit untouched fields while nullable API fields can still be cleared
//! explicitly. Pair it with
//! `#[serde(default, skip_serializing_if = "Field::is_omitted")]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A request field that is either omitted, explicitly null, or set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// The caller never touched the field; it is left out of the request.
    Omitted,
    /// The caller asked for an explicit JSON `null`.
    Null,
    /// The caller supplied a value, which may be a zero value.
    Value(T),
}

impl<T> Field<T> {
    pub fn value(value: T) -> Self {
        Field::Value(value)
    }

    pub fn null() -> Self {
        Field::Null
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Field::Omitted)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// True when the field will appear in the serialized output.
    pub fn is_present(&self) -> bool {
        !self.is_omitted()
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Omitted => Field::Omitted,
            Field::Null => Field::Null,
            Field::Value(v) => Field::Value(v),
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Omitted
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl From<&str> for Field<String> {
    fn from(value: &str) -> Self {
        Field::Value(value.to_string())
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Only reached when a field forgets `skip_serializing_if`.
            Field::Omitted | Field::Null => serializer.serialize_none(),
            Field::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Value(v),
            None => Field::Null,
        })
    }
}
