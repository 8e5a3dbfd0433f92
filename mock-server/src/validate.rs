use axum::{extract::rejection::JsonRejection, Json};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Reads fields out of a JSON request body, collecting every problem
/// instead of stopping at the first.
pub struct Fields {
    object: Map<String, Value>,
    prefix: String,
    errors: Vec<(String, String)>,
}

impl Fields {
    pub fn from_body(body: Result<Json<Map<String, Value>>, JsonRejection>) -> Result<Self, ApiError> {
        let Json(object) = body.map_err(|rejection| ApiError::malformed(rejection.body_text()))?;
        Ok(Self::new(object, ""))
    }

    fn new(object: Map<String, Value>, prefix: &str) -> Self {
        Self {
            object,
            prefix: prefix.to_string(),
            errors: Vec::new(),
        }
    }

    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.prefix)
        }
    }

    pub fn fail(&mut self, field: &str, message: &str) {
        let path = self.path(field);
        self.errors.push((path, message.to_string()));
    }

    pub fn has(&self, field: &str) -> bool {
        self.object.contains_key(field)
    }

    /// The raw value, `None` when missing or null.
    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    pub fn required_str(&mut self, field: &str) -> String {
        match self.object.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => {
                self.fail(field, "must not be blank");
                String::new()
            }
            Some(Value::Null) | None => {
                self.fail(field, "is required");
                String::new()
            }
            Some(_) => {
                self.fail(field, "must be a string");
                String::new()
            }
        }
    }

    pub fn optional_str(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => {
                self.fail(field, "must be a string");
                None
            }
        }
    }

    pub fn required_i64(&mut self, field: &str) -> i64 {
        match self.object.get(field) {
            Some(value) if value.is_i64() => value.as_i64().unwrap_or_default(),
            Some(Value::Null) | None => {
                self.fail(field, "is required");
                0
            }
            Some(_) => {
                self.fail(field, "must be an integer");
                0
            }
        }
    }

    pub fn optional_bool(&mut self, field: &str) -> Option<bool> {
        match self.object.get(field) {
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Null) | None => None,
            Some(_) => {
                self.fail(field, "must be a boolean");
                None
            }
        }
    }

    /// `field` must be one of `allowed`; missing yields `default`.
    pub fn one_of(&mut self, field: &str, allowed: &[&str], default: Option<&str>) -> String {
        match (self.object.get(field), default) {
            (Some(Value::String(s)), _) if allowed.contains(&s.as_str()) => s.clone(),
            (Some(Value::Null) | None, Some(default)) => default.to_string(),
            (Some(Value::Null) | None, None) => {
                self.fail(field, "is required");
                String::new()
            }
            _ => {
                self.fail(field, &format!("must be one of {}", allowed.join(", ")));
                String::new()
            }
        }
    }

    /// A nested object validated with the same rules, errors reported as
    /// `parent.child`.
    pub fn object(&mut self, field: &str, required: bool, check: impl FnOnce(&mut Fields)) -> Option<Value> {
        match self.object.get(field).cloned() {
            Some(Value::Object(object)) => {
                let mut nested = Fields::new(object, &self.path(field));
                check(&mut nested);
                self.errors.append(&mut nested.errors);
                Some(Value::Object(nested.object))
            }
            Some(Value::Null) | None => {
                if required {
                    self.fail(field, "is required");
                }
                None
            }
            Some(_) => {
                self.fail(field, "must be an object");
                None
            }
        }
    }

    pub fn finish(self) -> Result<Map<String, Value>, ApiError> {
        if self.errors.is_empty() {
            Ok(self.object)
        } else {
            Err(ApiError::invalid_parameters(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        Fields::new(value.as_object().cloned().unwrap(), "")
    }

    #[test]
    fn collects_every_error() {
        let mut body = fields(json!({"amount": "ten", "description": ""}));
        body.required_str("account_id");
        body.required_i64("amount");
        body.required_str("description");
        let err = body.finish().unwrap_err();
        assert_eq!(
            err.errors,
            vec![
                ("account_id".to_string(), "is required".to_string()),
                ("amount".to_string(), "must be an integer".to_string()),
                ("description".to_string(), "must not be blank".to_string()),
            ]
        );
    }

    #[test]
    fn nested_errors_use_dotted_paths() {
        let mut body = fields(json!({"billing_address": {"line1": "33 Liberty Street"}}));
        body.object("billing_address", false, |address| {
            address.required_str("line1");
            address.required_str("city");
        });
        let err = body.finish().unwrap_err();
        assert_eq!(err.errors, vec![("billing_address.city".to_string(), "is required".to_string())]);
    }

    #[test]
    fn one_of_falls_back_to_default() {
        let mut body = fields(json!({}));
        let code = body.one_of("reason", &["no_account", "account_closed"], Some("no_account"));
        assert_eq!(code, "no_account");
        assert!(body.finish().is_ok());
    }
}
