//! Schema validation for untrusted model output.
//!
//! Stage two of the pipeline: a parsed JSON candidate is checked against the
//! shape a caller expects. Success yields a typed value; failure yields the
//! JSON path of the first offending field and the reason. Nothing here panics,
//! callers branch on the `Result`.

pub mod extract;

use serde_json::{Map, Value};
use thiserror::Error;

pub use extract::{extract_json_object, ExtractError};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {reason}")]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Implemented by every type that may be built from model output.
pub trait Schema: Sized {
    fn from_json(value: &Value) -> Result<Self, SchemaError>;
}

/// Validates a candidate against `T`'s shape.
pub fn validate<T: Schema>(value: &Value) -> Result<T, SchemaError> {
    T::from_json(value)
}

/// Failure of either pipeline stage.
#[derive(Debug, Error)]
pub enum ModelOutputError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("schema validation failed at {0}")]
    Schema(#[from] SchemaError),
}

/// Runs both stages: raw model text → candidate → validated value.
pub fn parse_model_output<T: Schema>(text: &str) -> Result<T, ModelOutputError> {
    let candidate = extract_json_object(text)?;
    Ok(validate::<T>(&candidate)?)
}

/// Path-tracking reader over a JSON object.
pub struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn root(value: &'a Value) -> Result<Self, SchemaError> {
        Self::at(value, "$")
    }

    fn at(value: &'a Value, path: impl Into<String>) -> Result<Self, SchemaError> {
        let path = path.into();
        match value.as_object() {
            Some(map) => Ok(Self { path, map }),
            None => Err(SchemaError::new(path, "expected object")),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn child(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    /// Present and not null.
    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value, SchemaError> {
        self.present(key)
            .ok_or_else(|| SchemaError::new(self.child(key), "required field is missing"))
    }

    /// A non-blank string.
    pub fn string(&self, key: &str) -> Result<String, SchemaError> {
        let value = self.required(key)?;
        non_blank(value, &self.child(key))
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, SchemaError> {
        match self.present(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| SchemaError::new(self.child(key), "expected string")),
        }
    }

    /// An integer score in `0..=100`. Whole-valued floats (`82.0`) are accepted.
    pub fn score(&self, key: &str) -> Result<u8, SchemaError> {
        let value = self.required(key)?;
        as_score(value, &self.child(key))
    }

    /// A number in `[0, 1]`.
    pub fn unit_interval(&self, key: &str) -> Result<f64, SchemaError> {
        let path = self.child(key);
        let n = self
            .required(key)?
            .as_f64()
            .ok_or_else(|| SchemaError::new(&path, "expected number"))?;
        if !(0.0..=1.0).contains(&n) {
            return Err(SchemaError::new(path, format!("{n} is outside [0, 1]")));
        }
        Ok(n)
    }

    /// An array of strings. A missing field is an error; an empty array is not.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, SchemaError> {
        let path = self.child(key);
        let items = self
            .required(key)?
            .as_array()
            .ok_or_else(|| SchemaError::new(&path, "expected array of strings"))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| non_blank(item, &format!("{path}[{i}]")))
            .collect()
    }

    /// Like `string_list`, but a missing field reads as empty.
    pub fn opt_string_list(&self, key: &str) -> Result<Vec<String>, SchemaError> {
        if self.present(key).is_none() {
            return Ok(Vec::new());
        }
        self.string_list(key)
    }

    pub fn opt_object(&self, key: &str) -> Result<Option<Fields<'a>>, SchemaError> {
        self.present(key)
            .map(|value| Fields::at(value, self.child(key)))
            .transpose()
    }

    /// An array of objects.
    pub fn objects(&self, key: &str) -> Result<Vec<Fields<'a>>, SchemaError> {
        let path = self.child(key);
        let items = self
            .required(key)?
            .as_array()
            .ok_or_else(|| SchemaError::new(&path, "expected array of objects"))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| Fields::at(item, format!("{path}[{i}]")))
            .collect()
    }

    /// Builds an error located at `key` for checks callers perform themselves.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::new(self.child(key), reason)
    }
}

fn non_blank(value: &Value, path: &str) -> Result<String, SchemaError> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(SchemaError::new(path, "expected non-empty string")),
        None => Err(SchemaError::new(path, "expected string")),
    }
}

fn as_score(value: &Value, path: &str) -> Result<u8, SchemaError> {
    let n = value
        .as_f64()
        .ok_or_else(|| SchemaError::new(path, "expected integer in 0..=100"))?;
    if n.fract() != 0.0 || !(0.0..=100.0).contains(&n) {
        return Err(SchemaError::new(
            path,
            format!("expected integer in 0..=100, got {n}"),
        ));
    }
    Ok(n as u8)
}
