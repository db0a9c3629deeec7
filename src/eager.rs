//! Eager, local accessor over `serde_json::Value`.
//!
//! Here the target expression *is* the converted value; applying a converter
//! with a [`JsonAccessor`] behaves like a conventional deserializer that
//! renames fields on the way through.

use serde_json::{Map, Value};

use crate::accessor::DynamicAccessor;
use crate::compiler::Converter;
use crate::error::{ConversionError, ConversionErrorKind};
use crate::schema::Literal;

#[derive(Debug, Clone, Copy)]
pub struct JsonAccessor<'a> {
    value: &'a Value,
}

impl<'a> JsonAccessor<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }
    pub fn value(&self) -> &'a Value {
        self.value
    }
}

/// Convert `source` with `converter`.
pub fn convert_value(converter: &Converter, source: &Value) -> Result<Value, ConversionError> {
    converter.apply(&JsonAccessor::new(source))
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionError {
    ConversionError::new(ConversionErrorKind::TypeMismatch {
        expected,
        found: kind_name(found),
    })
}

impl<'a> DynamicAccessor for JsonAccessor<'a> {
    type Expr = Value;

    fn field(&self, name: &str) -> Result<Self, ConversionError> {
        match self.value {
            Value::Object(map) => map
                .get(name)
                .map(JsonAccessor::new)
                .ok_or_else(|| ConversionError::new(ConversionErrorKind::MissingField(name.to_owned()))),
            other => Err(mismatch("object", other)),
        }
    }

    fn index(&self, index: usize) -> Result<Self, ConversionError> {
        match self.value {
            Value::Array(items) => items.get(index).map(JsonAccessor::new).ok_or_else(|| {
                ConversionError::new(ConversionErrorKind::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
            }),
            other => Err(mismatch("array", other)),
        }
    }

    fn map_sequence<F>(&self, mut each: F) -> Result<Value, ConversionError>
    where
        F: FnMut(usize, &Self) -> Result<Value, ConversionError>,
    {
        match self.value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| each(i, &JsonAccessor::new(item)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(mismatch("array", other)),
        }
    }

    fn unless_null<F>(&self, present: F) -> Result<Value, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Value, ConversionError>,
    {
        if self.value.is_null() {
            Ok(Value::Null)
        } else {
            present(self)
        }
    }

    fn switch<F>(&self, tags: &[Literal], mut arm: F) -> Result<Value, ConversionError>
    where
        F: FnMut(usize) -> Result<Value, ConversionError>,
    {
        match tags.iter().position(|tag| tag.matches(self.value)) {
            Some(i) => arm(i),
            None => Ok(Value::Null),
        }
    }

    fn named<F>(&self, _name: &str, _recursive: bool, body: F) -> Result<Value, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Value, ConversionError>,
    {
        body(self)
    }

    fn raw(&self) -> Value {
        self.value.clone()
    }

    fn null(&self) -> Value {
        Value::Null
    }

    fn record(&self, fields: Vec<(String, Value)>) -> Value {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    }

    fn tuple(&self, elements: Vec<Value>) -> Value {
        Value::Array(elements)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
