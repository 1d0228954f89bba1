// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Normalization of backend metadata values into plain values.

use crate::backend::RawValue;
use std::fmt;

/// A normalized metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A number with its unit symbol, e.g. `(0.2, "µm")`.
    Quantity(Box<Value>, String),
    /// A value none of the conversions understood, named by its backend type.
    Opaque(String),
}

impl Value {
    /// Numeric content of `Int`, `Float` and `Quantity` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Quantity(v, _) => v.as_f64(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Quantity(v, unit) => write!(f, "{v} {unit}"),
            Value::Opaque(t) => write!(f, "<{t}>"),
        }
    }
}

/// Which conversion path produced a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// Already a string, bool or integer.
    Plain,
    /// Unwrapped through the value getter, plain afterwards.
    Getter,
    /// Unwrapped through the value getter, then converted as a number.
    GetterNumeric,
    /// A unit-bearing quantity.
    Unit,
    /// Converted as a number (or kept as string when it isn't one).
    Numeric,
    /// Left as is.
    Unconvertible,
}

/// A converted value together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub value: Value,
    pub kind: ConversionKind,
}

/// Normalize a backend value.
///
/// The conversion paths are tried in order: plain values pass through,
/// wrapped values are unwrapped, quantities become `(number, unit)` pairs and
/// everything else goes through [`convert_numeric_field`]. A value with no
/// string form is kept as [`Value::Opaque`] and a warning is logged.
///
/// ```
/// # use mmdata::{convert_value, backend::RawValue, Value, ConversionKind};
/// let c = convert_value(Some(&RawValue::quantity(0.9, "µm")));
/// assert_eq!(c.value, Value::Quantity(Box::new(Value::Float(0.9)), "µm".into()));
/// assert_eq!(c.kind, ConversionKind::Unit);
/// ```
pub fn convert_value(raw: Option<&RawValue>) -> Converted {
    let (value, kind) = match raw {
        Some(RawValue::Str(s)) => (Value::Str(s.clone()), ConversionKind::Plain),
        Some(RawValue::Bool(b)) => (Value::Bool(*b), ConversionKind::Plain),
        Some(RawValue::Int(i)) => (Value::Int(*i), ConversionKind::Plain),
        Some(RawValue::Wrapped(inner)) => match inner.as_ref() {
            RawValue::Str(s) => (Value::Str(s.clone()), ConversionKind::Getter),
            RawValue::Bool(b) => (Value::Bool(*b), ConversionKind::Getter),
            RawValue::Int(i) => (Value::Int(*i), ConversionKind::Getter),
            RawValue::Float(f) => (Value::Float(*f), ConversionKind::Getter),
            other => (numeric_or_opaque(other), ConversionKind::GetterNumeric),
        },
        Some(RawValue::Quantity { value, unit }) => (
            Value::Quantity(
                Box::new(convert_numeric_field(Some(value)).unwrap_or(Value::Null)),
                unit.clone(),
            ),
            ConversionKind::Unit,
        ),
        Some(RawValue::Opaque { type_name, text }) if text.is_none() => {
            log::warn!("unconvertible metadata value of type {type_name}");
            (Value::Opaque(type_name.clone()), ConversionKind::Unconvertible)
        }
        Some(other) => (numeric_or_opaque(other), ConversionKind::Numeric),
        None => (Value::Null, ConversionKind::Numeric),
    };
    Converted { value, kind }
}

fn numeric_or_opaque(raw: &RawValue) -> Value {
    match convert_numeric_field(Some(raw)) {
        Some(v) => v,
        None => match raw {
            RawValue::Opaque { type_name, .. } => {
                log::warn!("unconvertible metadata value of type {type_name}");
                Value::Opaque(type_name.clone())
            }
            _ => Value::Null,
        },
    }
}

/// Convert a backend number through its string form.
///
/// Reading numbers through the backend's own float accessors is not exact
/// (`0.9` comes back as `0.8999999761581421`); parsing the text form is.
/// Returns `None` for a missing field, and for a value with no string form.
///
/// ```
/// # use mmdata::{convert_numeric_field, backend::RawValue, Value};
/// assert_eq!(convert_numeric_field(Some(&RawValue::from("976"))), Some(Value::Int(976)));
/// assert_eq!(convert_numeric_field(Some(&RawValue::from("0.976"))), Some(Value::Float(0.976)));
/// assert_eq!(convert_numeric_field(None), None);
/// ```
pub fn convert_numeric_field(field: Option<&RawValue>) -> Option<Value> {
    let text = field?.to_text()?;
    Some(parse_numeric(&text))
}

/// Integer if `text` parses as one, else float if it parses as one, else the text itself.
pub fn parse_numeric(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = text.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::Str(text.to_string())
    }
}
