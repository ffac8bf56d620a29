//! Typed property values
//!
//! A stored value is always text (`data`) tagged with a [`ValueType`]. The
//! typed view of that text is [`TypedValue`], a closed sum type:
//! - `String`: stored verbatim
//! - `Int`: base-10 `i64`
//! - `Float`: `f64` rendered with six fractional digits
//! - `Bool`: `true` / `false`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Float,
    Bool,
}

impl ValueType {
    /// Integer code persisted in the `value_type` column
    pub fn code(&self) -> i64 {
        match self {
            ValueType::String => 0,
            ValueType::Int => 1,
            ValueType::Float => 2,
            ValueType::Bool => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(ValueType::String),
            1 => Ok(ValueType::Int),
            2 => Ok(ValueType::Float),
            3 => Ok(ValueType::Bool),
            other => Err(DecodeError::UnknownType(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
        }
    }
}

impl FromStr for ValueType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, DecodeError> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ValueType::String),
            "int" | "integer" | "i64" => Ok(ValueType::Int),
            "float" | "double" | "f64" => Ok(ValueType::Float),
            "bool" | "boolean" => Ok(ValueType::Bool),
            _ => Err(DecodeError::UnknownTypeName(s.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored text does not parse as its declared type.
///
/// Raised when reading rows back; indicates a corrupted or hand-edited row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("stored value {data:?} is not a valid {expected}")]
    Malformed { expected: ValueType, data: String },

    #[error("unknown value type code {0}")]
    UnknownType(i64),

    #[error("unknown value type name {0:?}")]
    UnknownTypeName(String),

    #[error("unknown environment code {0}")]
    UnknownEnvironment(i64),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

/// A dynamically-typed input has no value representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {kind} into a property value")]
pub struct ConversionError {
    pub kind: String,
}

impl ConversionError {
    fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Typed view of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::String(_) => ValueType::String,
            TypedValue::Int(_) => ValueType::Int,
            TypedValue::Float(_) => ValueType::Float,
            TypedValue::Bool(_) => ValueType::Bool,
        }
    }

    /// Canonical text encoding, as persisted in `data`
    pub fn encode(&self) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Float(f) => format!("{:.6}", f),
            TypedValue::Bool(b) => b.to_string(),
        }
    }

    /// Parse `data` as `value_type`.
    pub fn parse(value_type: ValueType, data: &str) -> Result<Self, DecodeError> {
        let malformed = || DecodeError::Malformed {
            expected: value_type,
            data: data.to_string(),
        };

        match value_type {
            ValueType::String => Ok(TypedValue::String(data.to_string())),
            ValueType::Int => data.parse().map(TypedValue::Int).map_err(|_| malformed()),
            ValueType::Float => data.parse().map(TypedValue::Float).map_err(|_| malformed()),
            ValueType::Bool => match data {
                "true" => Ok(TypedValue::Bool(true)),
                "false" => Ok(TypedValue::Bool(false)),
                _ => Err(malformed()),
            },
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::Int(v.into())
    }
}

impl From<u32> for TypedValue {
    fn from(v: u32) -> Self {
        TypedValue::Int(v.into())
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int(v)
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        TypedValue::Float(v.into())
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Float(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl TryFrom<&toml::Value> for TypedValue {
    type Error = ConversionError;

    fn try_from(value: &toml::Value) -> Result<Self, ConversionError> {
        match value {
            toml::Value::String(s) => Ok(TypedValue::String(s.clone())),
            toml::Value::Integer(i) => Ok(TypedValue::Int(*i)),
            toml::Value::Float(f) => Ok(TypedValue::Float(*f)),
            toml::Value::Boolean(b) => Ok(TypedValue::Bool(*b)),
            toml::Value::Datetime(_) => Err(ConversionError::new("toml datetime")),
            toml::Value::Array(_) => Err(ConversionError::new("toml array")),
            toml::Value::Table(_) => Err(ConversionError::new("toml table")),
        }
    }
}

impl TryFrom<&serde_json::Value> for TypedValue {
    type Error = ConversionError;

    fn try_from(value: &serde_json::Value) -> Result<Self, ConversionError> {
        match value {
            serde_json::Value::String(s) => Ok(TypedValue::String(s.clone())),
            serde_json::Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(TypedValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(TypedValue::Float(f))
                } else {
                    Err(ConversionError::new(format!("json number {}", n)))
                }
            }
            serde_json::Value::Null => Err(ConversionError::new("json null")),
            serde_json::Value::Array(_) => Err(ConversionError::new("json array")),
            serde_json::Value::Object(_) => Err(ConversionError::new("json object")),
        }
    }
}

/// A single stored value of a property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Value {
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    pub data: String,
    /// Requires encryption at rest
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secret: bool,
}

impl Value {
    pub fn new(value: impl Into<TypedValue>) -> Self {
        let typed = value.into();
        Self {
            value_type: typed.value_type(),
            data: typed.encode(),
            secret: false,
        }
    }

    /// A value flagged for encryption before it leaves the client
    pub fn secret(value: impl Into<TypedValue>) -> Self {
        Self {
            secret: true,
            ..Self::new(value)
        }
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        Self::new(TypedValue::String(v.into()))
    }

    pub fn from_int(v: i64) -> Self {
        Self::new(v)
    }

    pub fn from_float(v: f64) -> Self {
        Self::new(v)
    }

    pub fn from_bool(v: bool) -> Self {
        Self::new(v)
    }

    /// Convert a dynamically-typed TOML value.
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConversionError> {
        TypedValue::try_from(value).map(Self::new)
    }

    /// Convert a dynamically-typed JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConversionError> {
        TypedValue::try_from(value).map(Self::new)
    }

    /// Decode `data` according to the declared type.
    pub fn decode(&self) -> Result<TypedValue, DecodeError> {
        TypedValue::parse(self.value_type, &self.data)
    }

    /// Canonical rendering of the decoded value.
    pub fn as_display_string(&self) -> Result<String, DecodeError> {
        self.decode().map(|v| v.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_encoding() {
        assert_eq!(Value::from_string("foo").data, "foo");
        assert_eq!(Value::from_int(-42).data, "-42");
        assert_eq!(Value::from_float(1.5).data, "1.500000");
        assert_eq!(Value::new(2.25f32).data, "2.250000");
        assert_eq!(Value::from_bool(false).data, "false");
        assert_eq!(Value::new(7).value_type, ValueType::Int);
    }

    #[test]
    fn test_decode_per_type() {
        assert_eq!(Value::from_int(10).decode().unwrap(), TypedValue::Int(10));
        assert_eq!(Value::from_float(0.5).decode().unwrap(), TypedValue::Float(0.5));
        assert_eq!(Value::from_bool(true).decode().unwrap(), TypedValue::Bool(true));
    }

    #[test]
    fn test_decode_corrupted_data_is_an_error() {
        let value = Value {
            value_type: ValueType::Int,
            data: "not-a-number".to_string(),
            secret: false,
        };

        let err = value.decode().unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { expected: ValueType::Int, .. }));

        let value = Value {
            value_type: ValueType::Bool,
            data: "yes".to_string(),
            secret: false,
        };
        assert!(value.decode().is_err());
    }

    #[test]
    fn test_dynamic_conversion_rejects_unsupported() {
        let array = toml::Value::Array(vec![toml::Value::Integer(1)]);
        let err = Value::from_toml(&array).unwrap_err();
        assert_eq!(err.kind, "toml array");

        assert!(Value::from_json(&serde_json::Value::Null).is_err());
        assert_eq!(
            Value::from_json(&serde_json::json!(3)).unwrap(),
            Value::from_int(3)
        );
    }

    #[test]
    fn test_type_codes() {
        for t in [ValueType::String, ValueType::Int, ValueType::Float, ValueType::Bool] {
            assert_eq!(ValueType::from_code(t.code()).unwrap(), t);
        }
        assert_eq!(ValueType::from_code(9), Err(DecodeError::UnknownType(9)));
        assert_eq!("integer".parse::<ValueType>().unwrap(), ValueType::Int);
    }

    #[test]
    fn test_secret_flag_serialization() {
        let json = serde_json::to_string(&Value::from_string("x")).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"type\":\"STRING\""));

        let json = serde_json::to_string(&Value::secret("x")).unwrap();
        assert!(json.contains("\"secret\":true"));
    }
}
