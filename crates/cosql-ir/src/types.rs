//! Type system for cosql IR

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::vector::{DistanceFunction, VectorDataType, VectorType};

/// Static type of an IR expression or runtime value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    // Primitives
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Decimal,

    // Text
    String,

    // Identifiers and temporal values (serialized as strings)
    Guid,
    DateTime,

    // Complex
    Array(Box<DataType>),
    Object,

    // Vector search
    DistanceFunction,
    VectorDataType,
    VectorType,

    // Special
    Null,
    Unknown,
}

impl DataType {
    pub fn array_of(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    /// Element type of an array type
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float16
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Array(element) => write!(f, "{}[]", element),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Runtime value: constant payloads and supplied parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    VectorType(VectorType),
    Enum(EnumValue),
    Object(BTreeMap<String, Value>),
}

/// Enum-valued constants understood by the vector search functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "enum", content = "value")]
pub enum EnumValue {
    DistanceFunction(DistanceFunction),
    VectorDataType(VectorDataType),
}

impl EnumValue {
    /// Wire spelling of the enum member
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumValue::DistanceFunction(f) => f.as_str(),
            EnumValue::VectorDataType(t) => t.as_str(),
        }
    }
}

impl Value {
    /// Semantic type inferred from the value itself
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int64,
            Value::Float(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::Array(items) => DataType::array_of(
                items.first().map(Value::data_type).unwrap_or(DataType::Unknown),
            ),
            Value::VectorType(_) => DataType::VectorType,
            Value::Enum(EnumValue::DistanceFunction(_)) => DataType::DistanceFunction,
            Value::Enum(EnumValue::VectorDataType(_)) => DataType::VectorDataType,
            Value::Object(_) => DataType::Object,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<VectorType> for Value {
    fn from(value: VectorType) -> Self {
        Value::VectorType(value)
    }
}

impl From<DistanceFunction> for Value {
    fn from(value: DistanceFunction) -> Self {
        Value::Enum(EnumValue::DistanceFunction(value))
    }
}

impl From<VectorDataType> for Value {
    fn from(value: VectorDataType) -> Self {
        Value::Enum(EnumValue::VectorDataType(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_data_type() {
        assert_eq!(Value::Int(3).data_type(), DataType::Int64);
        assert_eq!(Value::from("x").data_type(), DataType::String);
        assert_eq!(
            Value::from(vec![1.5_f64, 2.5]).data_type(),
            DataType::array_of(DataType::Float64)
        );
        assert_eq!(
            Value::Array(vec![]).data_type(),
            DataType::array_of(DataType::Unknown)
        );
        assert_eq!(
            Value::from(DistanceFunction::Cosine).data_type(),
            DataType::DistanceFunction
        );
    }

    #[test]
    fn test_value_json_shapes() {
        let parsed: Value = serde_json::from_str(r#"[1, "a", null, true, 2.5]"#).unwrap();
        assert_eq!(
            parsed,
            Value::Array(vec![
                Value::Int(1),
                Value::String("a".to_string()),
                Value::Null,
                Value::Bool(true),
                Value::Float(2.5),
            ])
        );

        let parsed: Value =
            serde_json::from_str(r#"{"enum": "DistanceFunction", "value": "dotproduct"}"#).unwrap();
        assert_eq!(parsed, Value::from(DistanceFunction::DotProduct));

        let parsed: Value =
            serde_json::from_str(r#"{"distanceFunction": "cosine", "dimensions": 10}"#).unwrap();
        assert_eq!(
            parsed,
            Value::VectorType(VectorType::new(DistanceFunction::Cosine, 10, None))
        );

        let parsed: Value = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(matches!(parsed, Value::Object(_)));
    }

    #[test]
    fn test_display_array_type() {
        assert_eq!(DataType::array_of(DataType::Int8).to_string(), "Int8[]");
    }
}
