//! Type mappings: how a value of a given type is rendered as a literal in
//! query text and as a wire-level parameter payload

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DataType, Value};
use crate::vector::VectorType;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Type mapping for {mapping} cannot render a value of type {value_type}")]
    UnexpectedValue {
        mapping: DataType,
        value_type: DataType,
    },

    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rendering strategy of a type mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MappingKind {
    /// Plain JSON scalars, arrays and objects
    Json,
    /// Distance function / vector data type enum members
    Enum,
    /// Vector-valued property or operand
    Vector { vector_type: VectorType },
    /// The vector descriptor itself, rendered as an object literal
    VectorDescriptor,
}

/// Associates a semantic type with its rendering strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapping {
    pub clr_type: DataType,
    #[serde(flatten)]
    pub kind: MappingKind,
}

impl TypeMapping {
    pub fn new(clr_type: DataType, kind: MappingKind) -> Self {
        Self { clr_type, kind }
    }

    pub fn json(clr_type: DataType) -> Self {
        Self::new(clr_type, MappingKind::Json)
    }

    pub fn vector(clr_type: DataType, vector_type: VectorType) -> Self {
        Self::new(clr_type, MappingKind::Vector { vector_type })
    }

    /// Vector descriptor carried by a vector mapping
    pub fn vector_type(&self) -> Option<&VectorType> {
        match &self.kind {
            MappingKind::Vector { vector_type } => Some(vector_type),
            _ => None,
        }
    }

    /// Render `value` as a literal in query text
    pub fn generate_constant(&self, value: &Value) -> Result<String, MappingError> {
        match (&self.kind, value) {
            (_, Value::Null) => Ok("null".to_string()),
            (MappingKind::Json, value) => Ok(serde_json::to_string(value)?),
            (MappingKind::Enum, Value::Enum(member)) => Ok(format!("\"{}\"", member.as_str())),
            (MappingKind::Vector { .. }, Value::Array(_)) => Ok(serde_json::to_string(value)?),
            (MappingKind::VectorDescriptor, Value::VectorType(vector_type)) => {
                Ok(descriptor_literal(vector_type))
            }
            (_, value) => Err(self.unexpected(value)),
        }
    }

    /// Render `value` as the payload sent alongside the query text
    pub fn generate_payload(&self, value: &Value) -> Result<serde_json::Value, MappingError> {
        match (&self.kind, value) {
            (_, Value::Null) => Ok(serde_json::Value::Null),
            (MappingKind::Json, value) => Ok(serde_json::to_value(value)?),
            (MappingKind::Enum, Value::Enum(member)) => {
                Ok(serde_json::Value::String(member.as_str().to_string()))
            }
            (MappingKind::Vector { .. }, Value::Array(_)) => Ok(serde_json::to_value(value)?),
            (MappingKind::VectorDescriptor, Value::VectorType(vector_type)) => {
                Ok(serde_json::to_value(vector_type)?)
            }
            (_, value) => Err(self.unexpected(value)),
        }
    }

    fn unexpected(&self, value: &Value) -> MappingError {
        MappingError::UnexpectedValue {
            mapping: self.clr_type.clone(),
            value_type: value.data_type(),
        }
    }
}

// Dimensions are configured on the container's vector policy and are not
// part of the inline literal.
fn descriptor_literal(vector_type: &VectorType) -> String {
    let mut literal = format!(
        "{{'distanceFunction':'{}'",
        vector_type.distance_function.as_str()
    );
    if let Some(data_type) = vector_type.data_type {
        literal.push_str(&format!(", 'dataType':'{}'", data_type.as_str()));
    }
    literal.push('}');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{DistanceFunction, VectorDataType};

    #[test]
    fn test_json_constants() {
        let mapping = TypeMapping::json(DataType::String);
        assert_eq!(mapping.generate_constant(&Value::from("Book")).unwrap(), "\"Book\"");
        assert_eq!(
            mapping.generate_constant(&Value::from("say \"hi\"")).unwrap(),
            r#""say \"hi\"""#
        );

        let mapping = TypeMapping::json(DataType::Int32);
        assert_eq!(mapping.generate_constant(&Value::Int(18)).unwrap(), "18");
        assert_eq!(mapping.generate_constant(&Value::Null).unwrap(), "null");

        let mapping = TypeMapping::json(DataType::Bool);
        assert_eq!(mapping.generate_constant(&Value::Bool(false)).unwrap(), "false");
    }

    #[test]
    fn test_descriptor_literal() {
        let mapping = TypeMapping::new(DataType::VectorType, MappingKind::VectorDescriptor);
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, Some(VectorDataType::Int8));

        assert_eq!(
            mapping.generate_constant(&Value::VectorType(vector_type)).unwrap(),
            "{'distanceFunction':'cosine', 'dataType':'int8'}"
        );

        let without_type = VectorType::new(DistanceFunction::DotProduct, 3, None);
        assert_eq!(
            mapping.generate_constant(&Value::VectorType(without_type)).unwrap(),
            "{'distanceFunction':'dotproduct'}"
        );
    }

    #[test]
    fn test_descriptor_rejects_other_values() {
        let mapping = TypeMapping::new(DataType::VectorType, MappingKind::VectorDescriptor);
        let err = mapping.generate_constant(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, MappingError::UnexpectedValue { .. }));
    }

    #[test]
    fn test_vector_payload() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 3, None);
        let mapping = TypeMapping::vector(DataType::array_of(DataType::Float32), vector_type);

        let payload = mapping
            .generate_payload(&Value::from(vec![0.5_f64, -1.0, 2.0]))
            .unwrap();
        assert_eq!(payload, serde_json::json!([0.5, -1.0, 2.0]));
        assert_eq!(mapping.vector_type(), Some(&vector_type));
    }

    #[test]
    fn test_enum_constant() {
        let mapping = TypeMapping::new(DataType::DistanceFunction, MappingKind::Enum);
        assert_eq!(
            mapping
                .generate_constant(&Value::from(DistanceFunction::Euclidean))
                .unwrap(),
            "\"euclidean\""
        );
    }
}
