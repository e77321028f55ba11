//! Vector descriptor attached to vector-valued properties and operands

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Distance function used to compare two vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceFunction {
    Cosine,
    DotProduct,
    Euclidean,
}

impl DistanceFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceFunction::Cosine => "cosine",
            DistanceFunction::DotProduct => "dotproduct",
            DistanceFunction::Euclidean => "euclidean",
        }
    }
}

/// Element storage type of a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDataType {
    Float16,
    Float32,
    Uint8,
    Int8,
}

impl VectorDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorDataType::Float16 => "float16",
            VectorDataType::Float32 => "float32",
            VectorDataType::Uint8 => "uint8",
            VectorDataType::Int8 => "int8",
        }
    }

    /// Default storage type for a vector-valued CLR type.
    ///
    /// Looks at the element type of an array type: signed bytes map to
    /// `int8`, unsigned bytes to `uint8` and half floats to `float16`.
    /// Anything else, non-array types included, is `float32`.
    pub fn default_for(clr_type: &DataType) -> Self {
        match clr_type.element_type() {
            Some(DataType::Int8) => VectorDataType::Int8,
            Some(DataType::UInt8) => VectorDataType::Uint8,
            Some(DataType::Float16) => VectorDataType::Float16,
            _ => VectorDataType::Float32,
        }
    }
}

/// Vector descriptor: distance function, dimensionality and element type.
///
/// Immutable; use the `with_*` methods to derive a modified copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VectorType {
    pub distance_function: DistanceFunction,
    pub dimensions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<VectorDataType>,
}

impl VectorType {
    pub fn new(
        distance_function: DistanceFunction,
        dimensions: u64,
        data_type: Option<VectorDataType>,
    ) -> Self {
        Self {
            distance_function,
            dimensions,
            data_type,
        }
    }

    pub fn with_distance_function(self, distance_function: DistanceFunction) -> Self {
        Self {
            distance_function,
            ..self
        }
    }

    pub fn with_data_type(self, data_type: VectorDataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..self
        }
    }
}
