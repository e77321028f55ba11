//! Type-mapping registry
//!
//! Pure lookup from a semantic type to the mapping that renders its literals
//! and parameter payloads. Populated once at provider bootstrap, then shared
//! read-only between generator instances.

use cosql_ir::{DataType, MappingKind, TypeMapping, VectorType};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No type mapping found for type {0}")]
    MappingNotFound(DataType),

    #[error("Type {clr_type} cannot be used as a vector: {reason}")]
    InvalidVectorType { clr_type: DataType, reason: String },
}

#[derive(Debug, Clone)]
pub struct TypeMappingSource {
    mappings: HashMap<DataType, TypeMapping>,
}

impl TypeMappingSource {
    pub fn new() -> Self {
        let mut source = Self {
            mappings: HashMap::new(),
        };
        source.register_builtins();
        source
    }

    fn register_builtins(&mut self) {
        // Scalars are sent and inlined as plain JSON
        for clr_type in [
            DataType::Bool,
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::Int64,
            DataType::UInt8,
            DataType::UInt16,
            DataType::UInt32,
            DataType::UInt64,
            DataType::Float16,
            DataType::Float32,
            DataType::Float64,
            DataType::Decimal,
            DataType::String,
            DataType::Guid,
            DataType::DateTime,
            DataType::Object,
            DataType::Null,
        ] {
            self.register(TypeMapping::json(clr_type));
        }

        // Vector search enums
        self.register(TypeMapping::new(DataType::DistanceFunction, MappingKind::Enum));
        self.register(TypeMapping::new(DataType::VectorDataType, MappingKind::Enum));

        // Vector descriptor, inlined as an object literal
        self.register(TypeMapping::new(
            DataType::VectorType,
            MappingKind::VectorDescriptor,
        ));
    }

    /// Register (or replace) the mapping for `mapping.clr_type`
    pub fn register(&mut self, mapping: TypeMapping) {
        self.mappings.insert(mapping.clr_type.clone(), mapping);
    }

    /// Mapping for a semantic type; arrays of mapped element types get a JSON
    /// array mapping
    pub fn find_mapping(&self, clr_type: &DataType) -> Option<TypeMapping> {
        if let Some(mapping) = self.mappings.get(clr_type) {
            return Some(mapping.clone());
        }

        match clr_type {
            DataType::Array(element) => match element.as_ref() {
                // Empty arrays carry no element type
                DataType::Unknown => Some(TypeMapping::json(clr_type.clone())),
                element => self
                    .find_mapping(element)
                    .filter(|mapping| mapping.kind == MappingKind::Json)
                    .map(|_| TypeMapping::json(clr_type.clone())),
            },
            _ => None,
        }
    }

    pub fn require_mapping(&self, clr_type: &DataType) -> Result<TypeMapping, RegistryError> {
        self.find_mapping(clr_type)
            .ok_or_else(|| RegistryError::MappingNotFound(clr_type.clone()))
    }

    /// Mapping for a property or operand configured as a vector
    pub fn find_vector_mapping(
        &self,
        clr_type: &DataType,
        vector_type: VectorType,
    ) -> Result<TypeMapping, RegistryError> {
        let element = clr_type.element_type().ok_or_else(|| {
            debug!(clr_type = %clr_type, "vector mapping requested for non-array type");
            RegistryError::InvalidVectorType {
                clr_type: clr_type.clone(),
                reason: "vectors must be arrays".to_string(),
            }
        })?;

        if !element.is_numeric() {
            return Err(RegistryError::InvalidVectorType {
                clr_type: clr_type.clone(),
                reason: format!("element type {} is not numeric", element),
            });
        }

        Ok(TypeMapping::vector(clr_type.clone(), vector_type))
    }
}

impl Default for TypeMappingSource {
    fn default() -> Self {
        Self::new()
    }
}
