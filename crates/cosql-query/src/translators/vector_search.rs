//! `VectorDistance` translation

use cosql_ir::{DataType, EnumValue, SqlExpression, TypeMapping, Value, VectorDataType};
use cosql_registry::{RegistryError, TypeMappingSource};
use std::sync::Arc;
use tracing::debug;

use super::{MethodCallTranslator, MethodInfo};
use crate::error::{InternalError, QueryError, UserError};

const FUNCTION_NAME: &str = "VectorDistance";

/// `CosmosDbFunctions.VectorDistance(functions, vector1, vector2 [, useBruteForce [, distanceFunction, dataType]])`
pub const VECTOR_DISTANCE: MethodInfo = MethodInfo::new("CosmosDbFunctions", FUNCTION_NAME);

pub struct VectorSearchTranslator {
    type_mapping_source: Arc<TypeMappingSource>,
}

impl VectorSearchTranslator {
    pub fn new(type_mapping_source: Arc<TypeMappingSource>) -> Self {
        Self { type_mapping_source }
    }

    fn mapping_for(&self, clr_type: DataType) -> Result<TypeMapping, RegistryError> {
        self.type_mapping_source.require_mapping(&clr_type)
    }
}

impl MethodCallTranslator for VectorSearchTranslator {
    fn translate(
        &self,
        _instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Result<Option<SqlExpression>, QueryError> {
        if *method != VECTOR_DISTANCE {
            return Ok(None);
        }

        // arguments[0] is the functions receiver
        if !matches!(arguments.len(), 3 | 4 | 6) {
            return Err(InternalError::UnexpectedArgumentCount {
                function: FUNCTION_NAME,
                count: arguments.len(),
            }
            .into());
        }

        let vector_mapping = arguments[1..3]
            .iter()
            .filter_map(SqlExpression::type_mapping)
            .find(|mapping| mapping.vector_type().is_some())
            .cloned()
            .ok_or(UserError::VectorSearchRequiresVector)?;
        let mut vector_type = *vector_mapping
            .vector_type()
            .ok_or(UserError::VectorSearchRequiresVector)?;

        let brute_force = match arguments.get(3) {
            Some(flag @ SqlExpression::Constant { value: Value::Bool(_), .. }) => flag.clone(),
            Some(_) => {
                return Err(UserError::ArgumentNotConstant {
                    argument: "useBruteForce",
                    function: FUNCTION_NAME,
                }
                .into())
            }
            None => SqlExpression::constant(false, DataType::Bool, Some(self.mapping_for(DataType::Bool)?)),
        };

        if arguments.len() == 6 {
            match &arguments[4] {
                SqlExpression::Constant {
                    value: Value::Enum(EnumValue::DistanceFunction(distance_function)),
                    ..
                } => vector_type = vector_type.with_distance_function(*distance_function),
                _ => {
                    return Err(UserError::ArgumentNotConstant {
                        argument: "distanceFunction",
                        function: FUNCTION_NAME,
                    }
                    .into())
                }
            }

            match &arguments[5] {
                SqlExpression::Constant {
                    value: Value::Enum(EnumValue::VectorDataType(data_type)),
                    ..
                } => vector_type = vector_type.with_data_type(*data_type),
                _ => {
                    return Err(UserError::ArgumentNotConstant {
                        argument: "dataType",
                        function: FUNCTION_NAME,
                    }
                    .into())
                }
            }
        }

        if vector_type.data_type.is_none() {
            vector_type = vector_type.with_data_type(VectorDataType::default_for(&vector_mapping.clr_type));
        }

        debug!(
            distance_function = vector_type.distance_function.as_str(),
            dimensions = vector_type.dimensions,
            "Translated VectorDistance"
        );

        let descriptor = SqlExpression::constant(
            vector_type,
            DataType::VectorType,
            Some(self.mapping_for(DataType::VectorType)?),
        );

        Ok(Some(SqlExpression::function(
            FUNCTION_NAME,
            vec![
                arguments[1].clone().with_type_mapping(vector_mapping.clone()),
                arguments[2].clone().with_type_mapping(vector_mapping),
                brute_force,
                descriptor,
            ],
            DataType::Float64,
            None,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosql_ir::{DistanceFunction, VectorType};

    fn translator() -> VectorSearchTranslator {
        VectorSearchTranslator::new(Arc::new(TypeMappingSource::default()))
    }

    fn receiver() -> SqlExpression {
        SqlExpression::constant(Value::Null, DataType::Object, None)
    }

    fn vector_a(vector_type: VectorType) -> SqlExpression {
        SqlExpression::key_access(
            SqlExpression::object_reference("c"),
            "Embedding",
            DataType::array_of(DataType::Int8),
            Some(TypeMapping::vector(DataType::array_of(DataType::Int8), vector_type)),
        )
    }

    fn vector_b() -> SqlExpression {
        SqlExpression::parameter("__query_vector_0", DataType::array_of(DataType::Int8), None)
    }

    fn bool_constant(value: bool) -> SqlExpression {
        SqlExpression::constant(value, DataType::Bool, Some(TypeMapping::json(DataType::Bool)))
    }

    #[test]
    fn test_default_arguments() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, None);
        let mapping = TypeMapping::vector(DataType::array_of(DataType::Int8), vector_type);

        let translated = translator()
            .translate(None, &VECTOR_DISTANCE, &[receiver(), vector_a(vector_type), vector_b()])
            .unwrap()
            .unwrap();

        let expected_type = VectorType::new(DistanceFunction::Cosine, 10, Some(VectorDataType::Int8));
        let source = TypeMappingSource::default();
        assert_eq!(
            translated,
            SqlExpression::function(
                "VectorDistance",
                vec![
                    vector_a(vector_type),
                    vector_b().with_type_mapping(mapping),
                    SqlExpression::constant(false, DataType::Bool, source.find_mapping(&DataType::Bool)),
                    SqlExpression::constant(expected_type, DataType::VectorType, source.find_mapping(&DataType::VectorType)),
                ],
                DataType::Float64,
                None,
            )
        );
    }

    #[test]
    fn test_vector_on_second_argument() {
        let vector_type = VectorType::new(DistanceFunction::Euclidean, 3, Some(VectorDataType::Float32));
        let query_vector = SqlExpression::parameter("__query_vector_0", DataType::array_of(DataType::Float32), None);

        let translated = translator()
            .translate(
                None,
                &VECTOR_DISTANCE,
                &[receiver(), query_vector, vector_a(vector_type), bool_constant(true)],
            )
            .unwrap()
            .unwrap();

        let SqlExpression::Function { arguments, .. } = translated else {
            panic!("expected a function");
        };
        assert_eq!(arguments[0].type_mapping().and_then(TypeMapping::vector_type), Some(&vector_type));
        assert_eq!(arguments[2], bool_constant(true));
    }

    #[test]
    fn test_non_constant_flag() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, None);
        let flag = SqlExpression::key_access(SqlExpression::object_reference("c"), "Exact", DataType::Bool, None);

        let err = translator()
            .translate(None, &VECTOR_DISTANCE, &[receiver(), vector_a(vector_type), vector_b(), flag])
            .unwrap_err();

        assert!(err.is_user_error());
        assert!(err.to_string().contains("useBruteForce"));
    }

    #[test]
    fn test_explicit_descriptor() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, None);
        let arguments = [
            receiver(),
            vector_a(vector_type),
            vector_b(),
            bool_constant(false),
            SqlExpression::constant(DistanceFunction::DotProduct, DataType::DistanceFunction, None),
            SqlExpression::constant(VectorDataType::Uint8, DataType::VectorDataType, None),
        ];

        let translated = translator().translate(None, &VECTOR_DISTANCE, &arguments).unwrap().unwrap();
        let SqlExpression::Function { arguments, .. } = translated else {
            panic!("expected a function");
        };
        let SqlExpression::Constant { value, .. } = &arguments[3] else {
            panic!("expected a constant descriptor");
        };
        assert_eq!(
            value,
            &Value::VectorType(VectorType::new(DistanceFunction::DotProduct, 10, Some(VectorDataType::Uint8)))
        );
    }

    #[test]
    fn test_non_constant_descriptor_parts() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, None);
        let mut arguments = vec![
            receiver(),
            vector_a(vector_type),
            vector_b(),
            bool_constant(false),
            SqlExpression::parameter("__fn_0", DataType::DistanceFunction, None),
            SqlExpression::constant(VectorDataType::Int8, DataType::VectorDataType, None),
        ];

        let err = translator().translate(None, &VECTOR_DISTANCE, &arguments).unwrap_err();
        assert!(err.to_string().contains("distanceFunction"));

        arguments[4] = SqlExpression::constant(DistanceFunction::Cosine, DataType::DistanceFunction, None);
        arguments[5] = SqlExpression::parameter("__type_0", DataType::VectorDataType, None);
        let err = translator().translate(None, &VECTOR_DISTANCE, &arguments).unwrap_err();
        assert!(err.to_string().contains("dataType"));
    }

    #[test]
    fn test_requires_vector() {
        let plain = SqlExpression::key_access(
            SqlExpression::object_reference("c"),
            "Scores",
            DataType::array_of(DataType::Float32),
            Some(TypeMapping::json(DataType::array_of(DataType::Float32))),
        );

        let err = translator()
            .translate(None, &VECTOR_DISTANCE, &[receiver(), plain, vector_b()])
            .unwrap_err();
        assert!(matches!(err, QueryError::User(UserError::VectorSearchRequiresVector)));
    }

    #[test]
    fn test_unexpected_arity() {
        let vector_type = VectorType::new(DistanceFunction::Cosine, 10, None);
        let err = translator()
            .translate(
                None,
                &VECTOR_DISTANCE,
                &[receiver(), vector_a(vector_type), vector_b(), bool_constant(false), bool_constant(false)],
            )
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_other_methods_ignored() {
        let translated = translator()
            .translate(None, &MethodInfo::new("CosmosDbFunctions", "FullTextContains"), &[])
            .unwrap();
        assert!(translated.is_none());

        let translated = translator()
            .translate(None, &MethodInfo::new("Math", FUNCTION_NAME), &[])
            .unwrap();
        assert!(translated.is_none());
    }
}
