//! Method-call translators
//!
//! Lower host-language method calls recognized while building the IR into
//! dialect function expressions.

use cosql_ir::SqlExpression;
use cosql_registry::TypeMappingSource;
use std::sync::Arc;
use tracing::trace;

use crate::error::QueryError;

mod vector_search;

pub use vector_search::{VectorSearchTranslator, VECTOR_DISTANCE};

/// Identity of a translatable method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    pub declaring_type: &'static str,
    pub name: &'static str,
}

impl MethodInfo {
    pub const fn new(declaring_type: &'static str, name: &'static str) -> Self {
        Self { declaring_type, name }
    }
}

/// Translates one family of method calls
pub trait MethodCallTranslator: Send + Sync {
    /// `Ok(None)` when `method` is not handled by this translator
    fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Result<Option<SqlExpression>, QueryError>;
}

/// Ordered set of translators; the first one that applies wins
pub struct MethodCallTranslatorProvider {
    translators: Vec<Box<dyn MethodCallTranslator>>,
}

impl MethodCallTranslatorProvider {
    /// Provider with the built-in translators
    pub fn new(type_mapping_source: Arc<TypeMappingSource>) -> Self {
        Self {
            translators: vec![Box::new(VectorSearchTranslator::new(type_mapping_source))],
        }
    }

    /// Register a translator ahead of the built-ins
    pub fn add_translator(&mut self, translator: Box<dyn MethodCallTranslator>) {
        self.translators.insert(0, translator);
    }

    pub fn translate(
        &self,
        instance: Option<&SqlExpression>,
        method: &MethodInfo,
        arguments: &[SqlExpression],
    ) -> Result<Option<SqlExpression>, QueryError> {
        for translator in &self.translators {
            if let Some(translated) = translator.translate(instance, method, arguments)? {
                return Ok(Some(translated));
            }
        }

        trace!(
            declaring_type = method.declaring_type,
            method = method.name,
            "No translator for method"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosql_ir::DataType;

    struct Lower;

    impl MethodCallTranslator for Lower {
        fn translate(
            &self,
            instance: Option<&SqlExpression>,
            method: &MethodInfo,
            _arguments: &[SqlExpression],
        ) -> Result<Option<SqlExpression>, QueryError> {
            if *method != MethodInfo::new("String", "ToLower") {
                return Ok(None);
            }
            Ok(instance.map(|instance| {
                SqlExpression::function("LOWER", vec![instance.clone()], DataType::String, None)
            }))
        }
    }

    #[test]
    fn test_provider_dispatch() {
        let mut provider = MethodCallTranslatorProvider::new(Arc::new(TypeMappingSource::default()));
        provider.add_translator(Box::new(Lower));

        let name = SqlExpression::key_access(
            SqlExpression::object_reference("c"),
            "Name",
            DataType::String,
            None,
        );
        let translated = provider
            .translate(Some(&name), &MethodInfo::new("String", "ToLower"), &[])
            .unwrap();
        assert_eq!(
            translated,
            Some(SqlExpression::function("LOWER", vec![name.clone()], DataType::String, None))
        );

        let untranslated = provider
            .translate(Some(&name), &MethodInfo::new("String", "Trim"), &[])
            .unwrap();
        assert!(untranslated.is_none());
    }
}
