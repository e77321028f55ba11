//! Query SQL generation for the Cosmos NoSQL dialect
//!
//! Lowers a `cosql_ir::SelectExpression` into query text plus the ordered
//! list of bound parameters.

mod error;
mod sql_builder;
mod sql_generator;
pub mod translators;

pub use error::{InternalError, QueryError, UserError};
pub use sql_builder::IndentedStringBuilder;
pub use sql_generator::{CosmosSqlQuery, GeneratorOptions, QuerySqlGenerator, SqlParameter};
pub use translators::{MethodCallTranslator, MethodCallTranslatorProvider, MethodInfo, VectorSearchTranslator, VECTOR_DISTANCE};
