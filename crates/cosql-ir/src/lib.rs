//! cosql Intermediate Representation (IR)
//!
//! Provider-neutral relational expression tree handed to the query SQL
//! generator. Nodes are immutable value objects that own their children; the
//! whole tree is deterministically serializable for caching and debugging.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

mod mapping;
mod types;
mod vector;

pub use mapping::{MappingError, MappingKind, TypeMapping};
pub use types::*;
pub use vector::{DistanceFunction, VectorDataType, VectorType};

/// Runtime parameter values, keyed by logical parameter name
pub type ParameterValues = HashMap<String, Value>;

/// Root of a query: a SELECT over at most one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectExpression {
    #[serde(default)]
    pub is_distinct: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projection: Vec<ProjectionExpression>,

    /// Rows are a bare scalar/array (`SELECT VALUE`) rather than an object
    #[serde(default)]
    pub uses_single_value_projection: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceExpression>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<SqlExpression>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orderings: Vec<OrderingExpression>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<SqlExpression>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<SqlExpression>,
}

impl SelectExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate fingerprint (SHA-256) for deterministic caching
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("IR should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn distinct(mut self) -> Self {
        self.is_distinct = true;
        self
    }

    pub fn project(mut self, projection: ProjectionExpression) -> Self {
        self.projection.push(projection);
        self
    }

    /// Project a single bare value (`SELECT VALUE expr`)
    pub fn project_value(mut self, expression: SqlExpression) -> Self {
        self.projection = vec![ProjectionExpression::new(expression, "")];
        self.uses_single_value_projection = true;
        self
    }

    pub fn from_source(mut self, source: SourceExpression) -> Self {
        self.sources.push(source);
        self
    }

    pub fn filter(mut self, predicate: SqlExpression) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn order_by(mut self, ordering: OrderingExpression) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn offset(mut self, offset: SqlExpression) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: SqlExpression) -> Self {
        self.limit = Some(limit);
        self
    }

    /// A subquery that only projects one value and has no clauses, e.g.
    /// `(SELECT VALUE [1, 2])`; rendered inline when used as a source.
    pub fn is_simple_value_projection(&self) -> bool {
        self.sources.is_empty()
            && self.predicate.is_none()
            && self.offset.is_none()
            && self.limit.is_none()
            && self.orderings.is_empty()
            && !self.is_distinct
            && self.uses_single_value_projection
            && self.projection.len() == 1
    }
}

/// Projected expression with its output alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionExpression {
    pub expression: SqlExpression,

    #[serde(default)]
    pub alias: String,

    /// Attribute name the expression yields on its own
    pub name: String,
}

impl ProjectionExpression {
    pub fn new(expression: SqlExpression, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let name = expression
            .access_name()
            .map(str::to_string)
            .unwrap_or_else(|| alias.clone());
        Self {
            expression,
            alias,
            name,
        }
    }

    /// Alias differs from the name the expression produces by itself
    pub fn has_custom_alias(&self) -> bool {
        !self.alias.is_empty() && self.alias != self.name
    }
}

/// FROM clause item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExpression {
    pub container: Box<SqlExpression>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// `alias IN container` rather than `container alias`
    #[serde(default)]
    pub with_in: bool,
}

impl SourceExpression {
    /// `container [alias]`
    pub fn new(container: SqlExpression, alias: Option<&str>) -> Self {
        Self {
            container: Box::new(container),
            alias: alias.map(str::to_string),
            with_in: false,
        }
    }

    /// `alias IN container`
    pub fn membership(alias: &str, container: SqlExpression) -> Self {
        Self {
            container: Box::new(container),
            alias: Some(alias.to_string()),
            with_in: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingExpression {
    pub expression: SqlExpression,
    #[serde(default = "default_ascending")]
    pub is_ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl OrderingExpression {
    pub fn asc(expression: SqlExpression) -> Self {
        Self {
            expression,
            is_ascending: true,
        }
    }

    pub fn desc(expression: SqlExpression) -> Self {
        Self {
            expression,
            is_ascending: false,
        }
    }
}

/// Arguments of a raw-text (FromSql) fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FromSqlArguments {
    /// Named runtime parameter expected to hold an array
    Parameter { name: String },
    /// Compile-time constant expected to be an array
    Constant { value: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    // Bitwise
    Or,
    And,
    ExclusiveOr,
    LeftShift,
    RightShift,
    // Logical
    AndAlso,
    OrElse,
    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    // Other
    Coalesce,
    ArrayIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    UnaryPlus,
    Negate,
    /// Logical NOT for booleans, bitwise complement otherwise
    Not,
    Convert,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SqlExpression {
    Select(Box<SelectExpression>),

    /// Reference to a source alias or the root collection, e.g. `c`, `root`
    ObjectReference { name: String },

    /// Reference to a scalar bound by a source, e.g. `t` in `t IN c["Tags"]`
    ScalarReference { name: String, data_type: DataType },

    /// Scalar property access, e.g. `c["Name"]`
    KeyAccess {
        object: Box<SqlExpression>,
        property_name: String,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    /// Nested object access, e.g. `c["Address"]`
    ObjectAccess {
        object: Box<SqlExpression>,
        property_name: String,
    },

    /// Whole-entity projection over an access path
    EntityProjection { access: Box<SqlExpression> },

    /// Projection of an owned collection of entities, e.g. `c["Orders"]`
    ObjectArrayProjection { access: Box<SqlExpression> },

    Binary {
        operator: BinaryOperator,
        left: Box<SqlExpression>,
        right: Box<SqlExpression>,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    Unary {
        operator: UnaryOperator,
        operand: Box<SqlExpression>,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    Conditional {
        test: Box<SqlExpression>,
        if_true: Box<SqlExpression>,
        if_false: Box<SqlExpression>,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    Function {
        name: String,
        #[serde(default)]
        arguments: Vec<SqlExpression>,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    Constant {
        value: Value,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    Parameter {
        name: String,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        type_mapping: Option<TypeMapping>,
    },

    /// `item IN (values)`; `values_parameter` must be expanded into
    /// `values` before SQL generation
    In {
        item: Box<SqlExpression>,
        #[serde(skip_serializing_if = "Option::is_none")]
        values: Option<Vec<SqlExpression>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        values_parameter: Option<String>,
    },

    ArrayConstant { items: Vec<SqlExpression> },

    Exists { subquery: Box<SelectExpression> },

    Array { subquery: Box<SelectExpression> },

    ScalarSubquery { subquery: Box<SelectExpression> },

    /// Raw query text with positional `{0}`, `{1}`, ... placeholders
    FromSql {
        sql: String,
        arguments: FromSqlArguments,
    },
}

impl SqlExpression {
    pub fn object_reference(name: &str) -> Self {
        SqlExpression::ObjectReference {
            name: name.to_string(),
        }
    }

    pub fn scalar_reference(name: &str, data_type: DataType) -> Self {
        SqlExpression::ScalarReference {
            name: name.to_string(),
            data_type,
        }
    }

    pub fn key_access(
        object: SqlExpression,
        property_name: &str,
        data_type: DataType,
        type_mapping: Option<TypeMapping>,
    ) -> Self {
        SqlExpression::KeyAccess {
            object: Box::new(object),
            property_name: property_name.to_string(),
            data_type,
            type_mapping,
        }
    }

    pub fn object_access(object: SqlExpression, property_name: &str) -> Self {
        SqlExpression::ObjectAccess {
            object: Box::new(object),
            property_name: property_name.to_string(),
        }
    }

    pub fn entity_projection(access: SqlExpression) -> Self {
        SqlExpression::EntityProjection {
            access: Box::new(access),
        }
    }

    pub fn object_array_projection(access: SqlExpression) -> Self {
        SqlExpression::ObjectArrayProjection {
            access: Box::new(access),
        }
    }

    pub fn binary(
        operator: BinaryOperator,
        left: SqlExpression,
        right: SqlExpression,
        data_type: DataType,
        type_mapping: Option<TypeMapping>,
    ) -> Self {
        SqlExpression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            data_type,
            type_mapping,
        }
    }

    pub fn unary(
        operator: UnaryOperator,
        operand: SqlExpression,
        data_type: DataType,
        type_mapping: Option<TypeMapping>,
    ) -> Self {
        SqlExpression::Unary {
            operator,
            operand: Box::new(operand),
            data_type,
            type_mapping,
        }
    }

    pub fn function(
        name: &str,
        arguments: Vec<SqlExpression>,
        data_type: DataType,
        type_mapping: Option<TypeMapping>,
    ) -> Self {
        SqlExpression::Function {
            name: name.to_string(),
            arguments,
            data_type,
            type_mapping,
        }
    }

    pub fn constant(value: impl Into<Value>, data_type: DataType, type_mapping: Option<TypeMapping>) -> Self {
        SqlExpression::Constant {
            value: value.into(),
            data_type,
            type_mapping,
        }
    }

    pub fn parameter(name: &str, data_type: DataType, type_mapping: Option<TypeMapping>) -> Self {
        SqlExpression::Parameter {
            name: name.to_string(),
            data_type,
            type_mapping,
        }
    }

    pub fn in_values(item: SqlExpression, values: Vec<SqlExpression>) -> Self {
        SqlExpression::In {
            item: Box::new(item),
            values: Some(values),
            values_parameter: None,
        }
    }

    pub fn exists(subquery: SelectExpression) -> Self {
        SqlExpression::Exists {
            subquery: Box::new(subquery),
        }
    }

    pub fn array(subquery: SelectExpression) -> Self {
        SqlExpression::Array {
            subquery: Box::new(subquery),
        }
    }

    pub fn scalar_subquery(subquery: SelectExpression) -> Self {
        SqlExpression::ScalarSubquery {
            subquery: Box::new(subquery),
        }
    }

    pub fn from_sql(sql: &str, arguments: FromSqlArguments) -> Self {
        SqlExpression::FromSql {
            sql: sql.to_string(),
            arguments,
        }
    }

    /// Static type of the expression
    pub fn data_type(&self) -> DataType {
        match self {
            SqlExpression::ScalarReference { data_type, .. }
            | SqlExpression::KeyAccess { data_type, .. }
            | SqlExpression::Binary { data_type, .. }
            | SqlExpression::Unary { data_type, .. }
            | SqlExpression::Conditional { data_type, .. }
            | SqlExpression::Function { data_type, .. }
            | SqlExpression::Constant { data_type, .. }
            | SqlExpression::Parameter { data_type, .. } => data_type.clone(),
            SqlExpression::In { .. } | SqlExpression::Exists { .. } => DataType::Bool,
            SqlExpression::ArrayConstant { items } => DataType::array_of(
                items
                    .first()
                    .map(SqlExpression::data_type)
                    .unwrap_or(DataType::Unknown),
            ),
            SqlExpression::Array { subquery } => DataType::array_of(single_projection_type(subquery)),
            SqlExpression::ScalarSubquery { subquery } => single_projection_type(subquery),
            SqlExpression::ObjectArrayProjection { .. } => DataType::array_of(DataType::Object),
            SqlExpression::ObjectReference { .. }
            | SqlExpression::ObjectAccess { .. }
            | SqlExpression::EntityProjection { .. }
            | SqlExpression::FromSql { .. } => DataType::Object,
            SqlExpression::Select(_) => DataType::Unknown,
        }
    }

    /// Type mapping attached to the node, if it carries one
    pub fn type_mapping(&self) -> Option<&TypeMapping> {
        match self {
            SqlExpression::KeyAccess { type_mapping, .. }
            | SqlExpression::Binary { type_mapping, .. }
            | SqlExpression::Unary { type_mapping, .. }
            | SqlExpression::Conditional { type_mapping, .. }
            | SqlExpression::Function { type_mapping, .. }
            | SqlExpression::Constant { type_mapping, .. }
            | SqlExpression::Parameter { type_mapping, .. } => type_mapping.as_ref(),
            _ => None,
        }
    }

    /// Same node with `mapping` attached; nodes without a mapping slot are
    /// returned unchanged
    pub fn with_type_mapping(self, mapping: TypeMapping) -> Self {
        match self {
            SqlExpression::KeyAccess {
                object,
                property_name,
                data_type,
                ..
            } => SqlExpression::KeyAccess {
                object,
                property_name,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Binary {
                operator,
                left,
                right,
                data_type,
                ..
            } => SqlExpression::Binary {
                operator,
                left,
                right,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Unary {
                operator,
                operand,
                data_type,
                ..
            } => SqlExpression::Unary {
                operator,
                operand,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Conditional {
                test,
                if_true,
                if_false,
                data_type,
                ..
            } => SqlExpression::Conditional {
                test,
                if_true,
                if_false,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Function {
                name,
                arguments,
                data_type,
                ..
            } => SqlExpression::Function {
                name,
                arguments,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Constant {
                value, data_type, ..
            } => SqlExpression::Constant {
                value,
                data_type,
                type_mapping: Some(mapping),
            },
            SqlExpression::Parameter {
                name, data_type, ..
            } => SqlExpression::Parameter {
                name,
                data_type,
                type_mapping: Some(mapping),
            },
            other => other,
        }
    }

    /// Property or reference name for access paths
    pub fn access_name(&self) -> Option<&str> {
        match self {
            SqlExpression::KeyAccess { property_name, .. }
            | SqlExpression::ObjectAccess { property_name, .. } => Some(property_name),
            SqlExpression::ObjectReference { name } | SqlExpression::ScalarReference { name, .. } => {
                Some(name)
            }
            SqlExpression::EntityProjection { access }
            | SqlExpression::ObjectArrayProjection { access } => access.access_name(),
            _ => None,
        }
    }
}

fn single_projection_type(subquery: &SelectExpression) -> DataType {
    match subquery.projection.as_slice() {
        [single] => single.expression.data_type(),
        _ => DataType::Unknown,
    }
}
