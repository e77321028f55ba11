//! Query SQL generator: lowers a `SelectExpression` tree into dialect text
//! plus the list of bound parameters

use cosql_ir::{
    BinaryOperator, DataType, FromSqlArguments, MappingError, OrderingExpression, ParameterValues,
    ProjectionExpression, SelectExpression, SourceExpression, SqlExpression, UnaryOperator, Value,
};
use cosql_registry::TypeMappingSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, trace, warn};

use crate::error::{InternalError, QueryError, UserError};
use crate::sql_builder::IndentedStringBuilder;

/// Generator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Spaces per indent level in nested subqueries and object projections
    pub indent_size: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self { indent_size: 2 }
    }
}

/// Parameter bound to the generated query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: serde_json::Value,
}

/// Generated query text with its parameters, in order of first reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosSqlQuery {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

impl fmt::Display for CosmosSqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for parameter in &self.parameters {
            writeln!(f, "{}='{}'", parameter.name, parameter.value)?;
        }
        if !self.parameters.is_empty() {
            writeln!(f)?;
        }
        write!(f, "{}", self.query)
    }
}

/// Query SQL generator
///
/// Holds no per-query state; every `generate` call works on its own
/// `GenerationContext`, so one generator can be shared between callers.
pub struct QuerySqlGenerator<'a> {
    type_mapping_source: &'a TypeMappingSource,
    options: GeneratorOptions,
}

impl<'a> QuerySqlGenerator<'a> {
    pub fn new(type_mapping_source: &'a TypeMappingSource) -> Self {
        Self::with_options(type_mapping_source, GeneratorOptions::default())
    }

    pub fn with_options(type_mapping_source: &'a TypeMappingSource, options: GeneratorOptions) -> Self {
        Self {
            type_mapping_source,
            options,
        }
    }

    /// Generate query text and parameters for `select`
    pub fn generate(
        &self,
        select: &SelectExpression,
        parameter_values: &ParameterValues,
    ) -> Result<CosmosSqlQuery, QueryError> {
        let mut context = GenerationContext::new(self.type_mapping_source, parameter_values, &self.options);

        match context.visit_select(select) {
            Ok(()) => {
                let query = context.finish();
                debug!(
                    parameters = query.parameters.len(),
                    length = query.query.len(),
                    "Generated query"
                );
                Ok(query)
            }
            Err(err) => {
                if err.is_internal() {
                    error!(error = %err, "Query generation failed on invalid IR");
                } else {
                    warn!(error = %err, "Query generation rejected");
                }
                Err(err)
            }
        }
    }
}

/// Yields `@p0`, `@p1`, ... for raw-text argument placeholders
#[derive(Debug, Default)]
struct ParameterNameGenerator {
    count: usize,
}

impl ParameterNameGenerator {
    fn generate_next(&mut self) -> String {
        let name = format!("@p{}", self.count);
        self.count += 1;
        name
    }
}

/// Per-call accumulator
struct GenerationContext<'a> {
    sql: IndentedStringBuilder,
    type_mapping_source: &'a TypeMappingSource,
    parameter_values: &'a ParameterValues,
    parameters: Vec<SqlParameter>,
    parameter_name_generator: ParameterNameGenerator,
}

type GenResult = Result<(), QueryError>;

fn comma(sql: &mut IndentedStringBuilder) {
    sql.append(", ");
}

fn comma_newline(sql: &mut IndentedStringBuilder) {
    sql.append_line(",");
}

impl<'a> GenerationContext<'a> {
    fn new(
        type_mapping_source: &'a TypeMappingSource,
        parameter_values: &'a ParameterValues,
        options: &GeneratorOptions,
    ) -> Self {
        Self {
            sql: IndentedStringBuilder::new(options.indent_size),
            type_mapping_source,
            parameter_values,
            parameters: Vec::new(),
            parameter_name_generator: ParameterNameGenerator::default(),
        }
    }

    fn finish(self) -> CosmosSqlQuery {
        CosmosSqlQuery {
            query: self.sql.into_string(),
            parameters: self.parameters,
        }
    }

    fn generate_list<T>(
        &mut self,
        items: &[T],
        join: fn(&mut IndentedStringBuilder),
        mut generate: impl FnMut(&mut Self, &T) -> GenResult,
    ) -> GenResult {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                join(&mut self.sql);
            }
            generate(self, item)?;
        }
        Ok(())
    }

    fn visit(&mut self, expression: &SqlExpression) -> GenResult {
        match expression {
            SqlExpression::Select(select) => self.visit_select(select),
            SqlExpression::ObjectReference { name } | SqlExpression::ScalarReference { name, .. } => {
                self.sql.append(name);
                Ok(())
            }
            SqlExpression::KeyAccess {
                object,
                property_name,
                ..
            }
            | SqlExpression::ObjectAccess {
                object,
                property_name,
            } => {
                self.visit(object)?;
                self.sql.append(&format!("[\"{}\"]", property_name));
                Ok(())
            }
            SqlExpression::EntityProjection { access } | SqlExpression::ObjectArrayProjection { access } => {
                self.visit(access)
            }
            SqlExpression::Binary {
                operator,
                left,
                right,
                ..
            } => self.visit_binary(*operator, left, right),
            SqlExpression::Unary {
                operator, operand, ..
            } => self.visit_unary(*operator, operand),
            SqlExpression::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                self.sql.append("(");
                self.visit(test)?;
                self.sql.append(" ? ");
                self.visit(if_true)?;
                self.sql.append(" : ");
                self.visit(if_false)?;
                self.sql.append(")");
                Ok(())
            }
            SqlExpression::Function { name, arguments, .. } => {
                self.sql.append(name).append("(");
                self.generate_list(arguments, comma, Self::visit)?;
                self.sql.append(")");
                Ok(())
            }
            SqlExpression::Constant {
                value, type_mapping, ..
            } => {
                let mapping = type_mapping
                    .as_ref()
                    .ok_or(InternalError::MissingTypeMapping("Constant"))?;
                let literal = mapping.generate_constant(value)?;
                self.sql.append(&literal);
                Ok(())
            }
            SqlExpression::Parameter {
                name, type_mapping, ..
            } => self.visit_parameter(name, type_mapping.as_ref()),
            SqlExpression::In {
                item,
                values,
                values_parameter,
            } => self.generate_in(item, values.as_deref(), values_parameter.as_deref(), false),
            SqlExpression::ArrayConstant { items } => {
                self.sql.append("[");
                self.generate_list(items, comma, Self::visit)?;
                self.sql.append("]");
                Ok(())
            }
            SqlExpression::Exists { subquery } => self.visit_subquery("EXISTS (", subquery),
            SqlExpression::Array { subquery } => self.visit_subquery("ARRAY(", subquery),
            SqlExpression::ScalarSubquery { subquery } => self.visit_subquery("(", subquery),
            SqlExpression::FromSql { sql, arguments } => self.visit_from_sql(sql, arguments),
        }
    }

    fn visit_select(&mut self, select: &SelectExpression) -> GenResult {
        self.sql.append("SELECT ");

        if select.is_distinct {
            self.sql.append("DISTINCT ");
        }

        let projection = &select.projection;
        if projection.is_empty() {
            self.sql.append("1");
        } else if select.uses_single_value_projection {
            // A bare value; without VALUE the store wraps it in an object
            self.sql.append("VALUE ");
            match projection.as_slice() {
                [single] => self.visit(&single.expression)?,
                _ => return Err(InternalError::SingleValueProjectionArity(projection.len()).into()),
            }
        } else if uses_object_projection_style(projection) {
            self.sql.append_line("VALUE").append_line("{").increment_indent();
            self.generate_list(projection, comma_newline, |ctx, p| ctx.visit_projection(p, true))?;
            self.sql.append_line("").decrement_indent().append("}");
        } else {
            self.generate_list(projection, comma, |ctx, p| ctx.visit_projection(p, false))?;
        }

        match select.sources.as_slice() {
            [] => {}
            [source] => {
                self.sql.append_line("").append("FROM ");
                self.visit_source(source)?;
            }
            _ => return Err(InternalError::JoinsNotSupported.into()),
        }

        if let Some(predicate) = &select.predicate {
            self.sql.append_line("").append("WHERE ");
            self.visit(predicate)?;
        }

        if !select.orderings.is_empty() {
            self.sql.append_line("").append("ORDER BY ");
            self.generate_list(&select.orderings, comma, Self::visit_ordering)?;
        }

        if select.offset.is_some() || select.limit.is_some() {
            self.sql.append_line("").append("OFFSET ");
            match &select.offset {
                Some(offset) => self.visit(offset)?,
                None => {
                    self.sql.append("0");
                }
            }

            self.sql.append(" LIMIT ");
            let limit = select.limit.as_ref().ok_or(UserError::OffsetRequiresLimit)?;
            self.visit(limit)?;
        }

        Ok(())
    }

    fn visit_projection(&mut self, projection: &ProjectionExpression, object_style: bool) -> GenResult {
        if object_style {
            self.sql.append(&format!("\"{}\" : ", projection.alias));
        }

        self.visit(&projection.expression)?;

        if !object_style && projection.has_custom_alias() {
            self.sql.append(" AS ").append(&projection.alias);
        }
        Ok(())
    }

    fn visit_source(&mut self, source: &SourceExpression) -> GenResult {
        if source.with_in {
            let alias = source.alias.as_deref().ok_or(InternalError::WithInRequiresAlias)?;
            self.sql.append(alias).append(" IN ");
            self.visit_container(&source.container)
        } else {
            self.visit_container(&source.container)?;
            if let Some(alias) = &source.alias {
                self.sql.append(" ").append(alias);
            }
            Ok(())
        }
    }

    fn visit_container(&mut self, container: &SqlExpression) -> GenResult {
        match container {
            SqlExpression::Select(subquery) if subquery.is_simple_value_projection() => {
                self.sql.append("(");
                self.visit_select(subquery)?;
                self.sql.append(")");
            }
            SqlExpression::Select(subquery) => {
                self.sql.append_line("(").increment_indent();
                self.visit_select(subquery)?;
                self.sql.decrement_indent().append(")");
            }
            other => self.visit(other)?,
        }
        Ok(())
    }

    fn visit_ordering(&mut self, ordering: &OrderingExpression) -> GenResult {
        self.visit(&ordering.expression)?;
        if !ordering.is_ascending {
            self.sql.append(" DESC");
        }
        Ok(())
    }

    fn visit_subquery(&mut self, opening: &str, subquery: &SelectExpression) -> GenResult {
        self.sql.append_line(opening).increment_indent();
        self.visit_select(subquery)?;
        self.sql.decrement_indent().append(")");
        Ok(())
    }

    fn visit_binary(&mut self, operator: BinaryOperator, left: &SqlExpression, right: &SqlExpression) -> GenResult {
        if operator == BinaryOperator::ArrayIndex {
            self.visit(left)?;
            self.sql.append("[");
            self.visit(right)?;
            self.sql.append("]");
            return Ok(());
        }

        let token = match operator {
            BinaryOperator::Add if left.data_type() == DataType::String => " || ",
            other => binary_token(other).ok_or(InternalError::UnsupportedBinaryOperator(other))?,
        };

        self.sql.append("(");
        self.visit(left)?;
        self.sql.append(token);
        self.visit(right)?;
        self.sql.append(")");
        Ok(())
    }

    fn visit_unary(&mut self, operator: UnaryOperator, operand: &SqlExpression) -> GenResult {
        let mut token = match operator {
            UnaryOperator::UnaryPlus => "+",
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "~",
            other => return Err(InternalError::UnsupportedUnaryOperator(other).into()),
        };

        if operator == UnaryOperator::Not && operand.data_type() == DataType::Bool {
            if let SqlExpression::In {
                item,
                values,
                values_parameter,
            } = operand
            {
                return self.generate_in(item, values.as_deref(), values_parameter.as_deref(), true);
            }
            token = "NOT";
        }

        self.sql.append(token).append("(");
        self.visit(operand)?;
        self.sql.append(")");
        Ok(())
    }

    fn generate_in(
        &mut self,
        item: &SqlExpression,
        values: Option<&[SqlExpression]>,
        values_parameter: Option<&str>,
        negated: bool,
    ) -> GenResult {
        if let Some(name) = values_parameter {
            return Err(InternalError::UnexpandedInValuesParameter(name.to_string()).into());
        }
        let values = values.ok_or(InternalError::MissingInValues)?;

        self.visit(item)?;
        self.sql.append(if negated { " NOT IN (" } else { " IN (" });
        self.generate_list(values, comma, Self::visit)?;
        self.sql.append(")");
        Ok(())
    }

    fn visit_parameter(&mut self, name: &str, type_mapping: Option<&cosql_ir::TypeMapping>) -> GenResult {
        let parameter_name = format!("@{}", name);

        if self.parameters.iter().all(|p| p.name != parameter_name) {
            let mapping = type_mapping.ok_or(InternalError::MissingTypeMapping("Parameter"))?;
            let value = self
                .parameter_values
                .get(name)
                .ok_or_else(|| UserError::MissingParameterValue(name.to_string()))?;
            let payload = mapping.generate_payload(value)?;

            trace!(parameter = %parameter_name, "Binding parameter");
            self.parameters.push(SqlParameter {
                name: parameter_name.clone(),
                value: payload,
            });
        }

        self.sql.append(&parameter_name);
        Ok(())
    }

    /// Next `@pN` not already bound and not a supplied parameter value, so
    /// tree parameters visited before or after the raw text keep their names.
    fn next_raw_parameter_name(&mut self) -> String {
        loop {
            let name = self.parameter_name_generator.generate_next();
            let taken = self.parameters.iter().any(|p| p.name == name)
                || self.parameter_values.contains_key(&name[1..]);
            if !taken {
                return name;
            }
        }
    }

    fn visit_from_sql(&mut self, sql: &str, arguments: &FromSqlArguments) -> GenResult {
        let substitutions = match arguments {
            FromSqlArguments::Parameter { name } => match self.parameter_values.get(name) {
                Some(Value::Array(values)) => {
                    let mut substitutions = Vec::with_capacity(values.len());
                    for value in values {
                        let parameter_name = self.next_raw_parameter_name();
                        let payload = serde_json::to_value(value).map_err(MappingError::from)?;
                        trace!(parameter = %parameter_name, "Binding raw SQL argument");
                        self.parameters.push(SqlParameter {
                            name: parameter_name.clone(),
                            value: payload,
                        });
                        substitutions.push(parameter_name);
                    }
                    substitutions
                }
                other => {
                    return Err(UserError::InvalidFromSqlArguments {
                        expression_type: "Parameter",
                        value_type: other.map(|value| value.data_type().to_string()),
                    }
                    .into())
                }
            },
            FromSqlArguments::Constant {
                value: Value::Array(values),
            } => values
                .iter()
                .map(|value| {
                    let mapping = self.type_mapping_source.require_mapping(&value.data_type())?;
                    Ok(mapping.generate_constant(value)?)
                })
                .collect::<Result<Vec<_>, QueryError>>()?,
            FromSqlArguments::Constant { value } => {
                return Err(UserError::InvalidFromSqlArguments {
                    expression_type: "Constant",
                    value_type: match value {
                        Value::Null => None,
                        value => Some(value.data_type().to_string()),
                    },
                }
                .into())
            }
        };

        let sql = format_positional(sql, &substitutions)?;

        self.sql.append_line("(").increment_indent();
        self.sql.append_lines(&sql);
        self.sql.decrement_indent().append(")");
        Ok(())
    }
}

fn binary_token(operator: BinaryOperator) -> Option<&'static str> {
    let token = match operator {
        // Arithmetic
        BinaryOperator::Add => " + ",
        BinaryOperator::Subtract => " - ",
        BinaryOperator::Multiply => " * ",
        BinaryOperator::Divide => " / ",
        BinaryOperator::Modulo => " % ",
        // Bitwise
        BinaryOperator::Or => " | ",
        BinaryOperator::And => " & ",
        BinaryOperator::ExclusiveOr => " ^ ",
        BinaryOperator::LeftShift => " << ",
        BinaryOperator::RightShift => " >> ",
        // Logical
        BinaryOperator::AndAlso => " AND ",
        BinaryOperator::OrElse => " OR ",
        // Comparison
        BinaryOperator::Equal => " = ",
        BinaryOperator::NotEqual => " != ",
        BinaryOperator::GreaterThan => " > ",
        BinaryOperator::GreaterThanOrEqual => " >= ",
        BinaryOperator::LessThan => " < ",
        BinaryOperator::LessThanOrEqual => " <= ",
        // Other
        BinaryOperator::Coalesce => " ?? ",
        BinaryOperator::Power | BinaryOperator::ArrayIndex => return None,
    };
    Some(token)
}

/// Object literal (`VALUE { "a" : x }`) vs. flat `x AS a` list.
///
/// The store rejects `AS value`, so a single projection aliased "value" also
/// takes the object form. Aggregates cannot appear inside an object literal.
fn uses_object_projection_style(projection: &[ProjectionExpression]) -> bool {
    let needs_object = projection.len() > 1
        || matches!(projection, [single] if single.alias.eq_ignore_ascii_case("value"));

    needs_object
        && projection.iter().any(ProjectionExpression::has_custom_alias)
        && !projection
            .iter()
            .any(|p| matches!(p.expression, SqlExpression::Function { .. }))
}

/// Substitute `{N}` placeholders; `{{` and `}}` are literal braces. Braces
/// that do not form a placeholder are kept as written.
fn format_positional(sql: &str, substitutions: &[String]) -> Result<String, UserError> {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        match parse_placeholder(tail) {
            Some((index, consumed)) => {
                let substitution =
                    substitutions
                        .get(index)
                        .ok_or(UserError::FromSqlPlaceholderOutOfRange {
                            index,
                            count: substitutions.len(),
                        })?;
                out.push_str(substitution);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// `{digits}` at the start of `text` as (index, byte length)
fn parse_placeholder(text: &str) -> Option<(usize, usize)> {
    let inner = text.strip_prefix('{')?;
    let end = inner.find('}')?;
    let digits = &inner[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse().ok()?;
    Some((index, end + 2))
}
