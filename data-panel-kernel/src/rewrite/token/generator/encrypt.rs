//! Tokens hiding encrypted columns behind their logic names.

use crate::binder::segment::{ColumnSegment, ExpressionSegment, InsertValuesSegment, PredicateOperator, ProjectionSegment};
use crate::binder::{BoundStatementContext, StatementType};
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::token::generator::sharding::find_owner_table;
use crate::rewrite::token::generator::{get_text, SQLTokenGenerator};
use crate::rewrite::token::{ColumnOwner, InsertValue, SQLToken, SQLTokenKind, SubstituteColumn};
use crate::route::context::RouteContext;
use crate::rule::encrypt::{EncryptColumn, EncryptRule};
use crate::value::SQLValue;

pub(crate) fn find_encrypt_column<'r>(rule: &'r EncryptRule, statement: &BoundStatementContext, column: &ColumnSegment) -> Option<&'r EncryptColumn> {
    let table = statement.find_column_table(column)?;
    let name = column.get_bound().map_or(column.get_name(), |each| each.get_original_column());
    rule.find_encrypt_column(&table, name)
}

/// Insert columns that are encrypted, with their position in the column list.
pub(crate) fn find_encrypt_insert_columns<'r>(rule: &'r EncryptRule, statement: &BoundStatementContext) -> Vec<(usize, &'r EncryptColumn)> {
    if !statement.contains_insert_columns() {
        return vec![];
    }
    statement
        .get_insert_columns()
        .iter()
        .enumerate()
        .filter_map(|(i, each)| find_encrypt_column(rule, statement, each).map(|column| (i, column)))
        .collect()
}

/// Storage column a predicate is evaluated on.
pub(crate) fn get_query_column(column: &EncryptColumn, operator: PredicateOperator) -> &str {
    match operator {
        PredicateOperator::Equal | PredicateOperator::In => column.get_assisted_query(),
        PredicateOperator::Like => column.get_like_query(),
        PredicateOperator::Between => None,
    }
    .unwrap_or_else(|| column.get_cipher())
}

/// Value compared against `get_query_column`.
pub(crate) fn encrypt_query_value(column: &EncryptColumn, operator: PredicateOperator, value: &SQLValue) -> SQLValue {
    match operator {
        PredicateOperator::Equal | PredicateOperator::In => column.encrypt_assisted_query(value),
        PredicateOperator::Like => column.encrypt_like_query(value),
        PredicateOperator::Between => None,
    }
    .unwrap_or_else(|| column.encrypt_cipher(value))
}

/// Shadow values of an expression computed by the database: the plain column
/// repeats it, digests can not be derived and are cleared.
fn computed_shadow_values(column: &EncryptColumn, text: &str) -> Vec<String> {
    column
        .get_shadow_columns()
        .into_iter()
        .map(|each| if column.get_plain() == Some(each) { text.to_string() } else { "NULL".to_string() })
        .collect()
}

fn is_insert_with_columns(statement: &BoundStatementContext) -> bool {
    statement.get_statement_type() == StatementType::Insert && statement.contains_insert_columns()
}

/// `pwd` in `INSERT INTO t_user (pwd)` becomes the cipher column.
pub struct EncryptInsertCipherNameTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptInsertCipherNameTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptInsertCipherNameTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for EncryptInsertCipherNameTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        is_insert_with_columns(logic_sql.get_statement_context())
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        Ok(find_encrypt_insert_columns(self.rule, statement)
            .into_iter()
            .map(|(i, column)| {
                let segment = &statement.get_insert_columns()[i];
                SQLToken::substitute_column(segment.get_start_index(), segment.get_stop_index(), vec![SubstituteColumn::new(None, column.get_cipher())])
            })
            .collect())
    }
}

/// Assisted-query, like-query and plain columns appended after the last insert column.
pub struct EncryptInsertDerivedColumnsTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptInsertDerivedColumnsTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptInsertDerivedColumnsTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for EncryptInsertDerivedColumnsTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        is_insert_with_columns(logic_sql.get_statement_context())
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        let last = match statement.get_insert_columns().last() {
            Some(last) => last,
            None => return Ok(vec![]),
        };
        Ok(find_encrypt_insert_columns(self.rule, statement)
            .into_iter()
            .map(|(_, column)| column.get_shadow_columns())
            .filter(|each| !each.is_empty())
            .map(|each| SQLToken::insert_columns(last.get_stop_index() + 1, each.into_iter().map(str::to_string).collect()))
            .collect())
    }
}

/**
 * Re-render every VALUES row: cipher text in place of the plain value and the
 * shadow column values appended at the end of the row.
 *
 * Replaces the sharding token over the same rows, keeping its data nodes.
 */
pub struct EncryptInsertValuesTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptInsertValuesTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptInsertValuesTokenGenerator { rule }
    }

    fn render_row(logic_sql: &LogicSQL, row: &InsertValuesSegment, encrypt_columns: &[(usize, &EncryptColumn)]) -> Vec<String> {
        let sql = logic_sql.get_sql();
        let mut result: Vec<String> = row
            .get_values()
            .iter()
            .map(|each| get_text(sql, each.get_start_index(), each.get_stop_index()))
            .collect();
        for (position, column) in encrypt_columns {
            let expression = match row.get_values().get(*position) {
                Some(expression) => expression,
                None => continue,
            };
            let shadow_count = column.get_shadow_columns().len();
            match expression {
                ExpressionSegment::Literal { value, .. } => {
                    result[*position] = column.encrypt_cipher(value).to_sql_literal();
                    result.extend(column.encrypt_shadow_values(value).iter().map(SQLValue::to_sql_literal));
                }
                ExpressionSegment::Parameter { .. } => result.extend((0..shadow_count).map(|_| "?".to_string())),
                _ => {
                    let text = result[*position].clone();
                    result.extend(computed_shadow_values(column, &text));
                }
            }
        }
        result
    }
}

impl<'a> SQLTokenGenerator for EncryptInsertValuesTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        is_insert_with_columns(statement) && !statement.get_insert_values().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, route_context: &RouteContext, previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        let encrypt_columns = find_encrypt_insert_columns(self.rule, statement);
        let rows = statement.get_insert_values();
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) if !encrypt_columns.is_empty() => (first, last),
            _ => return Ok(vec![]),
        };
        let (start_index, stop_index) = (first.get_start_index(), last.get_stop_index());
        let previous = previous_tokens.iter().find_map(|each| match each.get_kind() {
            SQLTokenKind::InsertValues { values } if each.get_start_index() == start_index => Some(values),
            _ => None,
        });
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let data_nodes = match previous.and_then(|each| each.get(i)) {
                    Some(value) => value.get_data_nodes().to_vec(),
                    None => route_context.get_original_data_nodes().get(i).cloned().unwrap_or_default(),
                };
                InsertValue::new(Self::render_row(logic_sql, row, &encrypt_columns), data_nodes)
            })
            .collect();
        Ok(vec![SQLToken::new(start_index, stop_index, SQLTokenKind::InsertValues { values })])
    }
}

/**
 * Encrypted columns in the select list are read from their cipher column and
 * labelled with the logic name. `*` is expanded when it covers one.
 */
pub struct EncryptProjectionTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptProjectionTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptProjectionTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for EncryptProjectionTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.is_query() && !statement.get_projections().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        let mut result = vec![];
        for projection in statement.get_projections() {
            match projection {
                ProjectionSegment::Column(each) => {
                    let column = each.get_column();
                    if let Some(encrypt_column) = find_encrypt_column(self.rule, statement, column) {
                        let text = match each.get_alias() {
                            Some(_) => encrypt_column.get_cipher().to_string(),
                            None => format!("{} AS {}", encrypt_column.get_cipher(), column.get_name()),
                        };
                        result.push(SQLToken::substitute_column(column.get_name_start_index(), column.get_stop_index(), vec![SubstituteColumn::new(None, &text)]));
                    }
                }
                ProjectionSegment::Shorthand(each) => {
                    let encrypt_columns: Vec<Option<&EncryptColumn>> = each
                        .get_actual_columns()
                        .iter()
                        .map(|actual| find_encrypt_column(self.rule, statement, actual.get_column()))
                        .collect();
                    if encrypt_columns.iter().all(Option::is_none) {
                        continue;
                    }
                    let columns = each
                        .get_actual_columns()
                        .iter()
                        .zip(encrypt_columns)
                        .enumerate()
                        .map(|(i, (actual, encrypt_column))| {
                            let name = actual.get_column_label();
                            let text = match encrypt_column {
                                Some(encrypt_column) => format!("{} AS {}", encrypt_column.get_cipher(), name),
                                None => actual.get_column().get_name().to_string(),
                            };
                            // `owner.` of the first column is already written before `*`
                            let owner = match (i, each.get_owner()) {
                                (0, Some(_)) => None,
                                _ => actual
                                    .get_column()
                                    .get_owner()
                                    .map(|owner| ColumnOwner::new(owner.get_name(), find_owner_table(statement, owner.get_name()))),
                            };
                            SubstituteColumn::new(owner, &text)
                        })
                        .collect();
                    result.push(SQLToken::substitute_column(each.get_stop_index(), each.get_stop_index(), columns));
                }
                ProjectionSegment::Expression(_) => {}
            }
        }
        Ok(result)
    }
}

/// `pwd = ?` is evaluated on the assisted-query column, `LIKE` on the like-query column.
pub struct EncryptPredicateColumnTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptPredicateColumnTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptPredicateColumnTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for EncryptPredicateColumnTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        !logic_sql.get_statement_context().get_predicates().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        Ok(statement
            .get_predicates()
            .iter()
            .filter_map(|predicate| {
                let column = predicate.get_column();
                find_encrypt_column(self.rule, statement, column).map(|encrypt_column| {
                    let name = get_query_column(encrypt_column, predicate.get_operator());
                    SQLToken::substitute_column(column.get_name_start_index(), column.get_stop_index(), vec![SubstituteColumn::new(None, name)])
                })
            })
            .collect())
    }
}

/// Literal operands of encrypted predicates; bound operands are left to the parameter rewriter.
pub struct EncryptPredicateValueTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptPredicateValueTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptPredicateValueTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for EncryptPredicateValueTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        !logic_sql.get_statement_context().get_predicates().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        let mut result = vec![];
        for predicate in statement.get_predicates() {
            let encrypt_column = match find_encrypt_column(self.rule, statement, predicate.get_column()) {
                Some(encrypt_column) => encrypt_column,
                None => continue,
            };
            for each in predicate.get_values() {
                if let ExpressionSegment::Literal { start_index, stop_index, value } = each {
                    let encrypted = encrypt_query_value(encrypt_column, predicate.get_operator(), value);
                    result.push(SQLToken::literal(*start_index, *stop_index, &encrypted.to_sql_literal()));
                }
            }
        }
        Ok(result)
    }
}

/// `SET pwd = ?` writes the cipher column and every shadow column.
pub struct EncryptAssignmentTokenGenerator<'a> {
    rule: &'a EncryptRule,
}

impl<'a> EncryptAssignmentTokenGenerator<'a> {
    pub fn new(rule: &'a EncryptRule) -> Self {
        EncryptAssignmentTokenGenerator { rule }
    }

    fn render(logic_sql: &LogicSQL, column: &EncryptColumn, value: &ExpressionSegment) -> String {
        let shadow_columns = column.get_shadow_columns();
        let mut result = vec![];
        match value {
            ExpressionSegment::Literal { value, .. } => {
                result.push(format!("{} = {}", column.get_cipher(), column.encrypt_cipher(value).to_sql_literal()));
                for (name, each) in shadow_columns.iter().zip(column.encrypt_shadow_values(value)) {
                    result.push(format!("{} = {}", name, each.to_sql_literal()));
                }
            }
            ExpressionSegment::Parameter { .. } => {
                result.push(format!("{} = ?", column.get_cipher()));
                result.extend(shadow_columns.iter().map(|each| format!("{} = ?", each)));
            }
            _ => {
                let text = get_text(logic_sql.get_sql(), value.get_start_index(), value.get_stop_index());
                result.push(format!("{} = {}", column.get_cipher(), text));
                for (name, each) in shadow_columns.iter().zip(computed_shadow_values(column, &text)) {
                    result.push(format!("{} = {}", name, each));
                }
            }
        }
        result.join(", ")
    }
}

impl<'a> SQLTokenGenerator for EncryptAssignmentTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.get_statement_type() == StatementType::Update && !statement.get_assignments().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        Ok(statement
            .get_assignments()
            .iter()
            .filter_map(|assignment| {
                let column = assignment.get_column();
                find_encrypt_column(self.rule, statement, column).map(|encrypt_column| {
                    let text = Self::render(logic_sql, encrypt_column, assignment.get_value());
                    SQLToken::literal(column.get_name_start_index(), assignment.get_value().get_stop_index(), &text)
                })
            })
            .collect())
    }
}
