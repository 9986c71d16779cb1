use std::convert::TryFrom;

use crate::binder::segment::{ExpressionSegment, PaginationValue};
use crate::binder::StatementType;
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::parameter::builder::ParameterBuilder;
use crate::rewrite::token::generator::encrypt::{encrypt_query_value, find_encrypt_column, find_encrypt_insert_columns};
use crate::route::context::RouteContext;
use crate::rule::encrypt::EncryptRule;
use crate::rule::RuleMetaData;
use crate::value::SQLValue;

/// Counterpart of the token generators for values bound through `?`.
pub trait ParameterRewriter {
    fn is_need_rewrite(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> bool;

    fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, route_context: &RouteContext) -> Result<()>;
}

pub struct ParameterRewriters<'a> {
    rewriters: Vec<Box<dyn ParameterRewriter + 'a>>,
}

impl<'a> ParameterRewriters<'a> {
    pub fn create(rules: &'a RuleMetaData) -> Self {
        let mut rewriters: Vec<Box<dyn ParameterRewriter + 'a>> = vec![];
        if rules.find_sharding_rule().is_some() {
            rewriters.push(Box::new(ShardingPaginationParameterRewriter));
        }
        if let Some(rule) = rules.find_encrypt_rule() {
            rewriters.push(Box::new(EncryptInsertValueParameterRewriter { rule }));
            rewriters.push(Box::new(EncryptPredicateParameterRewriter { rule }));
            rewriters.push(Box::new(EncryptAssignmentParameterRewriter { rule }));
        }
        ParameterRewriters { rewriters }
    }

    pub fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, route_context: &RouteContext) -> Result<()> {
        for each in &self.rewriters {
            if each.is_need_rewrite(logic_sql, route_context) {
                each.rewrite(builder, logic_sql, route_context)?;
            }
        }
        Ok(())
    }
}

/// Bound `LIMIT ?, ?` over several units, see the pagination tokens.
pub struct ShardingPaginationParameterRewriter;

impl ParameterRewriter for ShardingPaginationParameterRewriter {
    fn is_need_rewrite(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.is_query() && statement.get_pagination().is_some() && route_context.get_route_units().len() > 1
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, _route_context: &RouteContext) -> Result<()> {
        let pagination = match logic_sql.get_statement_context().get_pagination() {
            Some(pagination) => pagination,
            None => return Ok(()),
        };
        let offset = match pagination.get_offset() {
            Some(PaginationValue::Literal { value, .. }) => *value,
            Some(PaginationValue::Parameter { index, .. }) => {
                builder.replace(*index, SQLValue::Int(0));
                logic_sql.get_parameter(*index)?.as_u64().unwrap_or(0)
            }
            None => return Ok(()),
        };
        if let Some(PaginationValue::Parameter { index, .. }) = pagination.get_row_count() {
            let row_count = logic_sql.get_parameter(*index)?.as_u64().unwrap_or(0);
            builder.replace(*index, row_count_value(offset.saturating_add(row_count)));
        }
        Ok(())
    }
}

/// Row counts past `i64::MAX` are sent as decimals, `u64::MAX` still reads as "all rows".
fn row_count_value(row_count: u64) -> SQLValue {
    i64::try_from(row_count).map_or_else(|_| SQLValue::Decimal(row_count.to_string()), SQLValue::Int)
}

/// Cipher values of bound insert values, shadow values appended to their row.
pub struct EncryptInsertValueParameterRewriter<'a> {
    rule: &'a EncryptRule,
}

impl<'a> ParameterRewriter for EncryptInsertValueParameterRewriter<'a> {
    fn is_need_rewrite(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.get_statement_type() == StatementType::Insert && statement.contains_insert_columns() && !logic_sql.get_parameters().is_empty()
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, _route_context: &RouteContext) -> Result<()> {
        let statement = logic_sql.get_statement_context();
        let encrypt_columns = find_encrypt_insert_columns(self.rule, statement);
        for (group, row) in statement.get_insert_values().iter().enumerate() {
            let mut appended = vec![];
            for (position, column) in &encrypt_columns {
                if let Some(ExpressionSegment::Parameter { index, .. }) = row.get_values().get(*position) {
                    let value = logic_sql.get_parameter(*index)?;
                    builder.replace(*index, column.encrypt_cipher(value));
                    appended.extend(column.encrypt_shadow_values(value));
                }
            }
            if appended.is_empty() {
                continue;
            }
            if let ParameterBuilder::Grouped(grouped) = &mut *builder {
                grouped.add_group_parameters(group, appended);
            }
        }
        Ok(())
    }
}

/// Bound operands of encrypted predicates.
pub struct EncryptPredicateParameterRewriter<'a> {
    rule: &'a EncryptRule,
}

impl<'a> ParameterRewriter for EncryptPredicateParameterRewriter<'a> {
    fn is_need_rewrite(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        !logic_sql.get_statement_context().get_predicates().is_empty() && !logic_sql.get_parameters().is_empty()
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, _route_context: &RouteContext) -> Result<()> {
        let statement = logic_sql.get_statement_context();
        for predicate in statement.get_predicates() {
            let column = match find_encrypt_column(self.rule, statement, predicate.get_column()) {
                Some(column) => column,
                None => continue,
            };
            for each in predicate.get_values() {
                if let ExpressionSegment::Parameter { index, .. } = each {
                    let value = encrypt_query_value(column, predicate.get_operator(), logic_sql.get_parameter(*index)?);
                    builder.replace(*index, value);
                }
            }
        }
        Ok(())
    }
}

/// `SET pwd = ?`: cipher in place, shadow values right behind it.
pub struct EncryptAssignmentParameterRewriter<'a> {
    rule: &'a EncryptRule,
}

impl<'a> ParameterRewriter for EncryptAssignmentParameterRewriter<'a> {
    fn is_need_rewrite(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.get_statement_type() == StatementType::Update && !logic_sql.get_parameters().is_empty()
    }

    fn rewrite(&self, builder: &mut ParameterBuilder, logic_sql: &LogicSQL, _route_context: &RouteContext) -> Result<()> {
        let statement = logic_sql.get_statement_context();
        for assignment in statement.get_assignments() {
            let column = match find_encrypt_column(self.rule, statement, assignment.get_column()) {
                Some(column) => column,
                None => continue,
            };
            if let ExpressionSegment::Parameter { index, .. } = assignment.get_value() {
                let value = logic_sql.get_parameter(*index)?;
                builder.replace(*index, column.encrypt_cipher(value));
                builder.add_after(*index, column.encrypt_shadow_values(value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{PaginationSegment, PaginationValue, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::logic::LogicSQL;
    use crate::rewrite::parameter::builder::ParameterBuilder;
    use crate::rewrite::parameter::rewriter::{ParameterRewriter, ShardingPaginationParameterRewriter};
    use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
    use crate::value::SQLValue;

    #[test]
    fn test_bound_pagination_over_several_units() {
        // SELECT * FROM t_order LIMIT ?, ?
        let pagination = PaginationSegment::new(
            Some(PaginationValue::Parameter { start_index: 28, stop_index: 28, index: 0 }),
            Some(PaginationValue::Parameter { start_index: 31, stop_index: 31, index: 1 }),
        );
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .pagination(pagination)
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order LIMIT ?, ?", vec![SQLValue::Int(10), SQLValue::Int(5)]);
        let mut route_context = RouteContext::new();
        route_context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![]));
        let rewriter = ShardingPaginationParameterRewriter;
        assert!(!rewriter.is_need_rewrite(&logic_sql, &route_context));
        route_context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_1", "ds_1"), vec![]));
        assert!(rewriter.is_need_rewrite(&logic_sql, &route_context));
        let mut builder = ParameterBuilder::create(&logic_sql).unwrap();
        rewriter.rewrite(&mut builder, &logic_sql, &route_context).unwrap();
        assert_eq!(builder.get_parameters(), vec![SQLValue::Int(0), SQLValue::Int(15)]);
    }

    #[test]
    fn test_bound_row_count_does_not_overflow() {
        let pagination = PaginationSegment::new(
            Some(PaginationValue::Parameter { start_index: 28, stop_index: 28, index: 0 }),
            Some(PaginationValue::Parameter { start_index: 31, stop_index: 31, index: 1 }),
        );
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .pagination(pagination)
            .build();
        let mut route_context = RouteContext::new();
        route_context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![]));
        route_context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_1", "ds_1"), vec![]));
        let cases = vec![
            (SQLValue::Decimal("18446744073709551615".to_string()), SQLValue::Decimal("18446744073709551615".to_string())),
            (SQLValue::Int(i64::MAX), SQLValue::Decimal("9223372036854775812".to_string())),
            (SQLValue::Int(10), SQLValue::Int(15)),
        ];
        for (row_count, expected) in cases {
            let logic_sql = LogicSQL::new(statement.clone(), "SELECT * FROM t_order LIMIT ?, ?", vec![SQLValue::Int(5), row_count]);
            let mut builder = ParameterBuilder::create(&logic_sql).unwrap();
            ShardingPaginationParameterRewriter.rewrite(&mut builder, &logic_sql, &route_context).unwrap();
            assert_eq!(builder.get_parameters(), vec![SQLValue::Int(0), expected]);
        }
    }
}
