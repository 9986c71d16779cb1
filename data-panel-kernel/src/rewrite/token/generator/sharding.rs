use std::collections::BTreeMap;

use crate::binder::segment::{OwnerSegment, PaginationValue, ProjectionSegment};
use crate::binder::{BoundStatementContext, StatementType};
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::token::generator::{get_text, SQLTokenGenerator};
use crate::rewrite::token::{InsertValue, SQLToken, SQLTokenKind};
use crate::route::context::RouteContext;
use crate::rule::sharding::ShardingRule;

/// Logic table names in FROM/INTO/UPDATE clauses.
pub struct TableTokenGenerator<'a> {
    rule: &'a ShardingRule,
}

impl<'a> TableTokenGenerator<'a> {
    pub fn new(rule: &'a ShardingRule) -> Self {
        TableTokenGenerator { rule }
    }
}

impl<'a> SQLTokenGenerator for TableTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        logic_sql.get_statement_context().get_tables().iter().any(|each| self.rule.is_sharding_table(each.get_name()))
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        Ok(logic_sql
            .get_statement_context()
            .get_tables()
            .iter()
            .filter(|each| self.rule.is_sharding_table(each.get_name()))
            .map(|each| SQLToken::table(each.get_start_index(), each.get_stop_index(), each.get_name()))
            .collect())
    }
}

/// Owners that name a sharding table directly, as in `t_order.order_id`.
pub struct OwnerTokenGenerator<'a> {
    rule: &'a ShardingRule,
}

impl<'a> OwnerTokenGenerator<'a> {
    pub fn new(rule: &'a ShardingRule) -> Self {
        OwnerTokenGenerator { rule }
    }

    fn find_owners(statement: &BoundStatementContext) -> Vec<&OwnerSegment> {
        let mut result = vec![];
        for each in statement.get_projections() {
            match each {
                ProjectionSegment::Column(projection) => result.extend(projection.get_column().get_owner()),
                ProjectionSegment::Shorthand(projection) => result.extend(projection.get_owner()),
                ProjectionSegment::Expression(_) => {}
            }
        }
        result.extend(statement.get_predicates().iter().filter_map(|each| each.get_column().get_owner()));
        result.extend(statement.get_assignments().iter().filter_map(|each| each.get_column().get_owner()));
        result
    }
}

impl<'a> SQLTokenGenerator for OwnerTokenGenerator<'a> {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, _route_context: &RouteContext) -> bool {
        !Self::find_owners(logic_sql.get_statement_context()).is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let statement = logic_sql.get_statement_context();
        let mut result = BTreeMap::new();
        for owner in Self::find_owners(statement) {
            let table = match find_owner_table(statement, owner.get_name()) {
                Some(table) if self.rule.is_sharding_table(table) => table,
                _ => continue,
            };
            result
                .entry(owner.get_start_index())
                .or_insert_with(|| SQLToken::owner(owner.get_start_index(), owner.get_stop_index(), table));
        }
        Ok(result.into_iter().map(|(_, token)| token).collect())
    }
}

/// Logic table an owner spells out by name; aliased tables are left alone.
pub(crate) fn find_owner_table<'s>(statement: &'s BoundStatementContext, owner: &str) -> Option<&'s str> {
    statement
        .find_table(owner)
        .filter(|each| each.get_alias().is_none() && each.get_name().eq_ignore_ascii_case(owner))
        .map(|each| each.get_name())
}

/**
 * Pagination over several units: every shard has to return its first
 * `offset + row_count` rows, the merger applies the offset afterwards.
 */
pub struct PaginationTokenGenerator;

impl PaginationTokenGenerator {
    fn resolve(logic_sql: &LogicSQL, value: &PaginationValue) -> Result<u64> {
        match value {
            PaginationValue::Literal { value, .. } => Ok(*value),
            PaginationValue::Parameter { index, .. } => {
                Ok(logic_sql.get_parameter(*index)?.as_u64().unwrap_or(0))
            }
        }
    }
}

impl SQLTokenGenerator for PaginationTokenGenerator {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.is_query() && statement.get_pagination().is_some() && route_context.get_route_units().len() > 1
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, _route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let mut result = vec![];
        let pagination = match logic_sql.get_statement_context().get_pagination() {
            Some(pagination) => pagination,
            None => return Ok(result),
        };
        let offset = match pagination.get_offset() {
            Some(offset) => offset,
            None => return Ok(result),
        };
        let offset_value = Self::resolve(logic_sql, offset)?;
        if let PaginationValue::Literal { start_index, stop_index, .. } = offset {
            result.push(SQLToken::new(*start_index, *stop_index, SQLTokenKind::Offset { value: 0 }));
        }
        if let Some(PaginationValue::Literal { start_index, stop_index, value }) = pagination.get_row_count() {
            result.push(SQLToken::new(*start_index, *stop_index, SQLTokenKind::RowCount { value: offset_value.saturating_add(*value) }));
        }
        Ok(result)
    }
}

/// VALUES rows of a sharded INSERT, so every unit only receives its own rows.
pub struct ShardingInsertValuesTokenGenerator;

impl SQLTokenGenerator for ShardingInsertValuesTokenGenerator {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> bool {
        let statement = logic_sql.get_statement_context();
        statement.get_statement_type() == StatementType::Insert
            && !statement.get_insert_values().is_empty()
            && !route_context.get_original_data_nodes().is_empty()
    }

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, route_context: &RouteContext, _previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>> {
        let rows = logic_sql.get_statement_context().get_insert_values();
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(vec![]),
        };
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let texts = row
                    .get_values()
                    .iter()
                    .map(|each| get_text(logic_sql.get_sql(), each.get_start_index(), each.get_stop_index()))
                    .collect();
                InsertValue::new(texts, route_context.get_original_data_nodes().get(i).cloned().unwrap_or_default())
            })
            .collect();
        Ok(vec![SQLToken::new(first.get_start_index(), last.get_stop_index(), SQLTokenKind::InsertValues { values })])
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{
        ColumnProjection, ColumnSegment, OwnerSegment, PaginationSegment, PaginationValue, ProjectionSegment, TableSegment,
    };
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::logic::LogicSQL;
    use crate::rewrite::token::generator::sharding::{OwnerTokenGenerator, PaginationTokenGenerator, TableTokenGenerator};
    use crate::rewrite::token::generator::SQLTokenGenerator;
    use crate::rewrite::token::{SQLToken, SQLTokenKind};
    use crate::route::context::{DataNode, RouteContext, RouteMapper, RouteUnit};
    use crate::rule::sharding::{ShardingRule, TableRule};
    use crate::value::SQLValue;

    fn rule() -> ShardingRule {
        ShardingRule::new(
            vec!["ds_0".to_string()],
            vec![TableRule::new("t_order", vec![DataNode::new("ds_0", "t_order_0"), DataNode::new("ds_0", "t_order_1")])],
        )
    }

    fn two_units() -> RouteContext {
        let mut result = RouteContext::new();
        result.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_0")]));
        result.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_1")]));
        result
    }

    #[test]
    fn test_table_and_owner_tokens() {
        // SELECT t_order.user_id, o.status FROM t_order, t_user o
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(38, 44, "t_order"))
            .table(TableSegment::new(47, 52, "t_user").with_alias("o"))
            .projection(ProjectionSegment::Column(ColumnProjection::new(
                ColumnSegment::new(7, 21, "user_id").with_owner(OwnerSegment::new(7, 13, "t_order")),
            )))
            .projection(ProjectionSegment::Column(ColumnProjection::new(
                ColumnSegment::new(24, 31, "status").with_owner(OwnerSegment::new(24, 24, "o")),
            )))
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT t_order.user_id, o.status FROM t_order, t_user o", vec![]);
        let rule = rule();
        let route_context = two_units();
        let tables = TableTokenGenerator::new(&rule).generate_sql_tokens(&logic_sql, &route_context, &[]).unwrap();
        assert_eq!(tables, vec![SQLToken::table(38, 44, "t_order")]);
        let owners = OwnerTokenGenerator::new(&rule).generate_sql_tokens(&logic_sql, &route_context, &[]).unwrap();
        assert_eq!(owners, vec![SQLToken::owner(7, 13, "t_order")]);
    }

    #[test]
    fn test_pagination_tokens() {
        // SELECT * FROM t_order LIMIT 10, ?
        let pagination = PaginationSegment::new(
            Some(PaginationValue::Literal { start_index: 28, stop_index: 29, value: 10 }),
            Some(PaginationValue::Parameter { start_index: 32, stop_index: 32, index: 0 }),
        );
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .pagination(pagination)
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order LIMIT 10, ?", vec![SQLValue::Int(20)]);
        let generator = PaginationTokenGenerator;
        assert!(generator.is_generate_sql_token(&logic_sql, &two_units()));
        let tokens = generator.generate_sql_tokens(&logic_sql, &two_units(), &[]).unwrap();
        assert_eq!(tokens, vec![SQLToken::new(28, 29, SQLTokenKind::Offset { value: 0 })]);
        let mut single = RouteContext::new();
        single.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![]));
        assert!(!generator.is_generate_sql_token(&logic_sql, &single));
    }

    #[test]
    fn test_literal_row_count_is_widened() {
        // SELECT * FROM t_order LIMIT 5 OFFSET 10
        let pagination = PaginationSegment::new(
            Some(PaginationValue::Literal { start_index: 37, stop_index: 38, value: 10 }),
            Some(PaginationValue::Literal { start_index: 28, stop_index: 28, value: 5 }),
        );
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .pagination(pagination)
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order LIMIT 5 OFFSET 10", vec![]);
        let tokens = PaginationTokenGenerator.generate_sql_tokens(&logic_sql, &two_units(), &[]).unwrap();
        assert_eq!(tokens[1], SQLToken::new(28, 28, SQLTokenKind::RowCount { value: 15 }));
    }

    #[test]
    fn test_unbounded_row_count_stays_unbounded() {
        // SELECT * FROM t_order LIMIT 5, 18446744073709551615
        let pagination = PaginationSegment::new(
            Some(PaginationValue::Literal { start_index: 28, stop_index: 28, value: 5 }),
            Some(PaginationValue::Literal { start_index: 31, stop_index: 50, value: u64::MAX }),
        );
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .pagination(pagination)
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order LIMIT 5, 18446744073709551615", vec![]);
        let tokens = PaginationTokenGenerator.generate_sql_tokens(&logic_sql, &two_units(), &[]).unwrap();
        assert_eq!(
            tokens,
            vec![
                SQLToken::new(28, 28, SQLTokenKind::Offset { value: 0 }),
                SQLToken::new(31, 50, SQLTokenKind::RowCount { value: u64::MAX }),
            ]
        );
        let route_context = two_units();
        let unit = route_context.get_route_units().iter().next().unwrap();
        assert_eq!(tokens[1].render(unit), "18446744073709551615");
    }
}
