use std::collections::BTreeSet;

use log::debug;

use crate::binder::segment::PredicateOperator;
use crate::binder::StatementType;
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
use crate::route::SQLRouter;
use crate::rule::shadow::{ShadowAlgorithm, ShadowOperationType, ShadowRule};
use crate::session::ConnectionContext;
use crate::value::SQLValue;

pub struct ShadowSQLRouter<'a> {
    rule: &'a ShadowRule,
}

impl<'a> ShadowSQLRouter<'a> {
    pub fn new(rule: &'a ShadowRule) -> Self {
        ShadowSQLRouter { rule }
    }

    fn is_shadow(&self, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<bool> {
        let hinted = connection.get_hint().is_shadow();
        let shadow_tables: Vec<String> = logic_sql
            .get_statement_context()
            .get_table_names()
            .into_iter()
            .filter(|each| self.rule.is_shadow_table(each))
            .collect();
        if shadow_tables.is_empty() {
            return Ok(self
                .rule
                .get_default_shadow_algorithm()
                .map_or(false, |each| each.is_shadow_hint(hinted, logic_sql.get_sql())));
        }
        for table in &shadow_tables {
            for algorithm in self.rule.get_table_algorithms(table) {
                if algorithm.is_hint() {
                    if algorithm.is_shadow_hint(hinted, logic_sql.get_sql()) {
                        return Ok(true);
                    }
                } else if self.is_shadow_column_value(logic_sql, table, algorithm)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn is_shadow_column_value(&self, logic_sql: &LogicSQL, table: &str, algorithm: &ShadowAlgorithm) -> Result<bool> {
        let statement = logic_sql.get_statement_context();
        let (operation, column) = match (ShadowOperationType::of(statement.get_statement_type()), algorithm.get_column()) {
            (Some(operation), Some(column)) => (operation, column),
            _ => return Ok(false),
        };
        for value in Self::find_column_values(logic_sql, table, column)? {
            if algorithm.is_shadow_value(operation, column, &value) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Values written to or compared against `column` of `table`.
    fn find_column_values(logic_sql: &LogicSQL, table: &str, column: &str) -> Result<Vec<SQLValue>> {
        let statement = logic_sql.get_statement_context();
        let mut result = vec![];
        if statement.get_statement_type() == StatementType::Insert {
            if let Some(position) = statement.get_insert_columns().iter().position(|each| each.get_name().eq_ignore_ascii_case(column)) {
                for row in statement.get_insert_values() {
                    if let Some(expression) = row.get_values().get(position) {
                        result.extend(logic_sql.get_expression_value(expression)?);
                    }
                }
            }
            return Ok(result);
        }
        for predicate in statement.get_predicates() {
            let owned = statement
                .find_column_table(predicate.get_column())
                .map_or(false, |each| each.eq_ignore_ascii_case(table));
            let comparable = matches!(predicate.get_operator(), PredicateOperator::Equal | PredicateOperator::In);
            if owned && comparable && predicate.get_column().get_name().eq_ignore_ascii_case(column) {
                for each in predicate.get_values() {
                    result.extend(logic_sql.get_expression_value(each)?);
                }
            }
        }
        Ok(result)
    }
}

impl<'a> SQLRouter for ShadowSQLRouter<'a> {
    fn create_route_context(&self, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<RouteContext> {
        let mut result = RouteContext::new();
        let mut data_source_rules = self.rule.get_data_source_rules();
        if let (Some(only), None) = (data_source_rules.next(), data_source_rules.next()) {
            let production = only.get_production_data_source();
            let actual = if self.is_shadow(logic_sql, connection)? { only.get_shadow_data_source() } else { production };
            result.add_route_unit(RouteUnit::new(RouteMapper::new(production, actual), vec![]));
        }
        Ok(result)
    }

    fn decorate_route_context(&self, route_context: &mut RouteContext, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<()> {
        if !self.is_shadow(logic_sql, connection)? {
            return Ok(());
        }
        let route_units: BTreeSet<RouteUnit> = route_context
            .get_route_units()
            .iter()
            .map(|each| match self.rule.find_shadow_data_source(each.get_data_source_mapper().get_actual_name()) {
                Some(shadow) => each.with_actual_data_source(shadow),
                None => each.clone(),
            })
            .collect();
        debug!("Shadow statement redirected to {:?}", route_units.iter().map(|each| each.to_string()).collect::<Vec<_>>());
        route_context.replace_route_units(route_units);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{ColumnSegment, ExpressionSegment, InsertValuesSegment, PredicateOperator, PredicateSegment, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::logic::LogicSQL;
    use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
    use crate::route::shadow::ShadowSQLRouter;
    use crate::route::SQLRouter;
    use crate::rule::config::ShadowRuleConfiguration;
    use crate::rule::shadow::ShadowRule;
    use crate::session::{ConnectionContext, HintValueContext};
    use crate::value::SQLValue;

    fn rule() -> ShadowRule {
        let config: ShadowRuleConfiguration = serde_yaml::from_str(
            r#"
data_sources:
  shadow_group: { production_data_source: ds, shadow_data_source: ds_shadow }
tables:
  t_order: { shadow_algorithms: [user_id_insert_match, user_id_select_match] }
default_shadow_algorithm: sql_hint
algorithms:
  user_id_insert_match: { type: VALUE_MATCH, props: { operation: insert, column: user_id, value: 1 } }
  user_id_select_match: { type: REGEX_MATCH, props: { operation: select, column: user_id, regex: "[1]" } }
  sql_hint: { type: SQL_HINT }
"#,
        )
        .unwrap();
        ShadowRule::from_configuration(&config).unwrap()
    }

    fn insert(user_id: i64) -> LogicSQL {
        // INSERT INTO t_order (user_id) VALUES (?)
        let statement = BoundStatementContext::builder(StatementType::Insert)
            .table(TableSegment::new(12, 18, "t_order"))
            .insert_column(ColumnSegment::new(21, 27, "user_id"))
            .insert_values(InsertValuesSegment::new(37, 39, vec![ExpressionSegment::parameter(38, 0)]))
            .build();
        LogicSQL::new(statement, "INSERT INTO t_order (user_id) VALUES (?)", vec![SQLValue::Int(user_id)])
    }

    fn production_context() -> RouteContext {
        let mut result = RouteContext::new();
        result.add_route_unit(RouteUnit::new(RouteMapper::new("ds", "ds"), vec![RouteMapper::new("t_order", "t_order")]));
        result
    }

    #[test]
    fn test_insert_value_match() {
        let rule = rule();
        let router = ShadowSQLRouter::new(&rule);
        let mut context = production_context();
        router.decorate_route_context(&mut context, &insert(1), &ConnectionContext::default()).unwrap();
        assert_eq!(context.get_actual_data_source_names(), vec!["ds_shadow"]);
        let mut context = production_context();
        router.decorate_route_context(&mut context, &insert(2), &ConnectionContext::default()).unwrap();
        assert_eq!(context.get_actual_data_source_names(), vec!["ds"]);
    }

    #[test]
    fn test_select_regex_match() {
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .predicate(PredicateSegment::new(ColumnSegment::new(28, 34, "user_id"), PredicateOperator::Equal, vec![ExpressionSegment::literal(38, 38, SQLValue::Int(1))]))
            .build();
        let rule = rule();
        let context = ShadowSQLRouter::new(&rule)
            .create_route_context(&LogicSQL::new(statement, "SELECT * FROM t_order WHERE user_id = 1", vec![]), &ConnectionContext::default())
            .unwrap();
        let unit = context.get_route_units().iter().next().unwrap();
        assert_eq!(unit.get_data_source_mapper(), &RouteMapper::new("ds", "ds_shadow"));
    }

    #[test]
    fn test_default_hint() {
        let rule = rule();
        let router = ShadowSQLRouter::new(&rule);
        let statement = BoundStatementContext::builder(StatementType::Select).table(TableSegment::new(14, 19, "t_user")).build();
        let commented = LogicSQL::new(statement.clone(), "SELECT * FROM t_user /* SHADOW: true */", vec![]);
        assert_eq!(router.create_route_context(&commented, &ConnectionContext::default()).unwrap().get_actual_data_source_names(), vec!["ds_shadow"]);
        let plain = LogicSQL::new(statement, "SELECT * FROM t_user", vec![]);
        assert_eq!(router.create_route_context(&plain, &ConnectionContext::default()).unwrap().get_actual_data_source_names(), vec!["ds"]);
        let hinted = ConnectionContext::new(false, HintValueContext::new(false, true));
        assert_eq!(router.create_route_context(&plain, &hinted).unwrap().get_actual_data_source_names(), vec!["ds_shadow"]);
    }
}
