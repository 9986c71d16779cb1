//! Sharding routing: standard, cartesian, broadcast and insert routes.

use std::collections::BTreeMap;

use log::debug;

use crate::binder::{BoundStatementContext, StatementType};
use crate::error::{KernelError, Result};
use crate::logic::LogicSQL;
use crate::route::context::{DataNode, RouteContext, RouteMapper, RouteUnit};
use crate::route::sharding::condition::{ShardingCondition, ShardingConditionEngine};
use crate::route::SQLRouter;
use crate::rule::sharding::{ShardingRule, ShardingStrategy, TableRule};
use crate::session::ConnectionContext;

pub mod condition;

pub struct ShardingSQLRouter<'a> {
    rule: &'a ShardingRule,
}

impl<'a> ShardingSQLRouter<'a> {
    pub fn new(rule: &'a ShardingRule) -> Self {
        ShardingSQLRouter { rule }
    }

    fn route_broadcast(&self, statement: &BoundStatementContext) -> RouteContext {
        let mut result = RouteContext::new();
        let data_sources = self.rule.get_data_source_names();
        // every copy of a broadcast table is equal, one is enough to read from
        let targets = if statement.is_query() { &data_sources[..data_sources.len().min(1)] } else { data_sources };
        for each in targets {
            result.add_route_unit(RouteUnit::new(RouteMapper::new(each, each), vec![]));
        }
        result
    }

    fn route_ddl(&self, sharding_tables: &[String]) -> RouteContext {
        let mut result = RouteContext::new();
        for table in sharding_tables {
            if let Some(table_rule) = self.rule.find_table_rule(table) {
                for each in table_rule.get_actual_data_nodes() {
                    result.add_route_unit(Self::create_route_unit(each, vec![RouteMapper::new(table, each.get_table_name())]));
                }
            }
        }
        result
    }

    fn route_insert(&self, logic_sql: &LogicSQL, table: &str) -> Result<RouteContext> {
        let table_rule = self.find_table_rule(table)?;
        let statement = logic_sql.get_statement_context();
        if statement.get_insert_values().is_empty() {
            return Err(KernelError::UnsupportedSharding(format!("INSERT without VALUES can not be routed for sharding table `{}`", table)));
        }
        for strategy in self.get_strategies(table_rule) {
            let column = strategy.get_sharding_column();
            if !statement.get_insert_columns().iter().any(|each| each.get_name().eq_ignore_ascii_case(column)) {
                return Err(KernelError::UnsupportedSharding(format!("Missing sharding column `{}` of table `{}` in INSERT", column, table)));
            }
        }
        let conditions = ShardingConditionEngine::create(logic_sql, self.rule)?;
        let mut result = RouteContext::new();
        let mut original_data_nodes = Vec::with_capacity(conditions.len());
        for condition in &conditions {
            let data_nodes = self.route_data_nodes(table_rule, &[table], Some(condition))?;
            match data_nodes.len() {
                0 => return Err(KernelError::route(StatementType::Insert.to_string(), vec![table.to_string()])),
                1 => {}
                _ => {
                    return Err(KernelError::UnsupportedSharding(
                        "Insert statement does not support sharding table routing to multiple data nodes.".to_string(),
                    ))
                }
            }
            for each in &data_nodes {
                result.add_route_unit(Self::create_route_unit(each, vec![RouteMapper::new(table, each.get_table_name())]));
            }
            original_data_nodes.push(data_nodes);
        }
        result.set_original_data_nodes(original_data_nodes);
        Ok(result)
    }

    /// One primary table, the others bound to it shard by shard.
    fn route_standard(&self, logic_sql: &LogicSQL, sharding_tables: &[String]) -> Result<RouteContext> {
        let primary = &sharding_tables[0];
        let table_rule = self.find_table_rule(primary)?;
        let conditions = ShardingConditionEngine::create(logic_sql, self.rule)?;
        let binding_tables: Vec<&str> = sharding_tables.iter().map(String::as_str).collect();
        let mut result = RouteContext::new();
        for each in self.route_data_nodes(table_rule, &binding_tables, conditions.first())? {
            let mut table_mappers = vec![RouteMapper::new(primary, each.get_table_name())];
            for other in &sharding_tables[1..] {
                let actual = self
                    .rule
                    .get_binding_actual_table(each.get_data_source_name(), other, primary, each.get_table_name())
                    .ok_or_else(|| KernelError::route(logic_sql.get_statement_context().get_statement_type().to_string(), vec![other.clone()]))?;
                table_mappers.push(RouteMapper::new(other, &actual));
            }
            result.add_route_unit(Self::create_route_unit(&each, table_mappers));
        }
        Ok(result)
    }

    /// Unrelated sharding tables: every combination of their shards within each data source.
    fn route_cartesian(&self, logic_sql: &LogicSQL, sharding_tables: &[String]) -> Result<RouteContext> {
        let conditions = ShardingConditionEngine::create(logic_sql, self.rule)?;
        let mut per_data_source: BTreeMap<String, Vec<Vec<RouteMapper>>> = BTreeMap::new();
        for (position, table) in sharding_tables.iter().enumerate() {
            let table_rule = self.find_table_rule(table)?;
            let mut mappers_by_data_source: BTreeMap<String, Vec<RouteMapper>> = BTreeMap::new();
            for each in self.route_data_nodes(table_rule, &[table], conditions.first())? {
                mappers_by_data_source
                    .entry(each.get_data_source_name().to_string())
                    .or_default()
                    .push(RouteMapper::new(table, each.get_table_name()));
            }
            if position == 0 {
                for (data_source, mappers) in mappers_by_data_source {
                    per_data_source.insert(data_source, vec![mappers]);
                }
            } else {
                per_data_source.retain(|data_source, _| mappers_by_data_source.contains_key(data_source));
                for (data_source, groups) in per_data_source.iter_mut() {
                    if let Some(mappers) = mappers_by_data_source.remove(data_source) {
                        groups.push(mappers);
                    }
                }
            }
        }
        let mut result = RouteContext::new();
        for (data_source, groups) in per_data_source {
            for table_mappers in cartesian_product(&groups) {
                result.add_route_unit(RouteUnit::new(RouteMapper::new(&data_source, &data_source), table_mappers));
            }
        }
        Ok(result)
    }

    fn route_data_nodes(&self, table_rule: &TableRule, condition_tables: &[&str], condition: Option<&ShardingCondition>) -> Result<Vec<DataNode>> {
        let data_sources = self.do_sharding(self.rule.get_database_strategy(table_rule), table_rule.get_actual_data_source_names(), condition_tables, condition)?;
        let mut result = vec![];
        for data_source in data_sources {
            let tables = self.do_sharding(self.rule.get_table_strategy(table_rule), table_rule.get_actual_table_names(&data_source), condition_tables, condition)?;
            for table in tables {
                result.push(DataNode::new(&data_source, &table));
            }
        }
        debug!("Sharding table `{}` routed to {:?}", table_rule.get_logic_table(), result);
        Ok(result)
    }

    fn do_sharding(&self, strategy: Option<&ShardingStrategy>, targets: Vec<String>, condition_tables: &[&str], condition: Option<&ShardingCondition>) -> Result<Vec<String>> {
        let strategy = match strategy {
            Some(strategy) => strategy,
            None => return Ok(targets),
        };
        match condition.and_then(|each| each.find_value(condition_tables, strategy.get_sharding_column())) {
            Some(value) => strategy.get_algorithm().do_sharding(&targets, strategy.get_sharding_column(), value),
            None => Ok(targets),
        }
    }

    fn get_strategies(&self, table_rule: &'a TableRule) -> Vec<&'a ShardingStrategy> {
        self.rule
            .get_database_strategy(table_rule)
            .into_iter()
            .chain(self.rule.get_table_strategy(table_rule))
            .collect()
    }

    fn find_table_rule(&self, table: &str) -> Result<&'a TableRule> {
        self.rule
            .find_table_rule(table)
            .ok_or_else(|| KernelError::UnsupportedSharding(format!("Can not find table rule with logic table `{}`", table)))
    }

    fn create_route_unit(data_node: &DataNode, table_mappers: Vec<RouteMapper>) -> RouteUnit {
        let data_source = data_node.get_data_source_name();
        RouteUnit::new(RouteMapper::new(data_source, data_source), table_mappers)
    }
}

impl<'a> SQLRouter for ShardingSQLRouter<'a> {
    fn create_route_context(&self, logic_sql: &LogicSQL, _connection: &ConnectionContext) -> Result<RouteContext> {
        let statement = logic_sql.get_statement_context();
        let table_names = statement.get_table_names();
        let sharding_tables = self.rule.get_sharding_logic_table_names(&table_names);
        let statement_type = statement.get_statement_type();
        let result = if statement_type.is_ddl() && !sharding_tables.is_empty() {
            self.route_ddl(&sharding_tables)
        } else if sharding_tables.is_empty() {
            if self.rule.is_all_broadcast_tables(&table_names) {
                self.route_broadcast(statement)
            } else {
                return Ok(RouteContext::new());
            }
        } else if statement_type == StatementType::Insert {
            self.route_insert(logic_sql, &sharding_tables[0])?
        } else if sharding_tables.len() == 1 || self.rule.is_all_binding_tables(&sharding_tables) {
            self.route_standard(logic_sql, &sharding_tables)?
        } else {
            self.route_cartesian(logic_sql, &sharding_tables)?
        };
        if result.is_empty() && !sharding_tables.is_empty() {
            return Err(KernelError::route(statement_type.to_string(), sharding_tables));
        }
        Ok(result)
    }

    fn decorate_route_context(&self, _route_context: &mut RouteContext, _logic_sql: &LogicSQL, _connection: &ConnectionContext) -> Result<()> {
        // sharding always runs first and creates the units
        Ok(())
    }
}

fn cartesian_product(groups: &[Vec<RouteMapper>]) -> Vec<Vec<RouteMapper>> {
    let mut result: Vec<Vec<RouteMapper>> = vec![vec![]];
    for group in groups {
        result = result
            .iter()
            .flat_map(|prefix| {
                group.iter().map(move |each| {
                    let mut combined = prefix.clone();
                    combined.push(each.clone());
                    combined
                })
            })
            .collect();
    }
    result
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{ColumnSegment, ExpressionSegment, InsertValuesSegment, OwnerSegment, PredicateOperator, PredicateSegment, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::route::context::{DataNode, RouteContext};
    use crate::route::sharding::ShardingSQLRouter;
    use crate::route::SQLRouter;
    use crate::rule::config::RulesConfiguration;
    use crate::rule::sharding::ShardingRule;
    use crate::session::ConnectionContext;
    use crate::value::SQLValue;

    const RULES: &str = r#"
data_sources: [ds_0, ds_1]
sharding:
  tables:
    t_order:
      actual_data_nodes: ["ds_${0..1}.t_order_${0..1}"]
      table_strategy: { sharding_column: order_id, algorithm: table_mod }
    t_order_item:
      actual_data_nodes: ["ds_${0..1}.t_order_item_${0..1}"]
      table_strategy: { sharding_column: order_id, algorithm: table_mod }
    t_user:
      actual_data_nodes: ["ds_${0..1}.t_user_${0..1}"]
      table_strategy: { sharding_column: user_id, algorithm: table_mod }
  binding_tables:
    - [t_order, t_order_item]
  broadcast_tables: [t_config]
  default_database_strategy: { sharding_column: user_id, algorithm: database_mod }
  algorithms:
    database_mod: { type: MOD, props: { sharding-count: 2 } }
    table_mod: { type: MOD, props: { sharding-count: 2 } }
"#;

    fn sharding_rule() -> ShardingRule {
        let config = RulesConfiguration::from_str(RULES).unwrap();
        ShardingRule::from_configuration(config.sharding.as_ref().unwrap(), &config.data_sources).unwrap()
    }

    fn route(statement: BoundStatementContext, parameters: Vec<SQLValue>) -> crate::error::Result<RouteContext> {
        let rule = sharding_rule();
        ShardingSQLRouter::new(&rule).create_route_context(&LogicSQL::new(statement, "", parameters), &ConnectionContext::default())
    }

    fn units(context: &RouteContext) -> Vec<String> {
        context.get_route_units().iter().map(|each| each.to_string()).collect()
    }

    fn equal(column: ColumnSegment, value: ExpressionSegment) -> PredicateSegment {
        PredicateSegment::new(column, PredicateOperator::Equal, vec![value])
    }

    #[test]
    fn test_standard_route_with_conditions() {
        // SELECT * FROM t_order WHERE user_id = 1 AND order_id = ?
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .predicate(equal(ColumnSegment::new(28, 34, "user_id"), ExpressionSegment::literal(38, 38, SQLValue::Int(1))))
            .predicate(equal(ColumnSegment::new(44, 51, "order_id"), ExpressionSegment::parameter(55, 0)))
            .build();
        let context = route(statement, vec![SQLValue::Int(2)]).unwrap();
        assert_eq!(units(&context), vec!["ds_1[t_order_0]"]);
    }

    #[test]
    fn test_full_route_without_conditions() {
        let statement = BoundStatementContext::builder(StatementType::Select).table(TableSegment::new(14, 20, "t_order")).build();
        let context = route(statement, vec![]).unwrap();
        assert_eq!(units(&context), vec!["ds_0[t_order_0]", "ds_0[t_order_1]", "ds_1[t_order_0]", "ds_1[t_order_1]"]);
    }

    #[test]
    fn test_binding_route() {
        // SELECT * FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id WHERE o.order_id = 3 AND o.user_id = 0
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order").with_alias("o"))
            .table(TableSegment::new(29, 40, "t_order_item").with_alias("i"))
            .predicate(equal(
                ColumnSegment::new(80, 89, "order_id").with_owner(OwnerSegment::new(80, 80, "o")),
                ExpressionSegment::literal(93, 93, SQLValue::Int(3)),
            ))
            .predicate(equal(
                ColumnSegment::new(99, 107, "user_id").with_owner(OwnerSegment::new(99, 99, "o")),
                ExpressionSegment::literal(111, 111, SQLValue::Int(0)),
            ))
            .build();
        let context = route(statement, vec![]).unwrap();
        assert_eq!(units(&context), vec!["ds_0[t_order_1, t_order_item_1]"]);
    }

    #[test]
    fn test_cartesian_route() {
        // SELECT * FROM t_order o JOIN t_user u ON ... WHERE o.user_id = 1 AND u.user_id = 1
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order").with_alias("o"))
            .table(TableSegment::new(29, 34, "t_user").with_alias("u"))
            .predicate(equal(
                ColumnSegment::new(60, 68, "user_id").with_owner(OwnerSegment::new(60, 60, "o")),
                ExpressionSegment::literal(72, 72, SQLValue::Int(1)),
            ))
            .predicate(equal(
                ColumnSegment::new(78, 86, "user_id").with_owner(OwnerSegment::new(78, 78, "u")),
                ExpressionSegment::literal(90, 90, SQLValue::Int(1)),
            ))
            .build();
        let context = route(statement, vec![]).unwrap();
        assert_eq!(units(&context), vec!["ds_1[t_order_0, t_user_1]", "ds_1[t_order_1, t_user_1]"]);
    }

    #[test]
    fn test_insert_route_records_row_data_nodes() {
        // INSERT INTO t_order (user_id, order_id) VALUES (?, ?), (?, ?)
        let statement = BoundStatementContext::builder(StatementType::Insert)
            .table(TableSegment::new(12, 18, "t_order"))
            .insert_column(ColumnSegment::new(21, 27, "user_id"))
            .insert_column(ColumnSegment::new(30, 37, "order_id"))
            .insert_values(InsertValuesSegment::new(47, 52, vec![ExpressionSegment::parameter(48, 0), ExpressionSegment::parameter(51, 1)]))
            .insert_values(InsertValuesSegment::new(55, 60, vec![ExpressionSegment::parameter(56, 2), ExpressionSegment::parameter(59, 3)]))
            .build();
        let parameters = vec![SQLValue::Int(1), SQLValue::Int(10), SQLValue::Int(2), SQLValue::Int(11)];
        let context = route(statement, parameters).unwrap();
        assert_eq!(units(&context), vec!["ds_0[t_order_1]", "ds_1[t_order_0]"]);
        assert_eq!(
            context.get_original_data_nodes(),
            &[vec![DataNode::new("ds_1", "t_order_0")], vec![DataNode::new("ds_0", "t_order_1")]][..]
        );
    }

    #[test]
    fn test_insert_without_sharding_column() {
        let statement = BoundStatementContext::builder(StatementType::Insert)
            .table(TableSegment::new(12, 18, "t_order"))
            .insert_column(ColumnSegment::new(21, 27, "user_id"))
            .insert_values(InsertValuesSegment::new(37, 39, vec![ExpressionSegment::parameter(38, 0)]))
            .build();
        let err = route(statement, vec![SQLValue::Int(1)]).unwrap_err();
        assert_eq!(err, KernelError::UnsupportedSharding("Missing sharding column `order_id` of table `t_order` in INSERT".to_string()));
    }

    #[test]
    fn test_broadcast_and_ddl() {
        let update = BoundStatementContext::builder(StatementType::Update).table(TableSegment::new(7, 14, "t_config")).build();
        assert_eq!(units(&route(update, vec![]).unwrap()), vec!["ds_0", "ds_1"]);
        let select = BoundStatementContext::builder(StatementType::Select).table(TableSegment::new(14, 21, "t_config")).build();
        assert_eq!(units(&route(select, vec![]).unwrap()), vec!["ds_0"]);
        let truncate = BoundStatementContext::builder(StatementType::Truncate).table(TableSegment::new(15, 21, "t_order")).build();
        assert_eq!(route(truncate, vec![]).unwrap().get_route_units().len(), 4);
    }

    #[test]
    fn test_unknown_tables_are_left_to_other_rules() {
        let statement = BoundStatementContext::builder(StatementType::Select).table(TableSegment::new(14, 19, "t_misc")).build();
        assert!(route(statement, vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_no_data_node_matches() {
        // SELECT * FROM t_order WHERE order_id IN ()
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .predicate(PredicateSegment::new(ColumnSegment::new(28, 35, "order_id"), PredicateOperator::In, vec![]))
            .build();
        let err = route(statement, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "`SELECT table` can not route correctly for table `[t_order]`");
    }
}
