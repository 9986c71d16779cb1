use log::debug;

use crate::error::{KernelError, Result};
use crate::logic::LogicSQL;
use crate::route::context::RouteContext;
use crate::route::readwrite::ReadwriteSplittingSQLRouter;
use crate::route::shadow::ShadowSQLRouter;
use crate::route::sharding::ShardingSQLRouter;
use crate::route::single::SingleSQLRouter;
use crate::route::SQLRouter;
use crate::rule::{Rule, RuleMetaData};
use crate::session::ConnectionContext;

/**
 * Run the routers of the configured rules in rule order.
 *
 * The first router facing an empty context creates it, every router after
 * that decorates it. No unit at the end is a route failure naming the
 * statement and its tables.
 */
pub struct SQLRouteEngine<'a> {
    rules: &'a RuleMetaData,
}

impl<'a> SQLRouteEngine<'a> {
    pub fn new(rules: &'a RuleMetaData) -> Self {
        SQLRouteEngine { rules }
    }

    pub fn route(&self, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<RouteContext> {
        let mut result = RouteContext::new();
        for rule in self.rules.get_rules() {
            let router = match create_router(rule) {
                Some(router) => router,
                None => continue,
            };
            if result.is_empty() {
                result = router.create_route_context(logic_sql, connection)?;
            } else {
                router.decorate_route_context(&mut result, logic_sql, connection)?;
            }
            debug!("Route units after {} rule: {:?}", rule.get_type(), result.get_route_units().iter().map(|each| each.to_string()).collect::<Vec<_>>());
        }
        if result.is_empty() {
            let statement = logic_sql.get_statement_context();
            return Err(KernelError::route(statement.get_statement_type().to_string(), statement.get_table_names()));
        }
        Ok(result)
    }
}

fn create_router(rule: &Rule) -> Option<Box<dyn SQLRouter + '_>> {
    match rule {
        Rule::Sharding(each) => Some(Box::new(ShardingSQLRouter::new(each))),
        Rule::Single(each) => Some(Box::new(SingleSQLRouter::new(each))),
        Rule::ReadwriteSplitting(each) => Some(Box::new(ReadwriteSplittingSQLRouter::new(each))),
        Rule::Shadow(each) => Some(Box::new(ShadowSQLRouter::new(each))),
        Rule::Encrypt(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{ColumnSegment, ExpressionSegment, PredicateOperator, PredicateSegment, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::route::context::RouteMapper;
    use crate::route::engine::SQLRouteEngine;
    use crate::rule::{Rule, RuleMetaData};
    use crate::rule::single::SingleRule;
    use crate::session::ConnectionContext;
    use crate::value::SQLValue;

    fn select(table: &str) -> LogicSQL {
        let statement = BoundStatementContext::builder(StatementType::Select).table(TableSegment::new(14, 14 + table.len() - 1, table)).build();
        LogicSQL::new(statement, &format!("SELECT * FROM {}", table), vec![])
    }

    #[test]
    fn test_route_success() {
        // logic `ds` backed by the primary `ds_0`
        let rules = RuleMetaData::from_yaml(
            r#"
readwrite_splitting:
  data_sources:
    ds: { write_data_source: ds_0 }
"#,
        )
        .unwrap();
        let context = SQLRouteEngine::new(&rules).route(&select("t_order"), &ConnectionContext::default()).unwrap();
        assert_eq!(context.get_route_units().len(), 1);
        let unit = context.get_route_units().iter().next().unwrap();
        assert_eq!(unit.get_data_source_mapper(), &RouteMapper::new("ds", "ds_0"));
        assert!(unit.get_table_mappers().is_empty());
    }

    #[test]
    fn test_route_failure() {
        let rules = RuleMetaData::new(vec![Rule::Single(SingleRule::new(None).with_table("t_user", vec!["ds_0".to_string()]))]);
        let err = SQLRouteEngine::new(&rules).route(&select("t_order"), &ConnectionContext::default()).unwrap_err();
        assert_eq!(err, KernelError::route("SELECT", vec!["t_order".to_string()]));
        let empty = RuleMetaData::default();
        assert!(SQLRouteEngine::new(&empty).route(&select("t_order"), &ConnectionContext::default()).is_err());
    }

    #[test]
    fn test_sharding_then_readwrite_splitting() {
        let rules = RuleMetaData::from_yaml(
            r#"
data_sources: [ds_0, ds_1]
sharding:
  tables:
    t_order:
      actual_data_nodes: ["ds_${0..1}.t_order_${0..1}"]
      database_strategy: { sharding_column: user_id, algorithm: mod }
      table_strategy: { sharding_column: order_id, algorithm: mod }
  algorithms:
    mod: { type: MOD, props: { sharding-count: 2 } }
readwrite_splitting:
  data_sources:
    ds_1: { write_data_source: write_1, read_data_sources: [read_1] }
"#,
        )
        .unwrap();
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .predicate(PredicateSegment::new(ColumnSegment::new(28, 34, "user_id"), PredicateOperator::Equal, vec![ExpressionSegment::parameter(38, 0)]))
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order WHERE user_id = ?", vec![SQLValue::Int(3)]);
        let context = SQLRouteEngine::new(&rules).route(&logic_sql, &ConnectionContext::default()).unwrap();
        let units: Vec<String> = context.get_route_units().iter().map(|each| each.to_string()).collect();
        assert_eq!(units, vec!["read_1[t_order_0]", "read_1[t_order_1]"]);
    }

    #[test]
    fn test_sharding_and_single_tables() {
        let rules = RuleMetaData::from_yaml(
            r#"
data_sources: [ds_0, ds_1]
sharding:
  tables:
    t_order:
      actual_data_nodes: ["ds_${0..1}.t_order"]
      database_strategy: { sharding_column: user_id, algorithm: mod }
  algorithms:
    mod: { type: MOD, props: { sharding-count: 2 } }
single:
  tables: { t_user: [ds_1] }
"#,
        )
        .unwrap();
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order"))
            .table(TableSegment::new(27, 32, "t_user"))
            .build();
        let logic_sql = LogicSQL::new(statement, "SELECT * FROM t_order JOIN t_user USING (user_id)", vec![]);
        let context = SQLRouteEngine::new(&rules).route(&logic_sql, &ConnectionContext::default()).unwrap();
        assert_eq!(context.get_actual_data_source_names(), vec!["ds_1"]);
    }
}
