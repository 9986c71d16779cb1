use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{KernelError, Result};
use crate::logic::LogicSQL;
use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
use crate::route::SQLRouter;
use crate::rule::readwrite::{ReadwriteSplittingDataSourceRule, ReadwriteSplittingRule};
use crate::session::ConnectionContext;

pub struct ReadwriteSplittingSQLRouter<'a> {
    rule: &'a ReadwriteSplittingRule,
}

impl<'a> ReadwriteSplittingSQLRouter<'a> {
    pub fn new(rule: &'a ReadwriteSplittingRule) -> Self {
        ReadwriteSplittingSQLRouter { rule }
    }

    /// Writes, locking reads, transactions and hinted statements stay on the primary.
    fn is_primary_route(logic_sql: &LogicSQL, connection: &ConnectionContext) -> bool {
        let statement = logic_sql.get_statement_context();
        !statement.is_query() || statement.is_lock() || connection.is_in_transaction() || connection.get_hint().is_write_route_only()
    }

    fn route(data_source_rule: &'a ReadwriteSplittingDataSourceRule, primary: bool) -> &'a str {
        if primary {
            data_source_rule.get_write_data_source()
        } else {
            data_source_rule.get_read_data_source()
        }
    }
}

impl<'a> SQLRouter for ReadwriteSplittingSQLRouter<'a> {
    fn create_route_context(&self, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<RouteContext> {
        let mut result = RouteContext::new();
        let data_source_rule = match self.rule.get_data_source_rules() {
            [] => return Ok(result),
            [only] => only,
            many => {
                return Err(KernelError::AmbiguousRoute {
                    object: logic_sql.get_statement_context().get_table_names().join(", "),
                    candidates: many.iter().map(|each| each.get_name().to_string()).collect(),
                })
            }
        };
        let actual = Self::route(data_source_rule, Self::is_primary_route(logic_sql, connection));
        debug!("Read/write splitting group `{}` routed to `{}`", data_source_rule.get_name(), actual);
        result.add_route_unit(RouteUnit::new(RouteMapper::new(data_source_rule.get_name(), actual), vec![]));
        Ok(result)
    }

    fn decorate_route_context(&self, route_context: &mut RouteContext, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<()> {
        let primary = Self::is_primary_route(logic_sql, connection);
        // one choice per group for the whole statement
        let mut chosen: BTreeMap<&str, &str> = BTreeMap::new();
        let mut route_units = BTreeSet::new();
        for each in route_context.get_route_units() {
            let actual = each.get_data_source_mapper().get_actual_name();
            match self.rule.find_data_source_rule(actual) {
                Some(data_source_rule) => {
                    let target = *chosen
                        .entry(data_source_rule.get_name())
                        .or_insert_with(|| Self::route(data_source_rule, primary));
                    route_units.insert(each.with_actual_data_source(target));
                }
                None => {
                    route_units.insert(each.clone());
                }
            }
        }
        route_context.replace_route_units(route_units);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use crate::binder::segment::TableSegment;
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
    use crate::route::readwrite::ReadwriteSplittingSQLRouter;
    use crate::route::SQLRouter;
    use crate::rule::readwrite::{LoadBalanceAlgorithm, ReadwriteSplittingDataSourceRule, ReadwriteSplittingRule};
    use crate::session::{ConnectionContext, HintValueContext};

    fn group(name: &str) -> ReadwriteSplittingDataSourceRule {
        ReadwriteSplittingDataSourceRule::new(
            name,
            &format!("{}_write", name),
            vec![format!("{}_read_0", name), format!("{}_read_1", name)],
            Arc::new(LoadBalanceAlgorithm::RoundRobin(AtomicUsize::new(0))),
        )
    }

    fn logic_sql(statement_type: StatementType, lock: bool) -> LogicSQL {
        let statement = BoundStatementContext::builder(statement_type).table(TableSegment::new(14, 20, "t_user")).lock(lock).build();
        LogicSQL::new(statement, "", vec![])
    }

    fn actual(context: &RouteContext) -> Vec<&str> {
        context.get_actual_data_source_names()
    }

    #[test]
    fn test_query_goes_to_replica() {
        let rule = ReadwriteSplittingRule::new(vec![group("ds")]);
        let router = ReadwriteSplittingSQLRouter::new(&rule);
        let context = router.create_route_context(&logic_sql(StatementType::Select, false), &ConnectionContext::default()).unwrap();
        assert_eq!(actual(&context), vec!["ds_read_0"]);
        let context = router.create_route_context(&logic_sql(StatementType::Select, false), &ConnectionContext::default()).unwrap();
        assert_eq!(actual(&context), vec!["ds_read_1"]);
        assert_eq!(context.get_route_units().iter().next().unwrap().get_data_source_mapper().get_logic_name(), "ds");
    }

    #[test]
    fn test_primary_route() {
        let rule = ReadwriteSplittingRule::new(vec![group("ds")]);
        let router = ReadwriteSplittingSQLRouter::new(&rule);
        let insert = router.create_route_context(&logic_sql(StatementType::Insert, false), &ConnectionContext::default()).unwrap();
        assert_eq!(actual(&insert), vec!["ds_write"]);
        let locked = router.create_route_context(&logic_sql(StatementType::Select, true), &ConnectionContext::default()).unwrap();
        assert_eq!(actual(&locked), vec!["ds_write"]);
        let in_transaction = ConnectionContext::new(true, HintValueContext::default());
        assert_eq!(actual(&router.create_route_context(&logic_sql(StatementType::Select, false), &in_transaction).unwrap()), vec!["ds_write"]);
        let hinted = ConnectionContext::new(false, HintValueContext::new(true, false));
        assert_eq!(actual(&router.create_route_context(&logic_sql(StatementType::Select, false), &hinted).unwrap()), vec!["ds_write"]);
    }

    #[test]
    fn test_several_groups_are_ambiguous() {
        let rule = ReadwriteSplittingRule::new(vec![group("ds_0"), group("ds_1")]);
        let err = ReadwriteSplittingSQLRouter::new(&rule)
            .create_route_context(&logic_sql(StatementType::Select, false), &ConnectionContext::default())
            .unwrap_err();
        assert_eq!(err, KernelError::AmbiguousRoute { object: "t_user".to_string(), candidates: vec!["ds_0".to_string(), "ds_1".to_string()] });
    }

    #[test]
    fn test_decorate_sharding_units() {
        let rule = ReadwriteSplittingRule::new(vec![group("ds_0")]);
        let mut context = RouteContext::new();
        context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_0")]));
        context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_1")]));
        context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_1", "ds_1"), vec![RouteMapper::new("t_order", "t_order_0")]));
        ReadwriteSplittingSQLRouter::new(&rule)
            .decorate_route_context(&mut context, &logic_sql(StatementType::Select, false), &ConnectionContext::default())
            .unwrap();
        let units: Vec<String> = context.get_route_units().iter().map(|each| each.to_string()).collect();
        assert_eq!(units, vec!["ds_0_read_0[t_order_0]", "ds_0_read_0[t_order_1]", "ds_1[t_order_0]"]);
    }
}
