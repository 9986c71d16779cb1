use std::collections::BTreeSet;

use log::debug;

use crate::error::{KernelError, Result};
use crate::logic::LogicSQL;
use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
use crate::route::SQLRouter;
use crate::rule::single::SingleRule;
use crate::session::ConnectionContext;

pub struct SingleSQLRouter<'a> {
    rule: &'a SingleRule,
}

impl<'a> SingleSQLRouter<'a> {
    pub fn new(rule: &'a SingleRule) -> Self {
        SingleSQLRouter { rule }
    }

    /// The one data source all single tables of the statement live in.
    fn find_data_source(&self, logic_sql: &LogicSQL, single_tables: &[String]) -> Result<Option<String>> {
        let mut result: Option<String> = None;
        for table in single_tables {
            let candidates = self.rule.find_data_sources(table).unwrap_or_default();
            let data_source = match candidates {
                [only] => only,
                [] => continue,
                _ => {
                    return Err(KernelError::AmbiguousRoute {
                        object: table.clone(),
                        candidates: candidates.to_vec(),
                    })
                }
            };
            if result.as_ref().map_or(false, |each| each != data_source) {
                return Err(KernelError::route(
                    logic_sql.get_statement_context().get_statement_type().to_string(),
                    single_tables.to_vec(),
                ));
            }
            result = Some(data_source.clone());
        }
        Ok(result)
    }

    fn create_table_mappers(single_tables: &[String]) -> Vec<RouteMapper> {
        single_tables.iter().map(|each| RouteMapper::new(each, each)).collect()
    }
}

impl<'a> SQLRouter for SingleSQLRouter<'a> {
    fn create_route_context(&self, logic_sql: &LogicSQL, _connection: &ConnectionContext) -> Result<RouteContext> {
        let table_names = logic_sql.get_statement_context().get_table_names();
        let mut result = RouteContext::new();
        if table_names.is_empty() {
            if let Some(default) = self.rule.get_default_data_source() {
                result.add_route_unit(RouteUnit::new(RouteMapper::new(default, default), vec![]));
            }
            return Ok(result);
        }
        let single_tables = self.rule.get_single_table_names(&table_names);
        if single_tables.len() != table_names.len() {
            // some table is unknown to this rule
            return Ok(result);
        }
        if let Some(data_source) = self.find_data_source(logic_sql, &single_tables)? {
            debug!("Single tables {:?} routed to `{}`", single_tables, data_source);
            result.add_route_unit(RouteUnit::new(RouteMapper::new(&data_source, &data_source), Self::create_table_mappers(&single_tables)));
        }
        Ok(result)
    }

    fn decorate_route_context(&self, route_context: &mut RouteContext, logic_sql: &LogicSQL, _connection: &ConnectionContext) -> Result<()> {
        let single_tables = self.rule.get_single_table_names(&logic_sql.get_statement_context().get_table_names());
        let data_source = match self.find_data_source(logic_sql, &single_tables)? {
            Some(data_source) => data_source,
            None => return Ok(()),
        };
        let table_mappers = Self::create_table_mappers(&single_tables);
        let route_units: BTreeSet<RouteUnit> = route_context
            .get_route_units()
            .iter()
            .filter(|each| each.get_data_source_mapper().get_logic_name() == data_source)
            .map(|each| each.with_table_mappers(table_mappers.clone()))
            .collect();
        if route_units.is_empty() {
            return Err(KernelError::route(
                logic_sql.get_statement_context().get_statement_type().to_string(),
                logic_sql.get_statement_context().get_table_names(),
            ));
        }
        route_context.replace_route_units(route_units);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::TableSegment;
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::route::context::{RouteContext, RouteMapper, RouteUnit};
    use crate::route::single::SingleSQLRouter;
    use crate::route::SQLRouter;
    use crate::rule::single::SingleRule;
    use crate::session::ConnectionContext;

    fn rule() -> SingleRule {
        SingleRule::new(Some("ds_0"))
            .with_table("t_user", vec!["ds_0".to_string()])
            .with_table("t_role", vec!["ds_1".to_string()])
            .with_table("t_dup", vec!["ds_0".to_string(), "ds_1".to_string()])
    }

    fn select(tables: &[&str]) -> LogicSQL {
        let mut builder = BoundStatementContext::builder(StatementType::Select);
        for each in tables {
            builder = builder.table(TableSegment::new(14, 14 + each.len() - 1, each));
        }
        LogicSQL::new(builder.build(), "", vec![])
    }

    #[test]
    fn test_create() {
        let rule = rule();
        let router = SingleSQLRouter::new(&rule);
        let context = router.create_route_context(&select(&["t_user"]), &ConnectionContext::default()).unwrap();
        let unit = context.get_route_units().iter().next().unwrap();
        assert_eq!(unit.get_data_source_mapper(), &RouteMapper::new("ds_0", "ds_0"));
        assert_eq!(unit.find_actual_table("t_user"), Some("t_user"));
        let default = router.create_route_context(&select(&[]), &ConnectionContext::default()).unwrap();
        assert_eq!(default.get_actual_data_source_names(), vec!["ds_0"]);
        assert!(router.create_route_context(&select(&["t_user", "t_other"]), &ConnectionContext::default()).unwrap().is_empty());
    }

    #[test]
    fn test_create_failures() {
        let rule = rule();
        let router = SingleSQLRouter::new(&rule);
        let err = router.create_route_context(&select(&["t_dup"]), &ConnectionContext::default()).unwrap_err();
        assert_eq!(err, KernelError::AmbiguousRoute { object: "t_dup".to_string(), candidates: vec!["ds_0".to_string(), "ds_1".to_string()] });
        let err = router.create_route_context(&select(&["t_user", "t_role"]), &ConnectionContext::default()).unwrap_err();
        assert_eq!(err.to_string(), "`SELECT table` can not route correctly for table `[t_user, t_role]`");
    }

    #[test]
    fn test_decorate_keeps_units_on_single_data_source() {
        let rule = rule();
        let mut context = RouteContext::new();
        context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_0")]));
        context.add_route_unit(RouteUnit::new(RouteMapper::new("ds_1", "ds_1"), vec![RouteMapper::new("t_order", "t_order_0")]));
        let logic_sql = select(&["t_order", "t_role"]);
        SingleSQLRouter::new(&rule).decorate_route_context(&mut context, &logic_sql, &ConnectionContext::default()).unwrap();
        assert_eq!(context.get_route_units().len(), 1);
        assert_eq!(context.get_route_units().iter().next().unwrap().to_string(), "ds_1[t_order_0, t_role]");
    }
}
