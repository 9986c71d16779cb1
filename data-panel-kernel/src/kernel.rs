use log::info;

use data_panel_common::config::ConfigurationProperties;

use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::context::SQLRewriteContext;
use crate::rewrite::engine::RouteSQLRewriteEngine;
use crate::route::context::RouteContext;
use crate::route::engine::SQLRouteEngine;
use crate::rule::RuleMetaData;
use crate::session::ConnectionContext;
use crate::value::SQLValue;

/// One actual SQL bound to the data source it runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    data_source_name: String,
    sql: String,
    parameters: Vec<SQLValue>,
}

impl ExecutionUnit {
    pub fn new(data_source_name: &str, sql: String, parameters: Vec<SQLValue>) -> Self {
        ExecutionUnit {
            data_source_name: data_source_name.to_string(),
            sql,
            parameters,
        }
    }

    pub fn get_data_source_name(&self) -> &str {
        &self.data_source_name
    }

    pub fn get_sql(&self) -> &str {
        &self.sql
    }

    pub fn get_parameters(&self) -> &[SQLValue] {
        &self.parameters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    route_context: RouteContext,
    execution_units: Vec<ExecutionUnit>,
}

impl ExecutionContext {
    pub fn get_route_context(&self) -> &RouteContext {
        &self.route_context
    }

    pub fn get_execution_units(&self) -> &[ExecutionUnit] {
        &self.execution_units
    }
}

/**
 * Route a logic SQL and rewrite it for every route unit.
 *
 * Units come out in route unit order. With `sql_show` on, the logic SQL and
 * every actual SQL are logged at info level.
 */
pub struct KernelProcessor;

impl KernelProcessor {
    pub fn generate_execution_context(
        logic_sql: &LogicSQL,
        rules: &RuleMetaData,
        props: &ConfigurationProperties,
        connection: &ConnectionContext,
    ) -> Result<ExecutionContext> {
        let route_context = SQLRouteEngine::new(rules).route(logic_sql, connection)?;
        let rewrite_context = SQLRewriteContext::new(logic_sql, rules, &route_context)?;
        let rewrite_result = RouteSQLRewriteEngine::new().rewrite(&rewrite_context, &route_context)?;
        let execution_units: Vec<ExecutionUnit> = rewrite_result
            .into_sql_rewrite_units()
            .into_iter()
            .map(|(unit, each)| {
                let data_source = unit.get_data_source_mapper().get_actual_name();
                ExecutionUnit::new(data_source, each.get_sql().to_string(), each.get_parameters().to_vec())
            })
            .collect();
        if props.is_sql_show() {
            log_sql(logic_sql, &execution_units, props.is_sql_simple());
        }
        Ok(ExecutionContext {
            route_context,
            execution_units,
        })
    }
}

fn log_sql(logic_sql: &LogicSQL, execution_units: &[ExecutionUnit], simple: bool) {
    info!("Logic SQL: {}", logic_sql.get_sql());
    for each in execution_units {
        if simple || each.get_parameters().is_empty() {
            info!("Actual SQL: {} ::: {}", each.get_data_source_name(), each.get_sql());
        } else {
            info!("Actual SQL: {} ::: {} ::: {}", each.get_data_source_name(), each.get_sql(), format_parameters(each.get_parameters()));
        }
    }
}

fn format_parameters(parameters: &[SQLValue]) -> String {
    let values: Vec<String> = parameters.iter().map(|each| each.to_string()).collect();
    format!("[{}]", values.join(", "))
}
