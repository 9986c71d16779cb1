use std::collections::BTreeMap;

use log::debug;

use crate::error::{KernelError, Result};
use crate::rewrite::builder::{count_placeholders, RouteSQLBuilder};
use crate::rewrite::context::SQLRewriteContext;
use crate::route::context::{RouteContext, RouteUnit};
use crate::value::SQLValue;

/// SQL and parameters sent to one route unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SQLRewriteUnit {
    sql: String,
    parameters: Vec<SQLValue>,
}

impl SQLRewriteUnit {
    pub fn new(sql: String, parameters: Vec<SQLValue>) -> Self {
        SQLRewriteUnit { sql, parameters }
    }

    pub fn get_sql(&self) -> &str {
        &self.sql
    }

    pub fn get_parameters(&self) -> &[SQLValue] {
        &self.parameters
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSQLRewriteResult {
    sql_rewrite_units: BTreeMap<RouteUnit, SQLRewriteUnit>,
}

impl RouteSQLRewriteResult {
    pub fn get_sql_rewrite_units(&self) -> &BTreeMap<RouteUnit, SQLRewriteUnit> {
        &self.sql_rewrite_units
    }

    pub fn into_sql_rewrite_units(self) -> BTreeMap<RouteUnit, SQLRewriteUnit> {
        self.sql_rewrite_units
    }
}

/**
 * Produce one SQL per route unit.
 *
 * Tokens are spliced in position order; the number of `?` left in the SQL has
 * to match the parameters the unit receives.
 */
#[derive(Debug, Default)]
pub struct RouteSQLRewriteEngine;

impl RouteSQLRewriteEngine {
    pub fn new() -> Self {
        RouteSQLRewriteEngine
    }

    pub fn rewrite(&self, context: &SQLRewriteContext<'_>, route_context: &RouteContext) -> Result<RouteSQLRewriteResult> {
        let mut result = RouteSQLRewriteResult::default();
        let ddl = context.get_logic_sql().get_statement_context().get_statement_type().is_ddl();
        for each in route_context.get_route_units() {
            let sql = RouteSQLBuilder::new(context, each).to_sql()?;
            let parameters = if ddl {
                vec![]
            } else {
                context.get_parameter_builder().get_parameters_for(each, route_context)
            };
            let expected = count_placeholders(&sql);
            if !ddl && expected != parameters.len() {
                return Err(KernelError::ParameterMismatch {
                    data_source: each.get_data_source_mapper().get_actual_name().to_string(),
                    expected,
                    actual: parameters.len(),
                });
            }
            debug!("Rewrote SQL for {}: {}", each, sql);
            result.sql_rewrite_units.insert(each.clone(), SQLRewriteUnit::new(sql, parameters));
        }
        Ok(result)
    }
}
