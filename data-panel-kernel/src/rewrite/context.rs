use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::parameter::builder::ParameterBuilder;
use crate::rewrite::parameter::rewriter::ParameterRewriters;
use crate::rewrite::token::generator::SQLTokenGenerators;
use crate::rewrite::token::SQLToken;
use crate::route::context::RouteContext;
use crate::rule::RuleMetaData;

/**
 * Everything the rewrite of one statement needs, computed once for all route
 * units: the tokens of every rule and the rewritten parameters.
 */
#[derive(Debug)]
pub struct SQLRewriteContext<'a> {
    logic_sql: &'a LogicSQL,
    sql_tokens: Vec<SQLToken>,
    parameter_builder: ParameterBuilder,
}

impl<'a> SQLRewriteContext<'a> {
    pub fn new(logic_sql: &'a LogicSQL, rules: &RuleMetaData, route_context: &RouteContext) -> Result<Self> {
        let sql_tokens = SQLTokenGenerators::create(rules).generate_sql_tokens(logic_sql, route_context)?;
        let mut parameter_builder = ParameterBuilder::create(logic_sql)?;
        ParameterRewriters::create(rules).rewrite(&mut parameter_builder, logic_sql, route_context)?;
        Ok(SQLRewriteContext {
            logic_sql,
            sql_tokens,
            parameter_builder,
        })
    }

    /// Context with tokens made elsewhere, parameters untouched.
    pub fn with_tokens(logic_sql: &'a LogicSQL, sql_tokens: Vec<SQLToken>) -> Result<Self> {
        Ok(SQLRewriteContext {
            logic_sql,
            sql_tokens,
            parameter_builder: ParameterBuilder::create(logic_sql)?,
        })
    }

    pub fn get_logic_sql(&self) -> &LogicSQL {
        self.logic_sql
    }

    pub fn get_sql(&self) -> &str {
        self.logic_sql.get_sql()
    }

    pub fn get_sql_tokens(&self) -> &[SQLToken] {
        &self.sql_tokens
    }

    pub fn get_parameter_builder(&self) -> &ParameterBuilder {
        &self.parameter_builder
    }
}
