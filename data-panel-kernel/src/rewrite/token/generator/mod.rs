use log::debug;

use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rewrite::token::generator::encrypt::{
    EncryptAssignmentTokenGenerator, EncryptInsertCipherNameTokenGenerator, EncryptInsertDerivedColumnsTokenGenerator,
    EncryptInsertValuesTokenGenerator, EncryptPredicateColumnTokenGenerator, EncryptPredicateValueTokenGenerator,
    EncryptProjectionTokenGenerator,
};
use crate::rewrite::token::generator::sharding::{
    OwnerTokenGenerator, PaginationTokenGenerator, ShardingInsertValuesTokenGenerator, TableTokenGenerator,
};
use crate::rewrite::token::SQLToken;
use crate::route::context::RouteContext;
use crate::rule::RuleMetaData;

pub mod encrypt;
pub mod sharding;

/**
 * Produce the tokens one rule contributes to a statement.
 *
 * `previous_tokens` holds what earlier generators produced, so a generator
 * can take over a token it re-renders with more information.
 */
pub trait SQLTokenGenerator {
    fn is_generate_sql_token(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> bool;

    fn generate_sql_tokens(&self, logic_sql: &LogicSQL, route_context: &RouteContext, previous_tokens: &[SQLToken]) -> Result<Vec<SQLToken>>;
}

/// Generators of every rule, in a fixed order: sharding first, encrypt after.
pub struct SQLTokenGenerators<'a> {
    generators: Vec<Box<dyn SQLTokenGenerator + 'a>>,
}

impl<'a> SQLTokenGenerators<'a> {
    pub fn new() -> Self {
        SQLTokenGenerators { generators: vec![] }
    }

    pub fn create(rules: &'a RuleMetaData) -> Self {
        let mut result = SQLTokenGenerators::new();
        if let Some(rule) = rules.find_sharding_rule() {
            result.add(TableTokenGenerator::new(rule));
            result.add(OwnerTokenGenerator::new(rule));
            result.add(PaginationTokenGenerator);
            result.add(ShardingInsertValuesTokenGenerator);
        }
        if let Some(rule) = rules.find_encrypt_rule() {
            result.add(EncryptInsertCipherNameTokenGenerator::new(rule));
            result.add(EncryptInsertDerivedColumnsTokenGenerator::new(rule));
            result.add(EncryptInsertValuesTokenGenerator::new(rule));
            result.add(EncryptProjectionTokenGenerator::new(rule));
            result.add(EncryptPredicateColumnTokenGenerator::new(rule));
            result.add(EncryptPredicateValueTokenGenerator::new(rule));
            result.add(EncryptAssignmentTokenGenerator::new(rule));
        }
        result
    }

    pub fn add<G: SQLTokenGenerator + 'a>(&mut self, generator: G) {
        self.generators.push(Box::new(generator));
    }

    pub fn generate_sql_tokens(&self, logic_sql: &LogicSQL, route_context: &RouteContext) -> Result<Vec<SQLToken>> {
        let mut result: Vec<SQLToken> = vec![];
        for generator in &self.generators {
            if !generator.is_generate_sql_token(logic_sql, route_context) {
                continue;
            }
            let tokens = generator.generate_sql_tokens(logic_sql, route_context, &result)?;
            result.retain(|previous| !tokens.iter().any(|each| each.supersedes(previous)));
            result.extend(tokens);
        }
        debug!("Generated {} SQL tokens", result.len());
        Ok(result)
    }
}

impl Default for SQLTokenGenerators<'_> {
    fn default() -> Self {
        SQLTokenGenerators::new()
    }
}

/// Original text between two inclusive character offsets.
pub(crate) fn get_text(sql: &str, start_index: usize, stop_index: usize) -> String {
    sql.chars().skip(start_index).take(stop_index + 1 - start_index).collect()
}
