use std::collections::BTreeMap;

use crate::error::{KernelError, Result};
use crate::rule::config::SingleRuleConfiguration;

/// Tables that are not split, each living in one data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleRule {
    default_data_source: Option<String>,
    /// Lower-cased table name to the data sources it was found in.
    tables: BTreeMap<String, Vec<String>>,
}

impl SingleRule {
    pub fn new(default_data_source: Option<&str>) -> Self {
        SingleRule {
            default_data_source: default_data_source.map(str::to_string),
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: &str, data_sources: Vec<String>) -> Self {
        self.tables.insert(table.to_lowercase(), data_sources);
        self
    }

    pub fn from_configuration(config: &SingleRuleConfiguration, data_sources: &[String]) -> Result<Self> {
        if let Some(default) = &config.default_data_source {
            if !data_sources.is_empty() && !data_sources.contains(default) {
                return Err(KernelError::invalid_rule(format!("Default data source `{}` of single rule is not a data source", default)));
            }
        }
        let mut result = SingleRule::new(config.default_data_source.as_deref());
        for (table, each) in &config.tables {
            if each.is_empty() {
                return Err(KernelError::invalid_rule(format!("Single table `{}` has no data source", table)));
            }
            if result.tables.contains_key(&table.to_lowercase()) {
                return Err(KernelError::invalid_rule(format!("Single table `{}` is declared twice", table)));
            }
            result = result.with_table(table, each.clone());
        }
        Ok(result)
    }

    pub fn get_default_data_source(&self) -> Option<&str> {
        self.default_data_source.as_deref()
    }

    pub fn is_single_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    /// Candidate data sources of a single table.
    pub fn find_data_sources(&self, table: &str) -> Option<&[String]> {
        self.tables.get(&table.to_lowercase()).map(Vec::as_slice)
    }

    /// Single tables out of `tables`, keeping their order.
    pub fn get_single_table_names(&self, tables: &[String]) -> Vec<String> {
        tables.iter().filter(|each| self.is_single_table(each)).cloned().collect()
    }
}
