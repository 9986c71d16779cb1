use std::collections::BTreeMap;

use regex::Regex;

use crate::binder::StatementType;
use crate::error::{KernelError, Result};
use crate::rule::config::{AlgorithmConfiguration, ShadowRuleConfiguration};
use crate::value::SQLValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowOperationType {
    Insert,
    Update,
    Delete,
    Select,
}

impl ShadowOperationType {
    pub fn parse(operation: &str) -> Option<Self> {
        match operation.to_lowercase().as_str() {
            "insert" => Some(ShadowOperationType::Insert),
            "update" => Some(ShadowOperationType::Update),
            "delete" => Some(ShadowOperationType::Delete),
            "select" => Some(ShadowOperationType::Select),
            _ => None,
        }
    }

    pub fn of(statement_type: StatementType) -> Option<Self> {
        match statement_type {
            StatementType::Insert => Some(ShadowOperationType::Insert),
            StatementType::Update => Some(ShadowOperationType::Update),
            StatementType::Delete => Some(ShadowOperationType::Delete),
            StatementType::Select => Some(ShadowOperationType::Select),
            _ => None,
        }
    }
}

/// Decides whether a statement belongs to shadow (load test) traffic.
#[derive(Debug, Clone)]
pub enum ShadowAlgorithm {
    ValueMatch {
        column: String,
        operation: ShadowOperationType,
        value: String,
    },
    RegexMatch {
        column: String,
        operation: ShadowOperationType,
        regex: Regex,
    },
    SqlHint { comment: Regex },
}

impl ShadowAlgorithm {
    pub fn create(name: &str, config: &AlgorithmConfiguration) -> Result<Self> {
        match config.algorithm_type.to_uppercase().as_str() {
            "VALUE_MATCH" => Ok(ShadowAlgorithm::ValueMatch {
                column: config.require_string(name, "column")?,
                operation: Self::operation(name, config)?,
                value: config.require_string(name, "value")?,
            }),
            "REGEX_MATCH" => {
                let pattern = config.require_string(name, "regex")?;
                let regex = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|e| KernelError::invalid_rule(format!("Invalid regex `{}` of shadow algorithm `{}`: {}", pattern, name, e)))?;
                Ok(ShadowAlgorithm::RegexMatch {
                    column: config.require_string(name, "column")?,
                    operation: Self::operation(name, config)?,
                    regex,
                })
            }
            "SQL_HINT" => {
                let comment = Regex::new(r"(?i)/\*\s*SHADOW\s*:\s*true\s*\*/")
                    .map_err(|e| KernelError::invalid_rule(e.to_string()))?;
                Ok(ShadowAlgorithm::SqlHint { comment })
            }
            other => Err(KernelError::invalid_rule(format!("Unknown shadow algorithm type `{}` of `{}`", other, name))),
        }
    }

    fn operation(name: &str, config: &AlgorithmConfiguration) -> Result<ShadowOperationType> {
        let operation = config.require_string(name, "operation")?;
        ShadowOperationType::parse(&operation)
            .ok_or_else(|| KernelError::invalid_rule(format!("Unknown operation `{}` of shadow algorithm `{}`", operation, name)))
    }

    pub fn is_hint(&self) -> bool {
        matches!(self, ShadowAlgorithm::SqlHint { .. })
    }

    /// Column algorithms: does `value` of `column` mark a shadow row for this operation?
    pub fn is_shadow_value(&self, operation: ShadowOperationType, column: &str, value: &SQLValue) -> bool {
        match self {
            ShadowAlgorithm::ValueMatch { column: shadow_column, operation: shadow_operation, value: shadow_value } => {
                *shadow_operation == operation && shadow_column.eq_ignore_ascii_case(column) && value.as_plain_string() == *shadow_value
            }
            ShadowAlgorithm::RegexMatch { column: shadow_column, operation: shadow_operation, regex } => {
                *shadow_operation == operation && shadow_column.eq_ignore_ascii_case(column) && regex.is_match(&value.as_plain_string())
            }
            ShadowAlgorithm::SqlHint { .. } => false,
        }
    }

    /// Hint algorithm: a session hint or a `/* SHADOW: true */` comment in the statement.
    pub fn is_shadow_hint(&self, hinted: bool, sql: &str) -> bool {
        match self {
            ShadowAlgorithm::SqlHint { comment } => hinted || comment.is_match(sql),
            _ => false,
        }
    }

    pub fn get_column(&self) -> Option<&str> {
        match self {
            ShadowAlgorithm::ValueMatch { column, .. } | ShadowAlgorithm::RegexMatch { column, .. } => Some(column),
            ShadowAlgorithm::SqlHint { .. } => None,
        }
    }
}

/// Production data source paired with the data source its shadow traffic goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDataSourceRule {
    production_data_source: String,
    shadow_data_source: String,
}

impl ShadowDataSourceRule {
    pub fn new(production_data_source: &str, shadow_data_source: &str) -> Self {
        ShadowDataSourceRule {
            production_data_source: production_data_source.to_string(),
            shadow_data_source: shadow_data_source.to_string(),
        }
    }

    pub fn get_production_data_source(&self) -> &str {
        &self.production_data_source
    }

    pub fn get_shadow_data_source(&self) -> &str {
        &self.shadow_data_source
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShadowRule {
    data_source_rules: BTreeMap<String, ShadowDataSourceRule>,
    /// Lower-cased shadow table to its algorithm names.
    tables: BTreeMap<String, Vec<String>>,
    default_shadow_algorithm: Option<String>,
    algorithms: BTreeMap<String, ShadowAlgorithm>,
}

impl ShadowRule {
    pub fn from_configuration(config: &ShadowRuleConfiguration) -> Result<Self> {
        let mut result = ShadowRule::default();
        for (name, each) in &config.algorithms {
            result.algorithms.insert(name.clone(), ShadowAlgorithm::create(name, each)?);
        }
        for (name, each) in &config.data_sources {
            result
                .data_source_rules
                .insert(name.clone(), ShadowDataSourceRule::new(&each.production_data_source, &each.shadow_data_source));
        }
        for (table, each) in &config.tables {
            if let Some(unknown) = each.shadow_algorithms.iter().find(|name| !result.algorithms.contains_key(*name)) {
                return Err(KernelError::invalid_rule(format!("Shadow algorithm `{}` of table `{}` is not defined", unknown, table)));
            }
            result.tables.insert(table.to_lowercase(), each.shadow_algorithms.clone());
        }
        if let Some(default) = &config.default_shadow_algorithm {
            match result.algorithms.get(default) {
                Some(algorithm) if algorithm.is_hint() => result.default_shadow_algorithm = Some(default.clone()),
                Some(_) => return Err(KernelError::invalid_rule(format!("Default shadow algorithm `{}` must be a SQL_HINT algorithm", default))),
                None => return Err(KernelError::invalid_rule(format!("Default shadow algorithm `{}` is not defined", default))),
            }
        }
        Ok(result)
    }

    pub fn get_data_source_rules(&self) -> impl Iterator<Item = &ShadowDataSourceRule> {
        self.data_source_rules.values()
    }

    /// Shadow data source of a production data source.
    pub fn find_shadow_data_source(&self, production_data_source: &str) -> Option<&str> {
        self.data_source_rules
            .values()
            .find(|each| each.production_data_source == production_data_source)
            .map(|each| each.get_shadow_data_source())
    }

    pub fn is_shadow_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    /// Algorithms guarding a shadow table, in declaration order.
    pub fn get_table_algorithms(&self, table: &str) -> Vec<&ShadowAlgorithm> {
        self.tables
            .get(&table.to_lowercase())
            .map(|names| names.iter().filter_map(|each| self.algorithms.get(each)).collect())
            .unwrap_or_default()
    }

    pub fn get_default_shadow_algorithm(&self) -> Option<&ShadowAlgorithm> {
        self.default_shadow_algorithm.as_ref().and_then(|each| self.algorithms.get(each))
    }
}
