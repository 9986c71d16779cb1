use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::error::{KernelError, Result};
use crate::route::context::DataNode;
use crate::rule::algorithm::ShardingAlgorithm;
use crate::rule::config::{ShardingRuleConfiguration, ShardingStrategyConfiguration, ShardingTableConfiguration};

/// `sharding_column` + the algorithm that shards on it.
#[derive(Debug, Clone)]
pub struct ShardingStrategy {
    sharding_column: String,
    algorithm: Arc<ShardingAlgorithm>,
}

impl ShardingStrategy {
    pub fn new(sharding_column: &str, algorithm: Arc<ShardingAlgorithm>) -> Self {
        ShardingStrategy {
            sharding_column: sharding_column.to_string(),
            algorithm,
        }
    }

    pub fn get_sharding_column(&self) -> &str {
        &self.sharding_column
    }

    pub fn get_algorithm(&self) -> &ShardingAlgorithm {
        &self.algorithm
    }
}

#[derive(Debug, Clone)]
pub struct TableRule {
    logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
}

impl TableRule {
    pub fn new(logic_table: &str, actual_data_nodes: Vec<DataNode>) -> Self {
        TableRule {
            logic_table: logic_table.to_string(),
            actual_data_nodes,
            database_strategy: None,
            table_strategy: None,
        }
    }

    pub fn with_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    pub fn with_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    pub fn get_logic_table(&self) -> &str {
        &self.logic_table
    }

    pub fn get_actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    /// Data sources holding a shard of the table, in data node order.
    pub fn get_actual_data_source_names(&self) -> Vec<String> {
        let mut result: Vec<String> = vec![];
        for each in &self.actual_data_nodes {
            if !result.iter().any(|name| name == each.get_data_source_name()) {
                result.push(each.get_data_source_name().to_string());
            }
        }
        result
    }

    pub fn get_actual_table_names(&self, data_source_name: &str) -> Vec<String> {
        self.actual_data_nodes
            .iter()
            .filter(|each| each.get_data_source_name() == data_source_name)
            .map(|each| each.get_table_name().to_string())
            .collect()
    }

    /// Position of an actual table among the tables of its data source.
    pub fn find_actual_table_index(&self, data_source_name: &str, actual_table: &str) -> Option<usize> {
        self.get_actual_table_names(data_source_name)
            .iter()
            .position(|each| each.eq_ignore_ascii_case(actual_table))
    }

    pub fn get_database_strategy(&self) -> Option<&ShardingStrategy> {
        self.database_strategy.as_ref()
    }

    pub fn get_table_strategy(&self) -> Option<&ShardingStrategy> {
        self.table_strategy.as_ref()
    }
}

/// Tables sharded the same way, joined without a cartesian product.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTableRule {
    logic_tables: Vec<String>,
}

impl BindingTableRule {
    pub fn new(logic_tables: Vec<String>) -> Self {
        BindingTableRule { logic_tables }
    }

    pub fn has_logic_table(&self, logic_table: &str) -> bool {
        self.logic_tables.iter().any(|each| each.eq_ignore_ascii_case(logic_table))
    }

    pub fn get_logic_tables(&self) -> &[String] {
        &self.logic_tables
    }
}

/**
 * Which logic tables are split, where their shards live and how a row is
 * mapped onto a shard.
 */
#[derive(Debug, Clone)]
pub struct ShardingRule {
    data_source_names: Vec<String>,
    table_rules: Vec<TableRule>,
    binding_table_rules: Vec<BindingTableRule>,
    broadcast_tables: Vec<String>,
    default_database_strategy: Option<ShardingStrategy>,
    default_table_strategy: Option<ShardingStrategy>,
}

impl ShardingRule {
    pub fn new(data_source_names: Vec<String>, table_rules: Vec<TableRule>) -> Self {
        ShardingRule {
            data_source_names,
            table_rules,
            binding_table_rules: vec![],
            broadcast_tables: vec![],
            default_database_strategy: None,
            default_table_strategy: None,
        }
    }

    pub fn with_binding_tables(mut self, logic_tables: Vec<String>) -> Self {
        self.binding_table_rules.push(BindingTableRule::new(logic_tables));
        self
    }

    pub fn with_broadcast_table(mut self, logic_table: &str) -> Self {
        self.broadcast_tables.push(logic_table.to_string());
        self
    }

    pub fn with_default_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_database_strategy = Some(strategy);
        self
    }

    pub fn with_default_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_table_strategy = Some(strategy);
        self
    }

    pub fn from_configuration(config: &ShardingRuleConfiguration, data_sources: &[String]) -> Result<Self> {
        let mut algorithms = BTreeMap::new();
        for (name, each) in &config.algorithms {
            algorithms.insert(name.clone(), Arc::new(ShardingAlgorithm::create(name, each)?));
        }
        let mut table_rules = Vec::with_capacity(config.tables.len());
        for (logic_table, each) in &config.tables {
            table_rules.push(Self::create_table_rule(logic_table, each, data_sources, &algorithms)?);
        }
        let mut data_source_names = data_sources.to_vec();
        for each in &table_rules {
            for name in each.get_actual_data_source_names() {
                if !data_source_names.contains(&name) {
                    data_source_names.push(name);
                }
            }
        }
        let mut result = ShardingRule::new(data_source_names, table_rules);
        if let Some(strategy) = &config.default_database_strategy {
            result.default_database_strategy = Some(Self::create_strategy(strategy, &algorithms)?);
        }
        if let Some(strategy) = &config.default_table_strategy {
            result.default_table_strategy = Some(Self::create_strategy(strategy, &algorithms)?);
        }
        for group in &config.binding_tables {
            if let Some(unknown) = group.iter().find(|each| result.find_table_rule(each).is_none()) {
                return Err(KernelError::invalid_rule(format!("Binding table `{}` is not a sharding table", unknown)));
            }
            result = result.with_binding_tables(group.clone());
        }
        for each in &config.broadcast_tables {
            if result.is_sharding_table(each) {
                warn!("Table `{}` is both sharding and broadcast, it is routed as a sharding table", each);
            }
            result = result.with_broadcast_table(each);
        }
        Ok(result)
    }

    fn create_table_rule(
        logic_table: &str,
        config: &ShardingTableConfiguration,
        data_sources: &[String],
        algorithms: &BTreeMap<String, Arc<ShardingAlgorithm>>,
    ) -> Result<TableRule> {
        let actual_data_nodes = if config.actual_data_nodes.is_empty() {
            data_sources.iter().map(|each| DataNode::new(each, logic_table)).collect()
        } else {
            let mut result = vec![];
            for each in &config.actual_data_nodes {
                for expanded in expand_inline_expression(each)? {
                    result.push(DataNode::parse(&expanded)?);
                }
            }
            result
        };
        if actual_data_nodes.is_empty() {
            return Err(KernelError::invalid_rule(format!("Sharding table `{}` has no data node", logic_table)));
        }
        let mut result = TableRule::new(logic_table, actual_data_nodes);
        if let Some(strategy) = &config.database_strategy {
            result = result.with_database_strategy(Self::create_strategy(strategy, algorithms)?);
        }
        if let Some(strategy) = &config.table_strategy {
            result = result.with_table_strategy(Self::create_strategy(strategy, algorithms)?);
        }
        Ok(result)
    }

    fn create_strategy(config: &ShardingStrategyConfiguration, algorithms: &BTreeMap<String, Arc<ShardingAlgorithm>>) -> Result<ShardingStrategy> {
        let algorithm = algorithms
            .get(&config.algorithm)
            .ok_or_else(|| KernelError::invalid_rule(format!("Sharding algorithm `{}` is not defined", config.algorithm)))?;
        Ok(ShardingStrategy::new(&config.sharding_column, algorithm.clone()))
    }

    pub fn get_data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    pub fn get_table_rules(&self) -> &[TableRule] {
        &self.table_rules
    }

    pub fn find_table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules.iter().find(|each| each.logic_table.eq_ignore_ascii_case(logic_table))
    }

    pub fn is_sharding_table(&self, logic_table: &str) -> bool {
        self.find_table_rule(logic_table).is_some()
    }

    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_tables.iter().any(|each| each.eq_ignore_ascii_case(logic_table))
    }

    pub fn is_all_broadcast_tables(&self, logic_tables: &[String]) -> bool {
        !logic_tables.is_empty() && logic_tables.iter().all(|each| self.is_broadcast_table(each))
    }

    /// Sharding tables out of `logic_tables`, keeping their order.
    pub fn get_sharding_logic_table_names(&self, logic_tables: &[String]) -> Vec<String> {
        logic_tables.iter().filter(|each| self.is_sharding_table(each)).cloned().collect()
    }

    pub fn find_binding_table_rule(&self, logic_table: &str) -> Option<&BindingTableRule> {
        self.binding_table_rules.iter().find(|each| each.has_logic_table(logic_table))
    }

    /// Are all tables sharding tables of one binding group?
    pub fn is_all_binding_tables(&self, logic_tables: &[String]) -> bool {
        match logic_tables.first().and_then(|each| self.find_binding_table_rule(each)) {
            Some(rule) => logic_tables.iter().all(|each| rule.has_logic_table(each)),
            None => false,
        }
    }

    pub fn get_database_strategy<'a>(&'a self, table_rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        table_rule.database_strategy.as_ref().or_else(|| self.default_database_strategy.as_ref())
    }

    pub fn get_table_strategy<'a>(&'a self, table_rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        table_rule.table_strategy.as_ref().or_else(|| self.default_table_strategy.as_ref())
    }

    pub fn is_sharding_column(&self, column: &str, logic_table: &str) -> bool {
        match self.find_table_rule(logic_table) {
            Some(table_rule) => self
                .get_database_strategy(table_rule)
                .into_iter()
                .chain(self.get_table_strategy(table_rule))
                .any(|each| each.sharding_column.eq_ignore_ascii_case(column)),
            None => false,
        }
    }

    /// Actual table of `logic_table` bound to `other_actual_table` of `other_logic_table` on a data source.
    pub fn get_binding_actual_table(&self, data_source_name: &str, logic_table: &str, other_logic_table: &str, other_actual_table: &str) -> Option<String> {
        let index = self.find_table_rule(other_logic_table)?.find_actual_table_index(data_source_name, other_actual_table)?;
        self.find_table_rule(logic_table)?.get_actual_table_names(data_source_name).into_iter().nth(index)
    }
}

/// Expand `ds_${0..1}.t_order_${[0, 2]}` into every combination, left to right.
pub fn expand_inline_expression(expression: &str) -> Result<Vec<String>> {
    let mut result = vec![String::new()];
    let mut rest = expression.trim();
    while let Some(start) = [rest.find("${"), rest.find("$->{")].iter().flatten().min().copied() {
        let body_start = if rest[start..].starts_with("${") { start + 2 } else { start + 4 };
        let body_len = rest[body_start..]
            .find('}')
            .ok_or_else(|| KernelError::invalid_rule(format!("Unclosed inline expression `{}`", expression)))?;
        let prefix = &rest[..start];
        let values = expand_segment(&rest[body_start..body_start + body_len], expression)?;
        result = result
            .iter()
            .flat_map(|head| values.iter().map(move |value| format!("{}{}{}", head, prefix, value)))
            .collect();
        rest = &rest[body_start + body_len + 1..];
    }
    Ok(result.into_iter().map(|each| format!("{}{}", each, rest)).collect())
}

fn expand_segment(segment: &str, expression: &str) -> Result<Vec<String>> {
    let segment = segment.trim();
    if let Some(list) = segment.strip_prefix('[').and_then(|each| each.strip_suffix(']')) {
        return Ok(list.split(',').map(|each| each.trim().trim_matches('\'').to_string()).collect());
    }
    if let Some(pos) = segment.find("..") {
        let lower: i64 = segment[..pos].trim().parse().map_err(|_| invalid_range(expression))?;
        let upper: i64 = segment[pos + 2..].trim().parse().map_err(|_| invalid_range(expression))?;
        if lower > upper {
            return Err(invalid_range(expression));
        }
        return Ok((lower..=upper).map(|each| each.to_string()).collect());
    }
    Ok(vec![segment.to_string()])
}

fn invalid_range(expression: &str) -> KernelError {
    KernelError::invalid_rule(format!("Invalid range in inline expression `{}`", expression))
}
