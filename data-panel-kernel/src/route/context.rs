use std::collections::BTreeSet;
use std::fmt;

use crate::error::{KernelError, Result};

/// Logic name to actual name, for a data source or a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteMapper {
    logic_name: String,
    actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: &str, actual_name: &str) -> Self {
        RouteMapper {
            logic_name: logic_name.to_string(),
            actual_name: actual_name.to_string(),
        }
    }

    pub fn get_logic_name(&self) -> &str {
        &self.logic_name
    }

    pub fn get_actual_name(&self) -> &str {
        &self.actual_name
    }
}

/**
 * One physical destination of a statement: exactly one data source and the
 * table renames valid on it. The rewriter emits one SQL per unit.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteUnit {
    data_source_mapper: RouteMapper,
    table_mappers: BTreeSet<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source_mapper: RouteMapper, table_mappers: Vec<RouteMapper>) -> Self {
        RouteUnit {
            data_source_mapper,
            table_mappers: table_mappers.into_iter().collect(),
        }
    }

    pub fn get_data_source_mapper(&self) -> &RouteMapper {
        &self.data_source_mapper
    }

    pub fn get_table_mappers(&self) -> &BTreeSet<RouteMapper> {
        &self.table_mappers
    }

    /// Actual table a logic table is renamed to on this unit.
    pub fn find_actual_table(&self, logic_table: &str) -> Option<&str> {
        self.table_mappers
            .iter()
            .find(|each| each.logic_name.eq_ignore_ascii_case(logic_table))
            .map(|each| each.get_actual_name())
    }

    /// Is `data_node` served by this unit?
    pub fn contains_data_node(&self, data_node: &DataNode) -> bool {
        self.data_source_mapper.logic_name == data_node.data_source_name
            && self
                .table_mappers
                .iter()
                .any(|each| each.actual_name.eq_ignore_ascii_case(&data_node.table_name))
    }

    /// Same tables, another actual data source.
    pub fn with_actual_data_source(&self, actual_name: &str) -> Self {
        RouteUnit {
            data_source_mapper: RouteMapper::new(&self.data_source_mapper.logic_name, actual_name),
            table_mappers: self.table_mappers.clone(),
        }
    }

    pub fn with_table_mappers(&self, table_mappers: Vec<RouteMapper>) -> Self {
        let mut result = self.clone();
        result.table_mappers.extend(table_mappers);
        result
    }
}

impl fmt::Display for RouteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_source_mapper.actual_name)?;
        if !self.table_mappers.is_empty() {
            let tables: Vec<&str> = self.table_mappers.iter().map(|each| each.get_actual_name()).collect();
            write!(f, "[{}]", tables.join(", "))?;
        }
        Ok(())
    }
}

/// `data_source.table`, the physical home of one shard of a logic table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataNode {
    data_source_name: String,
    table_name: String,
}

impl DataNode {
    pub fn new(data_source_name: &str, table_name: &str) -> Self {
        DataNode {
            data_source_name: data_source_name.to_string(),
            table_name: table_name.to_string(),
        }
    }

    pub fn parse(data_node: &str) -> Result<Self> {
        let mut parts = data_node.trim().split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(data_source), Some(table), None) if !data_source.is_empty() && !table.is_empty() => Ok(DataNode::new(data_source, table)),
            _ => Err(KernelError::invalid_rule(format!("Invalid format for actual data node `{}`", data_node))),
        }
    }

    pub fn get_data_source_name(&self) -> &str {
        &self.data_source_name
    }

    pub fn get_table_name(&self) -> &str {
        &self.table_name
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source_name, self.table_name)
    }
}

/**
 * Routing result accumulated by the routers of one statement execution.
 *
 * Units are kept in an ordered set, so everything derived from them is
 * deterministic. `original_data_nodes` holds, per INSERT row, the data nodes
 * that row was routed to.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteContext {
    route_units: BTreeSet<RouteUnit>,
    original_data_nodes: Vec<Vec<DataNode>>,
}

impl RouteContext {
    pub fn new() -> Self {
        RouteContext::default()
    }

    pub fn is_empty(&self) -> bool {
        self.route_units.is_empty()
    }

    pub fn add_route_unit(&mut self, route_unit: RouteUnit) {
        self.route_units.insert(route_unit);
    }

    pub fn get_route_units(&self) -> &BTreeSet<RouteUnit> {
        &self.route_units
    }

    /// Swap every unit for its replacement, used by decorating routers.
    pub fn replace_route_units(&mut self, route_units: BTreeSet<RouteUnit>) {
        self.route_units = route_units;
    }

    pub fn get_original_data_nodes(&self) -> &[Vec<DataNode>] {
        &self.original_data_nodes
    }

    pub fn set_original_data_nodes(&mut self, original_data_nodes: Vec<Vec<DataNode>>) {
        self.original_data_nodes = original_data_nodes;
    }

    /// Distinct actual data sources, ordered.
    pub fn get_actual_data_source_names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self
            .route_units
            .iter()
            .map(|each| each.get_data_source_mapper().get_actual_name())
            .collect();
        names.into_iter().collect()
    }

    pub fn is_single_route(&self) -> bool {
        self.route_units.len() == 1
    }
}
