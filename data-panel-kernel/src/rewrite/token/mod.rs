//! Positional edits on the logic SQL. Offsets are inclusive character offsets
//! into the original text; rendering depends on the route unit.

use std::fmt;

use crate::route::context::{DataNode, RouteUnit};

pub mod generator;

/// Owner prefix written in front of a substituted column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOwner {
    name: String,
    /// Set when the owner is a logic table name, which is renamed per unit.
    logic_table: Option<String>,
}

impl ColumnOwner {
    pub fn new(name: &str, logic_table: Option<&str>) -> Self {
        ColumnOwner {
            name: name.to_string(),
            logic_table: logic_table.map(str::to_string),
        }
    }

    fn render(&self, route_unit: &RouteUnit) -> String {
        self.logic_table
            .as_deref()
            .and_then(|each| route_unit.find_actual_table(each))
            .unwrap_or(&self.name)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubstituteColumn {
    owner: Option<ColumnOwner>,
    text: String,
}

impl SubstituteColumn {
    pub fn new(owner: Option<ColumnOwner>, text: &str) -> Self {
        SubstituteColumn {
            owner,
            text: text.to_string(),
        }
    }

    fn render(&self, route_unit: &RouteUnit) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner.render(route_unit), self.text),
            None => self.text.clone(),
        }
    }
}

/// One `(...)` row of an INSERT, already rendered, with the data nodes it was routed to.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertValue {
    values: Vec<String>,
    data_nodes: Vec<DataNode>,
}

impl InsertValue {
    pub fn new(values: Vec<String>, data_nodes: Vec<DataNode>) -> Self {
        InsertValue { values, data_nodes }
    }

    pub fn get_values(&self) -> &[String] {
        &self.values
    }

    pub fn get_data_nodes(&self) -> &[DataNode] {
        &self.data_nodes
    }

    /// Rows without recorded data nodes go everywhere.
    pub fn is_routed_to(&self, route_unit: &RouteUnit) -> bool {
        self.data_nodes.is_empty() || self.data_nodes.iter().any(|each| route_unit.contains_data_node(each))
    }
}

impl fmt::Display for InsertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.values.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SQLTokenKind {
    /// Logic table name, renamed to the actual table of the unit.
    Table { logic_table: String },
    /// `t_order` in `t_order.col`, renamed like the table.
    Owner { logic_table: String },
    /// Inserted after the last INSERT column, consumes no text.
    InsertColumns { columns: Vec<String> },
    SubstituteColumn { columns: Vec<SubstituteColumn> },
    /// Every VALUES row, each unit keeps the rows routed to it.
    InsertValues { values: Vec<InsertValue> },
    Offset { value: u64 },
    RowCount { value: u64 },
    Literal { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SQLToken {
    start_index: usize,
    stop_index: usize,
    kind: SQLTokenKind,
}

impl SQLToken {
    pub fn new(start_index: usize, stop_index: usize, kind: SQLTokenKind) -> Self {
        SQLToken { start_index, stop_index, kind }
    }

    pub fn table(start_index: usize, stop_index: usize, logic_table: &str) -> Self {
        SQLToken::new(start_index, stop_index, SQLTokenKind::Table { logic_table: logic_table.to_string() })
    }

    pub fn owner(start_index: usize, stop_index: usize, logic_table: &str) -> Self {
        SQLToken::new(start_index, stop_index, SQLTokenKind::Owner { logic_table: logic_table.to_string() })
    }

    /// Attached at `start_index`.
    pub fn insert_columns(start_index: usize, columns: Vec<String>) -> Self {
        SQLToken::new(start_index, start_index, SQLTokenKind::InsertColumns { columns })
    }

    pub fn substitute_column(start_index: usize, stop_index: usize, columns: Vec<SubstituteColumn>) -> Self {
        SQLToken::new(start_index, stop_index, SQLTokenKind::SubstituteColumn { columns })
    }

    pub fn literal(start_index: usize, stop_index: usize, text: &str) -> Self {
        SQLToken::new(start_index, stop_index, SQLTokenKind::Literal { text: text.to_string() })
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    /// Last consumed offset, one before the start for attached text.
    pub fn get_stop_index(&self) -> isize {
        if self.is_attachable() {
            self.start_index as isize - 1
        } else {
            self.stop_index as isize
        }
    }

    pub fn get_kind(&self) -> &SQLTokenKind {
        &self.kind
    }

    pub fn is_attachable(&self) -> bool {
        matches!(self.kind, SQLTokenKind::InsertColumns { .. })
    }

    /// A decorated re-rendering of the same span takes the place of the previous token.
    pub fn supersedes(&self, other: &SQLToken) -> bool {
        matches!((&self.kind, &other.kind), (SQLTokenKind::InsertValues { .. }, SQLTokenKind::InsertValues { .. }))
            && self.start_index == other.start_index
            && self.stop_index == other.stop_index
    }

    pub fn render(&self, route_unit: &RouteUnit) -> String {
        match &self.kind {
            SQLTokenKind::Table { logic_table } | SQLTokenKind::Owner { logic_table } => {
                route_unit.find_actual_table(logic_table).unwrap_or(logic_table).to_string()
            }
            SQLTokenKind::InsertColumns { columns } => columns.iter().map(|each| format!(", {}", each)).collect(),
            SQLTokenKind::SubstituteColumn { columns } => columns.iter().map(|each| each.render(route_unit)).collect::<Vec<_>>().join(", "),
            SQLTokenKind::InsertValues { values } => values
                .iter()
                .filter(|each| each.is_routed_to(route_unit))
                .map(|each| each.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            SQLTokenKind::Offset { value } | SQLTokenKind::RowCount { value } => value.to_string(),
            SQLTokenKind::Literal { text } => text.clone(),
        }
    }
}
