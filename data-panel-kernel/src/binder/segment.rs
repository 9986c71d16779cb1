// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Statement segments. Every segment keeps the inclusive character offsets of
//! the text it was parsed from, so rewrite tokens can be positioned on it.

use crate::value::SQLValue;

/// Clause a segment was found in, used to name the clause in binding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Projection,
    JoinOn,
    JoinUsing,
    Predicate,
    OrderBy,
    GroupBy,
    Assignment,
    InsertColumns,
}

impl SegmentType {
    pub fn clause_name(&self) -> &'static str {
        match self {
            SegmentType::Projection => "field list",
            SegmentType::JoinOn => "on clause",
            SegmentType::JoinUsing => "from clause",
            SegmentType::Predicate => "where clause",
            SegmentType::OrderBy => "order clause",
            SegmentType::GroupBy => "group statement",
            _ => "unknown clause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSegment {
    start_index: usize,
    stop_index: usize,
    name: String,
    alias: Option<String>,
}

impl TableSegment {
    pub fn new(start_index: usize, stop_index: usize, name: &str) -> Self {
        TableSegment {
            start_index,
            stop_index,
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    pub fn get_stop_index(&self) -> usize {
        self.stop_index
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn get_alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// `owner` part of `owner.column` or `owner.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSegment {
    start_index: usize,
    stop_index: usize,
    name: String,
}

impl OwnerSegment {
    pub fn new(start_index: usize, stop_index: usize, name: &str) -> Self {
        OwnerSegment {
            start_index,
            stop_index,
            name: name.to_string(),
        }
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    pub fn get_stop_index(&self) -> usize {
        self.stop_index
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
}

/// Where a column really comes from once the binder resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBoundInfo {
    original_table: String,
    original_column: String,
}

impl ColumnBoundInfo {
    pub fn new(original_table: &str, original_column: &str) -> Self {
        ColumnBoundInfo {
            original_table: original_table.to_string(),
            original_column: original_column.to_string(),
        }
    }

    pub fn get_original_table(&self) -> &str {
        &self.original_table
    }

    pub fn get_original_column(&self) -> &str {
        &self.original_column
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSegment {
    start_index: usize,
    stop_index: usize,
    name: String,
    owner: Option<OwnerSegment>,
    bound: Option<ColumnBoundInfo>,
    variable: bool,
}

impl ColumnSegment {
    pub fn new(start_index: usize, stop_index: usize, name: &str) -> Self {
        ColumnSegment {
            start_index,
            stop_index,
            name: name.to_string(),
            owner: None,
            bound: None,
            variable: false,
        }
    }

    pub fn with_owner(mut self, owner: OwnerSegment) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_bound(mut self, bound: ColumnBoundInfo) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn with_variable(mut self, variable: bool) -> Self {
        self.variable = variable;
        self
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    pub fn get_stop_index(&self) -> usize {
        self.stop_index
    }

    /// Offset of the bare column name, behind `owner.` when there is one.
    pub fn get_name_start_index(&self) -> usize {
        match &self.owner {
            Some(owner) => owner.stop_index + 2,
            None => self.start_index,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_owner(&self) -> Option<&OwnerSegment> {
        self.owner.as_ref()
    }

    pub fn get_bound(&self) -> Option<&ColumnBoundInfo> {
        self.bound.as_ref()
    }

    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// `owner.name` as written.
    pub fn get_expression(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner.name, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjection {
    column: ColumnSegment,
    alias: Option<String>,
}

impl ColumnProjection {
    pub fn new(column: ColumnSegment) -> Self {
        ColumnProjection { column, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn get_column(&self) -> &ColumnSegment {
        &self.column
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Label the column is visible under in the result set.
    pub fn get_column_label(&self) -> &str {
        self.alias.as_deref().unwrap_or(self.column.get_name())
    }
}

/// `*` or `owner.*` together with the columns it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShorthandProjection {
    start_index: usize,
    stop_index: usize,
    owner: Option<OwnerSegment>,
    actual_columns: Vec<ColumnProjection>,
}

impl ShorthandProjection {
    pub fn new(start_index: usize, stop_index: usize, owner: Option<OwnerSegment>) -> Self {
        ShorthandProjection {
            start_index,
            stop_index,
            owner,
            actual_columns: vec![],
        }
    }

    pub fn with_actual_columns(mut self, actual_columns: Vec<ColumnProjection>) -> Self {
        self.actual_columns = actual_columns;
        self
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    pub fn get_stop_index(&self) -> usize {
        self.stop_index
    }

    pub fn get_owner(&self) -> Option<&OwnerSegment> {
        self.owner.as_ref()
    }

    pub fn get_actual_columns(&self) -> &[ColumnProjection] {
        &self.actual_columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionProjection {
    start_index: usize,
    stop_index: usize,
    text: String,
    alias: Option<String>,
}

impl ExpressionProjection {
    pub fn new(start_index: usize, stop_index: usize, text: &str, alias: Option<&str>) -> Self {
        ExpressionProjection {
            start_index,
            stop_index,
            text: text.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    pub fn get_text(&self) -> &str {
        &self.text
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionSegment {
    Column(ColumnProjection),
    Shorthand(ShorthandProjection),
    Expression(ExpressionProjection),
}

impl ProjectionSegment {
    pub fn get_start_index(&self) -> usize {
        match self {
            ProjectionSegment::Column(each) => each.column.start_index,
            ProjectionSegment::Shorthand(each) => each.start_index,
            ProjectionSegment::Expression(each) => each.start_index,
        }
    }

    pub fn get_stop_index(&self) -> usize {
        match self {
            ProjectionSegment::Column(each) => each.column.stop_index,
            ProjectionSegment::Shorthand(each) => each.stop_index,
            ProjectionSegment::Expression(each) => each.stop_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionSegment {
    Literal {
        start_index: usize,
        stop_index: usize,
        value: SQLValue,
    },
    /// Positional `?`, `index` is 0-based into the statement parameters.
    Parameter {
        start_index: usize,
        stop_index: usize,
        index: usize,
    },
    Column(ColumnSegment),
    Other {
        start_index: usize,
        stop_index: usize,
        text: String,
    },
}

impl ExpressionSegment {
    pub fn literal(start_index: usize, stop_index: usize, value: SQLValue) -> Self {
        ExpressionSegment::Literal { start_index, stop_index, value }
    }

    pub fn parameter(start_index: usize, index: usize) -> Self {
        ExpressionSegment::Parameter {
            start_index,
            stop_index: start_index,
            index,
        }
    }

    pub fn get_start_index(&self) -> usize {
        match self {
            ExpressionSegment::Literal { start_index, .. }
            | ExpressionSegment::Parameter { start_index, .. }
            | ExpressionSegment::Other { start_index, .. } => *start_index,
            ExpressionSegment::Column(column) => column.start_index,
        }
    }

    pub fn get_stop_index(&self) -> usize {
        match self {
            ExpressionSegment::Literal { stop_index, .. }
            | ExpressionSegment::Parameter { stop_index, .. }
            | ExpressionSegment::Other { stop_index, .. } => *stop_index,
            ExpressionSegment::Column(column) => column.stop_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOperator {
    Equal,
    In,
    Between,
    Like,
}

/// `column <op> values`, predicates of a statement are AND-ed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSegment {
    column: ColumnSegment,
    operator: PredicateOperator,
    values: Vec<ExpressionSegment>,
}

impl PredicateSegment {
    pub fn new(column: ColumnSegment, operator: PredicateOperator, values: Vec<ExpressionSegment>) -> Self {
        PredicateSegment { column, operator, values }
    }

    pub fn get_column(&self) -> &ColumnSegment {
        &self.column
    }

    pub fn get_operator(&self) -> PredicateOperator {
        self.operator
    }

    pub fn get_values(&self) -> &[ExpressionSegment] {
        &self.values
    }
}

/// `SET column = value` of an UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentSegment {
    column: ColumnSegment,
    value: ExpressionSegment,
}

impl AssignmentSegment {
    pub fn new(column: ColumnSegment, value: ExpressionSegment) -> Self {
        AssignmentSegment { column, value }
    }

    pub fn get_column(&self) -> &ColumnSegment {
        &self.column
    }

    pub fn get_value(&self) -> &ExpressionSegment {
        &self.value
    }
}

/// One parenthesized row of `VALUES (...), (...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertValuesSegment {
    start_index: usize,
    stop_index: usize,
    values: Vec<ExpressionSegment>,
}

impl InsertValuesSegment {
    pub fn new(start_index: usize, stop_index: usize, values: Vec<ExpressionSegment>) -> Self {
        InsertValuesSegment {
            start_index,
            stop_index,
            values,
        }
    }

    pub fn get_start_index(&self) -> usize {
        self.start_index
    }

    pub fn get_stop_index(&self) -> usize {
        self.stop_index
    }

    pub fn get_values(&self) -> &[ExpressionSegment] {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationValue {
    Literal {
        start_index: usize,
        stop_index: usize,
        value: u64,
    },
    Parameter {
        start_index: usize,
        stop_index: usize,
        index: usize,
    },
}

impl PaginationValue {
    pub fn get_start_index(&self) -> usize {
        match self {
            PaginationValue::Literal { start_index, .. } | PaginationValue::Parameter { start_index, .. } => *start_index,
        }
    }

    pub fn get_stop_index(&self) -> usize {
        match self {
            PaginationValue::Literal { stop_index, .. } | PaginationValue::Parameter { stop_index, .. } => *stop_index,
        }
    }
}

/// `LIMIT [offset,] row_count` / `LIMIT row_count OFFSET offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationSegment {
    offset: Option<PaginationValue>,
    row_count: Option<PaginationValue>,
}

impl PaginationSegment {
    pub fn new(offset: Option<PaginationValue>, row_count: Option<PaginationValue>) -> Self {
        PaginationSegment { offset, row_count }
    }

    pub fn get_offset(&self) -> Option<&PaginationValue> {
        self.offset.as_ref()
    }

    pub fn get_row_count(&self) -> Option<&PaginationValue> {
        self.row_count.as_ref()
    }
}
