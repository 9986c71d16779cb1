use std::fmt;

use crate::binder::segment::{AssignmentSegment, ColumnSegment, InsertValuesSegment, PaginationSegment, PredicateSegment, ProjectionSegment, TableSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Other,
}

impl StatementType {
    pub fn is_ddl(&self) -> bool {
        matches!(self, StatementType::Create | StatementType::Alter | StatementType::Drop | StatementType::Truncate)
    }

    pub fn is_query(&self) -> bool {
        *self == StatementType::Select
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementType::Select => "SELECT",
            StatementType::Insert => "INSERT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::Create => "CREATE",
            StatementType::Alter => "ALTER",
            StatementType::Drop => "DROP",
            StatementType::Truncate => "TRUNCATE",
            StatementType::Other => "UNKNOWN",
        })
    }
}

/**
 * A parsed statement whose table and column references are already resolved
 * against the catalog. Produced by the binder, read-only for the kernel.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatementContext {
    statement_type: StatementType,
    tables: Vec<TableSegment>,
    projections: Vec<ProjectionSegment>,
    insert_columns: Vec<ColumnSegment>,
    insert_values: Vec<InsertValuesSegment>,
    assignments: Vec<AssignmentSegment>,
    predicates: Vec<PredicateSegment>,
    pagination: Option<PaginationSegment>,
    lock: bool,
}

impl BoundStatementContext {
    pub fn builder(statement_type: StatementType) -> BoundStatementContextBuilder {
        BoundStatementContextBuilder {
            context: BoundStatementContext {
                statement_type,
                tables: vec![],
                projections: vec![],
                insert_columns: vec![],
                insert_values: vec![],
                assignments: vec![],
                predicates: vec![],
                pagination: None,
                lock: false,
            },
        }
    }

    pub fn get_statement_type(&self) -> StatementType {
        self.statement_type
    }

    pub fn is_query(&self) -> bool {
        self.statement_type.is_query()
    }

    pub fn get_tables(&self) -> &[TableSegment] {
        &self.tables
    }

    /// Distinct table names in reference order.
    pub fn get_table_names(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::with_capacity(self.tables.len());
        for each in &self.tables {
            if !result.iter().any(|name| name.eq_ignore_ascii_case(each.get_name())) {
                result.push(each.get_name().to_string());
            }
        }
        result
    }

    /// Find a referenced table by alias first, then by name.
    pub fn find_table(&self, alias_or_name: &str) -> Option<&TableSegment> {
        self.tables
            .iter()
            .find(|each| each.get_alias().map_or(false, |alias| alias.eq_ignore_ascii_case(alias_or_name)))
            .or_else(|| self.tables.iter().find(|each| each.get_name().eq_ignore_ascii_case(alias_or_name)))
    }

    /// Logic table owning a column: the bound original table, the owner, or the only table.
    pub fn find_column_table(&self, column: &ColumnSegment) -> Option<String> {
        if let Some(bound) = column.get_bound() {
            return Some(bound.get_original_table().to_string());
        }
        if let Some(owner) = column.get_owner() {
            return self.find_table(owner.get_name()).map(|table| table.get_name().to_string());
        }
        let names = self.get_table_names();
        if names.len() == 1 {
            names.into_iter().next()
        } else {
            None
        }
    }

    pub fn get_insert_table(&self) -> Option<&TableSegment> {
        if self.statement_type == StatementType::Insert {
            self.tables.first()
        } else {
            None
        }
    }

    pub fn get_projections(&self) -> &[ProjectionSegment] {
        &self.projections
    }

    pub fn contains_insert_columns(&self) -> bool {
        self.statement_type == StatementType::Insert && !self.insert_columns.is_empty()
    }

    pub fn get_insert_columns(&self) -> &[ColumnSegment] {
        &self.insert_columns
    }

    pub fn get_insert_values(&self) -> &[InsertValuesSegment] {
        &self.insert_values
    }

    pub fn get_assignments(&self) -> &[AssignmentSegment] {
        &self.assignments
    }

    pub fn get_predicates(&self) -> &[PredicateSegment] {
        &self.predicates
    }

    pub fn get_pagination(&self) -> Option<&PaginationSegment> {
        self.pagination.as_ref()
    }

    /// `SELECT ... FOR UPDATE`
    pub fn is_lock(&self) -> bool {
        self.lock
    }
}

pub struct BoundStatementContextBuilder {
    context: BoundStatementContext,
}

impl BoundStatementContextBuilder {
    pub fn table(mut self, table: TableSegment) -> Self {
        self.context.tables.push(table);
        self
    }

    pub fn projection(mut self, projection: ProjectionSegment) -> Self {
        self.context.projections.push(projection);
        self
    }

    pub fn insert_column(mut self, column: ColumnSegment) -> Self {
        self.context.insert_columns.push(column);
        self
    }

    pub fn insert_values(mut self, values: InsertValuesSegment) -> Self {
        self.context.insert_values.push(values);
        self
    }

    pub fn assignment(mut self, assignment: AssignmentSegment) -> Self {
        self.context.assignments.push(assignment);
        self
    }

    pub fn predicate(mut self, predicate: PredicateSegment) -> Self {
        self.context.predicates.push(predicate);
        self
    }

    pub fn pagination(mut self, pagination: PaginationSegment) -> Self {
        self.context.pagination = Some(pagination);
        self
    }

    pub fn lock(mut self, lock: bool) -> Self {
        self.context.lock = lock;
        self
    }

    pub fn build(self) -> BoundStatementContext {
        self.context
    }
}
