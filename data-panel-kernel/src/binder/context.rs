use crate::binder::segment::{ColumnBoundInfo, ColumnProjection, ColumnSegment, OwnerSegment};

/// Columns a single table (or derived table) exposes to the statement, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableBinderContext {
    column_label_projections: Vec<ColumnProjection>,
    variable_label_projections: Vec<ColumnProjection>,
}

impl TableBinderContext {
    pub fn new(column_label_projections: Vec<ColumnProjection>) -> Self {
        TableBinderContext {
            column_label_projections,
            variable_label_projections: vec![],
        }
    }

    /// Context of a physical table whose columns are owned by `owner` (its alias or name).
    pub fn from_table(owner: &str, table: &str, columns: &[&str]) -> Self {
        let projections = columns
            .iter()
            .map(|each| {
                let column = ColumnSegment::new(0, 0, each)
                    .with_owner(OwnerSegment::new(0, 0, owner))
                    .with_bound(ColumnBoundInfo::new(table, each));
                ColumnProjection::new(column)
            })
            .collect();
        TableBinderContext::new(projections)
    }

    pub fn with_variables(mut self, variable_label_projections: Vec<ColumnProjection>) -> Self {
        self.variable_label_projections = variable_label_projections;
        self
    }

    pub fn get_column_label_projections(&self) -> &[ColumnProjection] {
        &self.column_label_projections
    }

    pub fn find_projection_by_column_label(&self, label: &str) -> Option<&ColumnProjection> {
        self.column_label_projections
            .iter()
            .find(|each| each.get_column_label().eq_ignore_ascii_case(label))
    }

    pub fn find_projection_by_variable_label(&self, label: &str) -> Option<&ColumnProjection> {
        self.variable_label_projections
            .iter()
            .find(|each| each.get_column_label().eq_ignore_ascii_case(label))
    }
}

/// Table contexts keyed by alias or name, kept in table-reference order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableBinderContexts {
    contexts: Vec<(String, TableBinderContext)>,
}

impl TableBinderContexts {
    pub fn new() -> Self {
        TableBinderContexts { contexts: vec![] }
    }

    pub fn with(mut self, alias_or_name: &str, context: TableBinderContext) -> Self {
        self.contexts.push((alias_or_name.to_string(), context));
        self
    }

    pub fn get(&self, alias_or_name: &str) -> Option<&TableBinderContext> {
        self.contexts
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias_or_name))
            .map(|(_, context)| context)
    }

    pub fn contains(&self, alias_or_name: &str) -> bool {
        self.get(alias_or_name).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = &TableBinderContext> {
        self.contexts.iter().map(|(_, context)| context)
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Statement level state shared by the segment binders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SQLStatementBinderContext {
    external_table_contexts: TableBinderContexts,
    using_column_names: Vec<String>,
}

impl SQLStatementBinderContext {
    pub fn new(external_table_contexts: TableBinderContexts, using_column_names: Vec<String>) -> Self {
        SQLStatementBinderContext {
            external_table_contexts,
            using_column_names,
        }
    }

    pub fn get_external_table_contexts(&self) -> &TableBinderContexts {
        &self.external_table_contexts
    }

    pub fn is_using_column(&self, name: &str) -> bool {
        self.using_column_names.iter().any(|each| each.eq_ignore_ascii_case(name))
    }
}
