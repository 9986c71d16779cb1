use crate::binder::context::{SQLStatementBinderContext, TableBinderContext, TableBinderContexts};
use crate::binder::segment::{ColumnBoundInfo, ColumnSegment, SegmentType};
use crate::error::{KernelError, Result};

/// Pseudo columns and niladic functions that are never bound to a table.
const EXCLUDE_BIND_COLUMNS: [&str; 9] = [
    "ROWNUM",
    "ROW_NUMBER",
    "ROWNUM_",
    "SYSDATE",
    "SYSTIMESTAMP",
    "CURRENT_TIMESTAMP",
    "LOCALTIMESTAMP",
    "UID",
    "USER",
];

/**
 * Resolve which table a column reference belongs to.
 *
 * Lookup order: the owner's table (statement, then outer, then external
 * contexts), otherwise every table of the statement; then external tables;
 * then variables declared by the tables.
 */
pub struct ColumnSegmentBinder;

impl ColumnSegmentBinder {
    pub fn bind(
        segment: &ColumnSegment,
        parent_segment_type: SegmentType,
        statement_context: &SQLStatementBinderContext,
        table_contexts: &TableBinderContexts,
        outer_table_contexts: &TableBinderContexts,
    ) -> Result<ColumnSegment> {
        if EXCLUDE_BIND_COLUMNS.iter().any(|each| each.eq_ignore_ascii_case(segment.get_name())) {
            return Ok(segment.clone());
        }
        let candidates = Self::get_table_contexts(segment, statement_context, table_contexts, outer_table_contexts);
        let input = Self::find_input_column(segment, parent_segment_type, &candidates, statement_context)?;
        let mut result = ColumnSegment::new(segment.get_start_index(), segment.get_stop_index(), segment.get_name());
        if let Some(owner) = segment.get_owner() {
            result = result.with_owner(owner.clone());
        }
        if let Some(input) = &input {
            result = result.with_variable(input.is_variable());
        }
        match Self::create_bound_info(segment, input.as_ref()) {
            Some(bound) => Ok(result.with_bound(bound)),
            None => Ok(result),
        }
    }

    /// Bind a `JOIN ... USING (column)` column, which must exist in at least two tables.
    /// Returns the column bound to the first table and the bound info of the second.
    pub fn bind_using_column(
        segment: &ColumnSegment,
        parent_segment_type: SegmentType,
        table_contexts: &TableBinderContexts,
    ) -> Result<(ColumnSegment, ColumnBoundInfo)> {
        let inputs: Vec<&ColumnSegment> = table_contexts
            .values()
            .filter_map(|each| each.find_projection_by_column_label(segment.get_name()))
            .map(|each| each.get_column())
            .collect();
        if inputs.len() < 2 {
            return Err(Self::unknown_column(segment, parent_segment_type));
        }
        let mut result = ColumnSegment::new(segment.get_start_index(), segment.get_stop_index(), segment.get_name());
        if let Some(owner) = segment.get_owner() {
            result = result.with_owner(owner.clone());
        }
        if let Some(bound) = Self::create_bound_info(segment, Some(inputs[0])) {
            result = result.with_bound(bound);
        }
        let other = Self::create_bound_info(segment, Some(inputs[1]))
            .unwrap_or_else(|| ColumnBoundInfo::new("", segment.get_name()));
        Ok((result, other))
    }

    fn get_table_contexts<'a>(
        segment: &ColumnSegment,
        statement_context: &'a SQLStatementBinderContext,
        table_contexts: &'a TableBinderContexts,
        outer_table_contexts: &'a TableBinderContexts,
    ) -> Vec<&'a TableBinderContext> {
        match segment.get_owner() {
            Some(owner) => table_contexts
                .get(owner.get_name())
                .or_else(|| outer_table_contexts.get(owner.get_name()))
                .or_else(|| statement_context.get_external_table_contexts().get(owner.get_name()))
                .into_iter()
                .collect(),
            None => table_contexts.values().collect(),
        }
    }

    fn find_input_column(
        segment: &ColumnSegment,
        parent_segment_type: SegmentType,
        candidates: &[&TableBinderContext],
        statement_context: &SQLStatementBinderContext,
    ) -> Result<Option<ColumnSegment>> {
        let mut result: Option<&ColumnSegment> = None;
        for each in candidates {
            if let Some(projection) = each.find_projection_by_column_label(segment.get_name()) {
                if result.is_some() {
                    return Err(KernelError::AmbiguousColumn {
                        column: segment.get_expression(),
                        clause: parent_segment_type.clause_name().to_string(),
                    });
                }
                result = Some(projection.get_column());
            }
        }
        if result.is_none() {
            result = statement_context
                .get_external_table_contexts()
                .values()
                .find_map(|each| each.find_projection_by_column_label(segment.get_name()))
                .map(|each| each.get_column());
        }
        if result.is_none() {
            result = candidates
                .iter()
                .find_map(|each| each.find_projection_by_variable_label(segment.get_name()))
                .map(|each| each.get_column());
        }
        match result {
            Some(column) => Ok(Some(column.clone())),
            None => Err(Self::unknown_column(segment, parent_segment_type)),
        }
    }

    fn create_bound_info(segment: &ColumnSegment, input: Option<&ColumnSegment>) -> Option<ColumnBoundInfo> {
        if let Some(bound) = segment.get_bound() {
            return Some(bound.clone());
        }
        input.and_then(|each| each.get_bound()).cloned()
    }

    fn unknown_column(segment: &ColumnSegment, parent_segment_type: SegmentType) -> KernelError {
        KernelError::UnknownColumn {
            column: segment.get_expression(),
            clause: parent_segment_type.clause_name().to_string(),
        }
    }
}
