use crate::binder::context::TableBinderContexts;
use crate::binder::segment::{SegmentType, ShorthandProjection};
use crate::error::{KernelError, Result};

/**
 * Expand `*` and `owner.*` into the bound column projections.
 *
 * The expanded list is the single column set later consumers (the encrypt
 * projection rewrite) read, nobody expands the wildcard a second time.
 */
pub struct ShorthandProjectionBinder;

impl ShorthandProjectionBinder {
    pub fn bind(segment: &ShorthandProjection, table_contexts: &TableBinderContexts) -> Result<ShorthandProjection> {
        let actual_columns = match segment.get_owner() {
            Some(owner) => {
                let context = table_contexts.get(owner.get_name()).ok_or_else(|| KernelError::UnknownTable {
                    table: owner.get_name().to_string(),
                    clause: SegmentType::Projection.clause_name().to_string(),
                })?;
                context.get_column_label_projections().to_vec()
            }
            None => table_contexts
                .values()
                .flat_map(|each| each.get_column_label_projections().iter().cloned())
                .collect(),
        };
        Ok(segment.clone().with_actual_columns(actual_columns))
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::context::{TableBinderContext, TableBinderContexts};
    use crate::binder::segment::{OwnerSegment, ShorthandProjection};
    use crate::binder::shorthand::ShorthandProjectionBinder;
    use crate::error::KernelError;

    fn contexts() -> TableBinderContexts {
        TableBinderContexts::new()
            .with("a", TableBinderContext::from_table("a", "t_a", &["id", "name", "pwd"]))
            .with("b", TableBinderContext::from_table("b", "t_b", &["id", "status"]))
    }

    fn labels(segment: &ShorthandProjection) -> Vec<String> {
        segment
            .get_actual_columns()
            .iter()
            .map(|each| each.get_column().get_expression())
            .collect()
    }

    #[test]
    fn test_bind_without_owner() {
        let single = TableBinderContexts::new().with("t", TableBinderContext::from_table("t", "t", &["id", "name", "pwd"]));
        let actual = ShorthandProjectionBinder::bind(&ShorthandProjection::new(7, 7, None), &single).unwrap();
        assert_eq!(labels(&actual), vec!["t.id", "t.name", "t.pwd"]);
        let joined = ShorthandProjectionBinder::bind(&ShorthandProjection::new(7, 7, None), &contexts()).unwrap();
        assert_eq!(labels(&joined), vec!["a.id", "a.name", "a.pwd", "b.id", "b.status"]);
    }

    #[test]
    fn test_bind_with_owner() {
        let segment = ShorthandProjection::new(7, 9, Some(OwnerSegment::new(7, 7, "a")));
        let actual = ShorthandProjectionBinder::bind(&segment, &contexts()).unwrap();
        assert_eq!(labels(&actual), vec!["a.id", "a.name", "a.pwd"]);
        assert_eq!(actual.get_actual_columns()[2].get_column().get_bound().unwrap().get_original_table(), "t_a");
    }

    #[test]
    fn test_bind_with_unknown_owner() {
        let segment = ShorthandProjection::new(7, 9, Some(OwnerSegment::new(7, 7, "c")));
        let err = ShorthandProjectionBinder::bind(&segment, &contexts()).unwrap_err();
        assert_eq!(err, KernelError::UnknownTable { table: "c".to_string(), clause: "field list".to_string() });
    }
}
