use crate::binder::segment::ExpressionSegment;
use crate::binder::BoundStatementContext;
use crate::error::{KernelError, Result};
use crate::value::SQLValue;

/**
 * The statement a client sent: bound context, original text and parameters.
 * Created once per execution and never mutated.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct LogicSQL {
    statement_context: BoundStatementContext,
    sql: String,
    parameters: Vec<SQLValue>,
}

impl LogicSQL {
    pub fn new(statement_context: BoundStatementContext, sql: &str, parameters: Vec<SQLValue>) -> Self {
        LogicSQL {
            statement_context,
            sql: sql.to_string(),
            parameters,
        }
    }

    pub fn get_statement_context(&self) -> &BoundStatementContext {
        &self.statement_context
    }

    pub fn get_sql(&self) -> &str {
        &self.sql
    }

    pub fn get_parameters(&self) -> &[SQLValue] {
        &self.parameters
    }

    pub fn get_parameter(&self, index: usize) -> Result<&SQLValue> {
        self.parameters.get(index).ok_or(KernelError::ParameterIndexOutOfRange {
            index,
            count: self.parameters.len(),
        })
    }

    /// Value of a literal or of a bound `?`; `None` for anything computed by the database.
    pub fn get_expression_value(&self, expression: &ExpressionSegment) -> Result<Option<SQLValue>> {
        match expression {
            ExpressionSegment::Literal { value, .. } => Ok(Some(value.clone())),
            ExpressionSegment::Parameter { index, .. } => self.get_parameter(*index).map(|each| Some(each.clone())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::ExpressionSegment;
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::value::SQLValue;

    #[test]
    fn test_get_expression_value() {
        let statement = BoundStatementContext::builder(StatementType::Select).build();
        let logic_sql = LogicSQL::new(statement, "SELECT ? , 'a'", vec![SQLValue::Int(1)]);
        assert_eq!(logic_sql.get_expression_value(&ExpressionSegment::parameter(7, 0)).unwrap(), Some(SQLValue::Int(1)));
        assert_eq!(logic_sql.get_expression_value(&ExpressionSegment::literal(11, 13, SQLValue::from("a"))).unwrap(), Some(SQLValue::from("a")));
        let other = ExpressionSegment::Other { start_index: 7, stop_index: 11, text: "now()".to_string() };
        assert_eq!(logic_sql.get_expression_value(&other).unwrap(), None);
        let err = logic_sql.get_expression_value(&ExpressionSegment::parameter(7, 1)).unwrap_err();
        assert_eq!(err, KernelError::ParameterIndexOutOfRange { index: 1, count: 1 });
    }
}
