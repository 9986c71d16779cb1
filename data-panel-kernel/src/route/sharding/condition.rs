use crate::binder::segment::PredicateOperator;
use crate::binder::StatementType;
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::rule::algorithm::ShardingValue;
use crate::rule::sharding::ShardingRule;
use crate::value::SQLValue;

/// Values one sharding column of one table is restricted to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardingConditionValue {
    table_name: String,
    column_name: String,
    value: ShardingValue,
}

impl ShardingConditionValue {
    pub fn new(table_name: &str, column_name: &str, value: ShardingValue) -> Self {
        ShardingConditionValue {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            value,
        }
    }

    pub fn get_table_name(&self) -> &str {
        &self.table_name
    }

    pub fn get_column_name(&self) -> &str {
        &self.column_name
    }

    pub fn get_value(&self) -> &ShardingValue {
        &self.value
    }
}

/// AND-ed sharding values: the WHERE clause of a statement or one INSERT row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardingCondition {
    values: Vec<ShardingConditionValue>,
}

impl ShardingCondition {
    pub fn get_values(&self) -> &[ShardingConditionValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `column` for one of `tables`, the first table wins.
    pub fn find_value(&self, tables: &[&str], column: &str) -> Option<&ShardingValue> {
        tables.iter().find_map(|table| {
            self.values
                .iter()
                .find(|each| each.table_name.eq_ignore_ascii_case(table) && each.column_name.eq_ignore_ascii_case(column))
                .map(|each| &each.value)
        })
    }

    fn add(&mut self, value: ShardingConditionValue) {
        let existing = self
            .values
            .iter_mut()
            .find(|each| each.table_name.eq_ignore_ascii_case(&value.table_name) && each.column_name.eq_ignore_ascii_case(&value.column_name));
        match existing {
            Some(each) => {
                // `a = 1 AND a IN (1, 2)` narrows to the common values
                if let (ShardingValue::List(current), ShardingValue::List(other)) = (&mut each.value, &value.value) {
                    current.retain(|v| other.contains(v));
                }
            }
            None => self.values.push(value),
        }
    }
}

pub struct ShardingConditionEngine;

impl ShardingConditionEngine {
    /// One condition per INSERT row; at most one condition for other statements.
    pub fn create(logic_sql: &LogicSQL, rule: &ShardingRule) -> Result<Vec<ShardingCondition>> {
        let statement = logic_sql.get_statement_context();
        if statement.get_statement_type() == StatementType::Insert {
            Self::create_insert_conditions(logic_sql, rule)
        } else {
            let condition = Self::create_where_condition(logic_sql, rule)?;
            Ok(if condition.is_empty() { vec![] } else { vec![condition] })
        }
    }

    fn create_insert_conditions(logic_sql: &LogicSQL, rule: &ShardingRule) -> Result<Vec<ShardingCondition>> {
        let statement = logic_sql.get_statement_context();
        let table = match statement.get_insert_table() {
            Some(table) => table.get_name(),
            None => return Ok(vec![]),
        };
        let mut result = Vec::with_capacity(statement.get_insert_values().len());
        for row in statement.get_insert_values() {
            let mut condition = ShardingCondition::default();
            for (column, expression) in statement.get_insert_columns().iter().zip(row.get_values()) {
                if !rule.is_sharding_column(column.get_name(), table) {
                    continue;
                }
                if let Some(value) = logic_sql.get_expression_value(expression)? {
                    condition.add(ShardingConditionValue::new(table, column.get_name(), ShardingValue::List(vec![value])));
                }
            }
            result.push(condition);
        }
        Ok(result)
    }

    fn create_where_condition(logic_sql: &LogicSQL, rule: &ShardingRule) -> Result<ShardingCondition> {
        let statement = logic_sql.get_statement_context();
        let mut result = ShardingCondition::default();
        for predicate in statement.get_predicates() {
            let table = match statement.find_column_table(predicate.get_column()) {
                Some(table) => table,
                None => continue,
            };
            let column = predicate.get_column().get_name();
            if !rule.is_sharding_column(column, &table) {
                continue;
            }
            let mut values: Vec<SQLValue> = Vec::with_capacity(predicate.get_values().len());
            for each in predicate.get_values() {
                if let Some(value) = logic_sql.get_expression_value(each)? {
                    values.push(value);
                }
            }
            // a computed operand can not be used to prune
            if values.len() != predicate.get_values().len() {
                continue;
            }
            let value = match predicate.get_operator() {
                PredicateOperator::Equal | PredicateOperator::In => ShardingValue::List(values),
                PredicateOperator::Between if values.len() == 2 => {
                    let mut values = values.into_iter();
                    match (values.next(), values.next()) {
                        (Some(lower), Some(upper)) => ShardingValue::Range { lower, upper },
                        _ => continue,
                    }
                }
                _ => continue,
            };
            result.add(ShardingConditionValue::new(&table, column, value));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::binder::segment::{ColumnSegment, ExpressionSegment, InsertValuesSegment, OwnerSegment, PredicateOperator, PredicateSegment, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::logic::LogicSQL;
    use crate::route::context::DataNode;
    use crate::route::sharding::condition::ShardingConditionEngine;
    use crate::rule::algorithm::{ShardingAlgorithm, ShardingValue};
    use crate::rule::config::AlgorithmConfiguration;
    use crate::rule::sharding::{ShardingRule, ShardingStrategy, TableRule};
    use crate::value::SQLValue;

    fn rule() -> ShardingRule {
        let algorithm = Arc::new(ShardingAlgorithm::create("mod", &AlgorithmConfiguration::new("MOD").with_prop("sharding-count", 2)).unwrap());
        let table_rule = TableRule::new("t_order", vec![DataNode::new("ds", "t_order_0"), DataNode::new("ds", "t_order_1")])
            .with_table_strategy(ShardingStrategy::new("order_id", algorithm));
        ShardingRule::new(vec!["ds".to_string()], vec![table_rule])
    }

    #[test]
    fn test_where_condition() {
        // SELECT * FROM t_order o WHERE o.order_id IN (?, 3) AND o.order_id = 3 AND status = 'x'
        let statement = BoundStatementContext::builder(StatementType::Select)
            .table(TableSegment::new(14, 20, "t_order").with_alias("o"))
            .predicate(PredicateSegment::new(
                ColumnSegment::new(30, 39, "order_id").with_owner(OwnerSegment::new(30, 30, "o")),
                PredicateOperator::In,
                vec![ExpressionSegment::parameter(45, 0), ExpressionSegment::literal(48, 48, SQLValue::Int(3))],
            ))
            .predicate(PredicateSegment::new(
                ColumnSegment::new(55, 64, "order_id").with_owner(OwnerSegment::new(55, 55, "o")),
                PredicateOperator::Equal,
                vec![ExpressionSegment::literal(68, 68, SQLValue::Int(3))],
            ))
            .predicate(PredicateSegment::new(ColumnSegment::new(74, 79, "status"), PredicateOperator::Equal, vec![ExpressionSegment::literal(83, 85, SQLValue::from("x"))]))
            .build();
        let logic_sql = LogicSQL::new(statement, "", vec![SQLValue::Int(1)]);
        let conditions = ShardingConditionEngine::create(&logic_sql, &rule()).unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].get_values().len(), 1);
        assert_eq!(conditions[0].find_value(&["t_order"], "ORDER_ID"), Some(&ShardingValue::List(vec![SQLValue::Int(3)])));
    }

    #[test]
    fn test_between_condition() {
        let statement = BoundStatementContext::builder(StatementType::Delete)
            .table(TableSegment::new(12, 18, "t_order"))
            .predicate(PredicateSegment::new(
                ColumnSegment::new(26, 33, "order_id"),
                PredicateOperator::Between,
                vec![ExpressionSegment::literal(43, 43, SQLValue::Int(1)), ExpressionSegment::literal(49, 49, SQLValue::Int(2))],
            ))
            .build();
        let conditions = ShardingConditionEngine::create(&LogicSQL::new(statement, "", vec![]), &rule()).unwrap();
        assert_eq!(
            conditions[0].find_value(&["t_order"], "order_id"),
            Some(&ShardingValue::Range { lower: SQLValue::Int(1), upper: SQLValue::Int(2) })
        );
    }

    #[test]
    fn test_insert_conditions_per_row() {
        let statement = BoundStatementContext::builder(StatementType::Insert)
            .table(TableSegment::new(12, 18, "t_order"))
            .insert_column(ColumnSegment::new(21, 28, "order_id"))
            .insert_column(ColumnSegment::new(31, 36, "status"))
            .insert_values(InsertValuesSegment::new(46, 51, vec![ExpressionSegment::parameter(47, 0), ExpressionSegment::parameter(50, 1)]))
            .insert_values(InsertValuesSegment::new(54, 59, vec![ExpressionSegment::parameter(55, 2), ExpressionSegment::parameter(58, 3)]))
            .build();
        let parameters = vec![SQLValue::Int(1), SQLValue::from("a"), SQLValue::Int(2), SQLValue::from("b")];
        let conditions = ShardingConditionEngine::create(&LogicSQL::new(statement.clone(), "", parameters), &rule()).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].find_value(&["t_order"], "order_id"), Some(&ShardingValue::List(vec![SQLValue::Int(2)])));
        assert!(ShardingConditionEngine::create(&LogicSQL::new(statement, "", vec![]), &rule()).is_err());
    }
}
