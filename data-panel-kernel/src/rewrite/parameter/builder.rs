use std::collections::BTreeMap;

use crate::binder::segment::ExpressionSegment;
use crate::binder::StatementType;
use crate::error::Result;
use crate::logic::LogicSQL;
use crate::route::context::{RouteContext, RouteUnit};
use crate::value::SQLValue;

/// Original parameters plus replacements and insertions, keyed by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardParameterBuilder {
    original_parameters: Vec<SQLValue>,
    replaced_parameters: BTreeMap<usize, SQLValue>,
    /// Inserted in front of the original parameter at the key, `len` appends.
    added_parameters: BTreeMap<usize, Vec<SQLValue>>,
}

impl StandardParameterBuilder {
    pub fn new(original_parameters: Vec<SQLValue>) -> Self {
        StandardParameterBuilder {
            original_parameters,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.original_parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_parameters.is_empty()
    }

    pub fn replace(&mut self, position: usize, value: SQLValue) {
        self.replaced_parameters.insert(position, value);
    }

    pub fn add(&mut self, position: usize, values: Vec<SQLValue>) {
        self.added_parameters.entry(position).or_insert_with(Vec::new).extend(values);
    }

    pub fn get_parameters(&self) -> Vec<SQLValue> {
        let mut result = Vec::with_capacity(self.original_parameters.len());
        for position in 0..=self.original_parameters.len() {
            if let Some(added) = self.added_parameters.get(&position) {
                result.extend(added.iter().cloned());
            }
            if let Some(original) = self.original_parameters.get(position) {
                result.push(self.replaced_parameters.get(&position).unwrap_or(original).clone());
            }
        }
        result
    }
}

/**
 * Parameters of an INSERT, grouped by VALUES row, so a unit only receives
 * the parameters of the rows routed to it. Parameters outside the rows are
 * generic and go to every unit after the rows.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedParameterBuilder {
    parameter_groups: Vec<StandardParameterBuilder>,
    /// Statement parameter index of every position, per group.
    group_indexes: Vec<Vec<usize>>,
    generic_parameters: StandardParameterBuilder,
    generic_indexes: Vec<usize>,
}

impl GroupedParameterBuilder {
    pub fn new(logic_sql: &LogicSQL) -> Result<Self> {
        let mut result = GroupedParameterBuilder::default();
        for row in logic_sql.get_statement_context().get_insert_values() {
            let indexes: Vec<usize> = row
                .get_values()
                .iter()
                .filter_map(|each| match each {
                    ExpressionSegment::Parameter { index, .. } => Some(*index),
                    _ => None,
                })
                .collect();
            let mut parameters = Vec::with_capacity(indexes.len());
            for each in &indexes {
                parameters.push(logic_sql.get_parameter(*each)?.clone());
            }
            result.parameter_groups.push(StandardParameterBuilder::new(parameters));
            result.group_indexes.push(indexes);
        }
        let mut generic = vec![];
        for index in 0..logic_sql.get_parameters().len() {
            if !result.group_indexes.iter().any(|each| each.contains(&index)) {
                result.generic_indexes.push(index);
                generic.push(logic_sql.get_parameters()[index].clone());
            }
        }
        result.generic_parameters = StandardParameterBuilder::new(generic);
        Ok(result)
    }

    pub fn get_parameter_groups(&self) -> &[StandardParameterBuilder] {
        &self.parameter_groups
    }

    /// Builder and position holding a statement parameter.
    fn locate(&mut self, index: usize) -> Option<(&mut StandardParameterBuilder, usize)> {
        let found = self
            .group_indexes
            .iter()
            .enumerate()
            .find_map(|(group, indexes)| indexes.iter().position(|each| *each == index).map(|position| (group, position)));
        if let Some((group, position)) = found {
            return Some((&mut self.parameter_groups[group], position));
        }
        let position = self.generic_indexes.iter().position(|each| *each == index)?;
        Some((&mut self.generic_parameters, position))
    }

    /// Append to the end of a row.
    pub fn add_group_parameters(&mut self, group: usize, values: Vec<SQLValue>) {
        if let Some(builder) = self.parameter_groups.get_mut(group) {
            let position = builder.len();
            builder.add(position, values);
        }
    }

    pub fn get_parameters(&self) -> Vec<SQLValue> {
        let mut result: Vec<SQLValue> = self.parameter_groups.iter().flat_map(StandardParameterBuilder::get_parameters).collect();
        result.extend(self.generic_parameters.get_parameters());
        result
    }

    /// Rows without recorded data nodes belong to every unit.
    pub fn get_parameters_for(&self, route_unit: &RouteUnit, route_context: &RouteContext) -> Vec<SQLValue> {
        let mut result = vec![];
        for (group, builder) in self.parameter_groups.iter().enumerate() {
            let routed = route_context
                .get_original_data_nodes()
                .get(group)
                .map_or(true, |data_nodes| data_nodes.is_empty() || data_nodes.iter().any(|each| route_unit.contains_data_node(each)));
            if routed {
                result.extend(builder.get_parameters());
            }
        }
        result.extend(self.generic_parameters.get_parameters());
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBuilder {
    Standard(StandardParameterBuilder),
    Grouped(GroupedParameterBuilder),
}

impl ParameterBuilder {
    pub fn create(logic_sql: &LogicSQL) -> Result<Self> {
        let statement = logic_sql.get_statement_context();
        if statement.get_statement_type() == StatementType::Insert && !statement.get_insert_values().is_empty() {
            Ok(ParameterBuilder::Grouped(GroupedParameterBuilder::new(logic_sql)?))
        } else {
            Ok(ParameterBuilder::Standard(StandardParameterBuilder::new(logic_sql.get_parameters().to_vec())))
        }
    }

    /// Replace the statement parameter at `index`.
    pub fn replace(&mut self, index: usize, value: SQLValue) {
        match self {
            ParameterBuilder::Standard(builder) => builder.replace(index, value),
            ParameterBuilder::Grouped(builder) => {
                if let Some((builder, position)) = builder.locate(index) {
                    builder.replace(position, value);
                }
            }
        }
    }

    /// Insert right behind the statement parameter at `index`.
    pub fn add_after(&mut self, index: usize, values: Vec<SQLValue>) {
        match self {
            ParameterBuilder::Standard(builder) => builder.add(index + 1, values),
            ParameterBuilder::Grouped(builder) => {
                if let Some((builder, position)) = builder.locate(index) {
                    builder.add(position + 1, values);
                }
            }
        }
    }

    pub fn get_parameters(&self) -> Vec<SQLValue> {
        match self {
            ParameterBuilder::Standard(builder) => builder.get_parameters(),
            ParameterBuilder::Grouped(builder) => builder.get_parameters(),
        }
    }

    pub fn get_parameters_for(&self, route_unit: &RouteUnit, route_context: &RouteContext) -> Vec<SQLValue> {
        match self {
            ParameterBuilder::Standard(builder) => builder.get_parameters(),
            ParameterBuilder::Grouped(builder) => builder.get_parameters_for(route_unit, route_context),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::segment::{ExpressionSegment, InsertValuesSegment, TableSegment};
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::logic::LogicSQL;
    use crate::rewrite::parameter::builder::{ParameterBuilder, StandardParameterBuilder};
    use crate::route::context::{DataNode, RouteContext, RouteMapper, RouteUnit};
    use crate::value::SQLValue;

    #[test]
    fn test_standard_replace_and_add() {
        let mut builder = StandardParameterBuilder::new(vec![SQLValue::Int(1), SQLValue::Int(2)]);
        builder.replace(0, SQLValue::Int(10));
        builder.add(1, vec![SQLValue::from("a")]);
        builder.add(2, vec![SQLValue::from("z")]);
        assert_eq!(builder.get_parameters(), vec![SQLValue::Int(10), SQLValue::from("a"), SQLValue::Int(2), SQLValue::from("z")]);
    }

    #[test]
    fn test_grouped_parameters_follow_rows() {
        // INSERT INTO t_order (order_id, status) VALUES (?, ?), (?, 'x')
        let statement = BoundStatementContext::builder(StatementType::Insert)
            .table(TableSegment::new(12, 18, "t_order"))
            .insert_values(InsertValuesSegment::new(46, 51, vec![ExpressionSegment::parameter(47, 0), ExpressionSegment::parameter(50, 1)]))
            .insert_values(InsertValuesSegment::new(54, 61, vec![ExpressionSegment::parameter(55, 2), ExpressionSegment::literal(58, 60, SQLValue::from("x"))]))
            .build();
        let logic_sql = LogicSQL::new(
            statement,
            "INSERT INTO t_order (order_id, status) VALUES (?, ?), (?, 'x')",
            vec![SQLValue::Int(1), SQLValue::from("a"), SQLValue::Int(2)],
        );
        let mut builder = ParameterBuilder::create(&logic_sql).unwrap();
        builder.replace(2, SQLValue::Int(20));
        builder.add_after(1, vec![SQLValue::from("a_plain")]);
        assert_eq!(builder.get_parameters(), vec![SQLValue::Int(1), SQLValue::from("a"), SQLValue::from("a_plain"), SQLValue::Int(20)]);

        let mut route_context = RouteContext::new();
        route_context.set_original_data_nodes(vec![vec![DataNode::new("ds_0", "t_order_1")], vec![DataNode::new("ds_0", "t_order_0")]]);
        let unit = RouteUnit::new(RouteMapper::new("ds_0", "ds_0"), vec![RouteMapper::new("t_order", "t_order_0")]);
        assert_eq!(builder.get_parameters_for(&unit, &route_context), vec![SQLValue::Int(20)]);
    }
}
